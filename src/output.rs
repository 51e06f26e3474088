//! Deferred resource values
//!
//! A declared resource does not know its provider-assigned attributes (the
//! bucket's generated name, the website endpoint, ...) until the engine has
//! realized it. [`Output<T>`] is a cloneable handle to such an eventual value.
//! Computations over it are expressed with [`Output::apply`], which runs the
//! supplied pure function once the upstream value resolves.
//!
//! Every output remembers which resources it was derived from. When an output
//! is passed as a resource input the stack turns that set into dependency
//! edges, so a consumer is never realized before its producers.
//!
//! ```rust,ignore
//! let (name, resolver) = Output::<String>::deferred(&bucket_urn);
//! let arn = name.apply(|n| format!("arn:aws:s3:::{n}"));
//! resolver.resolve("demo-1a2b3c4".to_string());
//! assert_eq!(arn.resolve().await?, "arn:aws:s3:::demo-1a2b3c4");
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::resource::{PropertyValue, ResourceUrn};

/// Reasons a deferred value can fail to resolve.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OutputError {
    /// The producing resource was never realized.
    #[error("Output of '{0}' was abandoned before it resolved")]
    Abandoned(String),

    /// The producing resource failed.
    #[error("Output of '{urn}' failed: {message}")]
    Failed {
        /// Producing resource
        urn: String,
        /// Failure reported while realizing it
        message: String,
    },

    /// The provider did not report a declared attribute.
    #[error("Resource '{urn}' has no output attribute '{attribute}'")]
    MissingAttribute {
        /// Producing resource
        urn: String,
        /// Requested attribute
        attribute: String,
    },

    /// The attribute resolved to an unexpected JSON type.
    #[error("Output attribute '{attribute}' has unexpected type: expected {expected}")]
    TypeMismatch {
        /// Requested attribute
        attribute: String,
        /// Expected JSON type
        expected: String,
    },
}

/// Result type for deferred values.
pub type OutputResult<T> = std::result::Result<T, OutputError>;

type SharedValue<T> = Shared<BoxFuture<'static, OutputResult<T>>>;

/// A value that becomes known once the resources it depends on are realized.
#[derive(Clone)]
pub struct Output<T: Clone> {
    value: SharedValue<T>,
    resources: Arc<BTreeSet<ResourceUrn>>,
}

impl<T> fmt::Debug for Output<T>
where
    T: Clone + fmt::Debug + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.try_get() {
            Some(Ok(value)) => format!("{:?}", value),
            Some(Err(err)) => format!("<error: {}>", err),
            None => "<pending>".to_string(),
        };
        f.debug_struct("Output")
            .field("value", &state)
            .field("resources", &self.resources)
            .finish()
    }
}

impl<T> Output<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// An output whose value is already known and depends on no resource.
    pub fn known(value: T) -> Self {
        Self {
            value: futures::future::ready(Ok(value)).boxed().shared(),
            resources: Arc::default(),
        }
    }

    /// An output that has already failed.
    pub fn failed(error: OutputError) -> Self {
        Self {
            value: futures::future::ready(Err(error)).boxed().shared(),
            resources: Arc::default(),
        }
    }

    /// An output produced by `urn`, together with the resolver the engine
    /// uses to fulfill it.
    pub fn deferred(urn: &ResourceUrn) -> (Self, OutputResolver<T>) {
        let (sender, receiver) = oneshot::channel::<OutputResult<T>>();
        let owner = urn.to_string();

        let value = async move {
            match receiver.await {
                Ok(result) => result,
                Err(_) => Err(OutputError::Abandoned(owner)),
            }
        }
        .boxed()
        .shared();

        let output = Self {
            value,
            resources: Arc::new(BTreeSet::from([urn.clone()])),
        };
        let resolver = OutputResolver {
            urn: urn.clone(),
            sender,
        };
        (output, resolver)
    }

    /// Derive a new output by applying `f` to the eventual value.
    pub fn apply<U, F>(&self, f: F) -> Output<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.try_apply(move |value| Ok(f(value)))
    }

    /// Like [`Output::apply`], for functions that can reject the value.
    pub fn try_apply<U, F>(&self, f: F) -> Output<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> OutputResult<U> + Send + 'static,
    {
        let upstream = self.value.clone();
        Output {
            value: async move { upstream.await.and_then(f) }.boxed().shared(),
            resources: Arc::clone(&self.resources),
        }
    }

    /// Combine several outputs into one that resolves when all of them do.
    pub fn all(outputs: &[Output<T>]) -> Output<Vec<T>> {
        let resources: BTreeSet<ResourceUrn> = outputs
            .iter()
            .flat_map(|o| o.resources.iter().cloned())
            .collect();
        let pending: Vec<SharedValue<T>> = outputs.iter().map(|o| o.value.clone()).collect();

        Output {
            value: async move {
                futures::future::join_all(pending)
                    .await
                    .into_iter()
                    .collect::<OutputResult<Vec<T>>>()
            }
            .boxed()
            .shared(),
            resources: Arc::new(resources),
        }
    }

    /// Wait for the value.
    pub async fn resolve(&self) -> OutputResult<T> {
        self.value.clone().await
    }

    /// The value if it is already known, without waiting.
    pub fn try_get(&self) -> Option<OutputResult<T>> {
        self.value.clone().now_or_never()
    }

    /// Whether the value (or its failure) is already known.
    pub fn is_ready(&self) -> bool {
        self.try_get().is_some()
    }

    /// Resources this value is derived from.
    pub fn resources(&self) -> &BTreeSet<ResourceUrn> {
        &self.resources
    }
}

/// Write side of a deferred output, held by the engine.
pub struct OutputResolver<T> {
    urn: ResourceUrn,
    sender: oneshot::Sender<OutputResult<T>>,
}

impl<T> fmt::Debug for OutputResolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputResolver")
            .field("urn", &self.urn)
            .finish_non_exhaustive()
    }
}

impl<T> OutputResolver<T> {
    /// The resource producing this value.
    pub fn urn(&self) -> &ResourceUrn {
        &self.urn
    }

    /// Fulfill the output. Waiters that already went away are ignored.
    pub fn resolve(self, value: T) {
        let _ = self.sender.send(Ok(value));
    }

    /// Fail the output.
    pub fn reject(self, error: OutputError) {
        let _ = self.sender.send(Err(error));
    }
}

/// A resource input: either a plain value or the output of another resource.
#[derive(Clone)]
pub enum Input<T: Clone> {
    /// Known at declaration time
    Value(T),
    /// Known once another resource is realized
    Output(Output<T>),
}

impl<T> fmt::Debug for Input<T>
where
    T: Clone + fmt::Debug + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Input::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Input::Output(output) => f.debug_tuple("Output").field(output).finish(),
        }
    }
}

impl<T> Input<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Transform the value, deferring the transformation for outputs.
    pub fn map<U, F>(self, f: F) -> Input<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        match self {
            Input::Value(value) => Input::Value(f(value)),
            Input::Output(output) => Input::Output(output.apply(f)),
        }
    }

    /// Resources this input waits on.
    pub fn resources(&self) -> BTreeSet<ResourceUrn> {
        match self {
            Input::Value(_) => BTreeSet::new(),
            Input::Output(output) => output.resources().clone(),
        }
    }

    /// Wait for the concrete value.
    pub async fn resolve(&self) -> OutputResult<T> {
        match self {
            Input::Value(value) => Ok(value.clone()),
            Input::Output(output) => output.resolve().await,
        }
    }
}

impl Input<Value> {
    /// Snapshot this input for previews and diffs.
    pub fn to_property(&self) -> PropertyValue {
        match self {
            Input::Value(value) => PropertyValue::Known(value.clone()),
            Input::Output(output) => match output.try_get() {
                Some(Ok(value)) => PropertyValue::Known(value),
                _ => PropertyValue::Computed {
                    computed_from: output.resources().iter().map(ToString::to_string).collect(),
                },
            },
        }
    }
}

impl<T: Clone> From<Output<T>> for Input<T> {
    fn from(output: Output<T>) -> Self {
        Input::Output(output)
    }
}

impl From<String> for Input<String> {
    fn from(value: String) -> Self {
        Input::Value(value)
    }
}

impl From<&str> for Input<String> {
    fn from(value: &str) -> Self {
        Input::Value(value.to_string())
    }
}
