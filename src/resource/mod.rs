//! Resource model
//!
//! Everything a stack declares is a resource: either a *component* (a logical
//! grouping with no provider-side existence, such as a static page) or a
//! *custom* resource that a provider creates (a bucket, an object, ...).
//!
//! Resources are identified by a [`ResourceUrn`] that embeds the stack,
//! project, the qualified type chain of its ancestors, and its logical name.

pub mod s3;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::output::{Input, Output, OutputError};

pub use s3::{
    BucketArgs, BucketObjectArgs, BucketPolicyArgs, BucketPublicAccessBlockArgs,
    BucketWebsiteConfigurationArgs, ErrorDocument, IndexDocument,
};

/// Type token of the static page component.
pub const STATIC_PAGE_TYPE: &str = "static-page-component:index:StaticPage";

const URN_PREFIX: &str = "urn:staticpage:";

/// Declared inputs of a resource, keyed by property name.
pub type PropertyMap = BTreeMap<String, Input<Value>>;

/// Stable identifier of a declared resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ResourceUrn {
    stack: String,
    project: String,
    qualified_type: String,
    name: String,
}

impl ResourceUrn {
    /// Build the URN of a resource of `kind` named `name`, optionally nested
    /// under `parent`.
    pub fn new(
        stack: &str,
        project: &str,
        parent: Option<&ResourceUrn>,
        kind: &ResourceKind,
        name: &str,
    ) -> Self {
        let qualified_type = match parent {
            Some(parent) => format!("{}${}", parent.qualified_type, kind.type_token()),
            None => kind.type_token().to_string(),
        };
        Self {
            stack: stack.to_string(),
            project: project.to_string(),
            qualified_type,
            name: name.to_string(),
        }
    }

    /// Logical name of the resource.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stack the resource belongs to.
    pub fn stack(&self) -> &str {
        &self.stack
    }

    /// Project the resource belongs to.
    pub fn project(&self) -> &str {
        &self.project
    }

    /// The resource's own type token (without its ancestors).
    pub fn type_token(&self) -> &str {
        self.qualified_type
            .rsplit('$')
            .next()
            .unwrap_or(&self.qualified_type)
    }

    /// Type chain including ancestors, separated by `$`.
    pub fn qualified_type(&self) -> &str {
        &self.qualified_type
    }
}

impl fmt::Display for ResourceUrn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}::{}::{}::{}",
            URN_PREFIX, self.stack, self.project, self.qualified_type, self.name
        )
    }
}

impl FromStr for ResourceUrn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix(URN_PREFIX)
            .ok_or_else(|| format!("Invalid URN '{}': missing '{}' prefix", s, URN_PREFIX))?;

        // The name is the remainder, so it may itself contain "::".
        let mut parts = rest.splitn(4, "::");
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(stack), Some(project), Some(qualified_type), Some(name))
                if !stack.is_empty() && !qualified_type.is_empty() && !name.is_empty() =>
            {
                Ok(Self {
                    stack: stack.to_string(),
                    project: project.to_string(),
                    qualified_type: qualified_type.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(format!(
                "Invalid URN '{}': expected urn:staticpage:<stack>::<project>::<type>::<name>",
                s
            )),
        }
    }
}

impl From<ResourceUrn> for String {
    fn from(urn: ResourceUrn) -> Self {
        urn.to_string()
    }
}

impl TryFrom<String> for ResourceUrn {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// The kinds of resources this crate knows how to declare.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ResourceKind {
    /// Storage container
    Bucket,
    /// Static website hosting settings of a bucket
    BucketWebsiteConfiguration,
    /// A single stored object
    BucketObject,
    /// Public access guard of a bucket
    BucketPublicAccessBlock,
    /// Access policy document attached to a bucket
    BucketPolicy,
    /// Logical component identified by its type token
    Component(String),
}

impl ResourceKind {
    /// Stable type token tracked by the engine across runs.
    pub fn type_token(&self) -> &str {
        match self {
            ResourceKind::Bucket => "aws:s3/bucket:Bucket",
            ResourceKind::BucketWebsiteConfiguration => {
                "aws:s3/bucketWebsiteConfigurationV2:BucketWebsiteConfigurationV2"
            }
            ResourceKind::BucketObject => "aws:s3/bucketObject:BucketObject",
            ResourceKind::BucketPublicAccessBlock => {
                "aws:s3/bucketPublicAccessBlock:BucketPublicAccessBlock"
            }
            ResourceKind::BucketPolicy => "aws:s3/bucketPolicy:BucketPolicy",
            ResourceKind::Component(token) => token,
        }
    }

    /// Short human-readable name.
    pub fn short_name(&self) -> &str {
        match self {
            ResourceKind::Bucket => "bucket",
            ResourceKind::BucketWebsiteConfiguration => "bucket-website-configuration",
            ResourceKind::BucketObject => "bucket-object",
            ResourceKind::BucketPublicAccessBlock => "bucket-public-access-block",
            ResourceKind::BucketPolicy => "bucket-policy",
            ResourceKind::Component(token) => token,
        }
    }

    /// Whether this is a logical component rather than a provider resource.
    pub fn is_component(&self) -> bool {
        matches!(self, ResourceKind::Component(_))
    }

    /// Attributes the provider reports once the resource exists.
    pub fn output_names(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::Bucket => &["id", "bucket", "arn", "region", "bucketDomainName"],
            ResourceKind::BucketWebsiteConfiguration => {
                &["id", "websiteEndpoint", "websiteDomain"]
            }
            ResourceKind::BucketObject => &["id", "key", "etag"],
            ResourceKind::BucketPublicAccessBlock => &["id"],
            ResourceKind::BucketPolicy => &["id"],
            ResourceKind::Component(_) => &[],
        }
    }

    /// Input properties whose change forces the resource to be replaced
    /// rather than updated in place.
    pub fn replace_on_changes(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::Bucket => &["bucket"],
            ResourceKind::BucketObject => &["bucket", "key"],
            ResourceKind::BucketWebsiteConfiguration
            | ResourceKind::BucketPublicAccessBlock
            | ResourceKind::BucketPolicy => &["bucket"],
            ResourceKind::Component(_) => &[],
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_token())
    }
}

impl From<ResourceKind> for String {
    fn from(kind: ResourceKind) -> Self {
        kind.type_token().to_string()
    }
}

impl From<String> for ResourceKind {
    fn from(token: String) -> Self {
        match token.as_str() {
            "aws:s3/bucket:Bucket" => ResourceKind::Bucket,
            "aws:s3/bucketWebsiteConfigurationV2:BucketWebsiteConfigurationV2" => {
                ResourceKind::BucketWebsiteConfiguration
            }
            "aws:s3/bucketObject:BucketObject" => ResourceKind::BucketObject,
            "aws:s3/bucketPublicAccessBlock:BucketPublicAccessBlock" => {
                ResourceKind::BucketPublicAccessBlock
            }
            "aws:s3/bucketPolicy:BucketPolicy" => ResourceKind::BucketPolicy,
            _ => ResourceKind::Component(token),
        }
    }
}

/// Options that shape how a resource is wired into the graph.
#[derive(Debug, Clone, Default)]
pub struct ResourceOptions {
    /// Owning resource; deleting the parent deletes this resource too.
    pub parent: Option<ResourceUrn>,
    /// Resources that must be realized before this one.
    pub depends_on: Vec<ResourceUrn>,
}

impl ResourceOptions {
    /// Empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the owning resource.
    pub fn parent(mut self, parent: &ResourceUrn) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    /// Add an explicit dependency.
    pub fn depends_on(mut self, resource: &ResourceUrn) -> Self {
        self.depends_on.push(resource.clone());
        self
    }
}

/// Typed arguments of a provider resource.
pub trait ResourceArgs {
    /// Kind of resource these arguments declare.
    fn kind(&self) -> ResourceKind;

    /// Convert into the generic property map the engine works with.
    fn into_properties(self) -> PropertyMap;
}

/// Snapshot of one input property, as shown in previews and diffs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Not known until the listed resources are realized
    Computed {
        /// URNs the value is derived from
        computed_from: Vec<String>,
    },
    /// Known at declaration time
    Known(Value),
}

impl PropertyValue {
    /// Whether the value is known at declaration time.
    pub fn is_known(&self) -> bool {
        matches!(self, PropertyValue::Known(_))
    }

    /// The value as a string, if it is a known string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Known(Value::String(s)) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Known(Value::String(s)) => write!(f, "{:?}", s),
            PropertyValue::Known(value) => write!(f, "{}", value),
            PropertyValue::Computed { .. } => f.write_str("(known after up)"),
        }
    }
}

/// A resource registered with a stack, with handles to its eventual outputs.
#[derive(Debug, Clone)]
pub struct RegisteredResource {
    /// Identity
    pub urn: ResourceUrn,
    /// Kind
    pub kind: ResourceKind,
    outputs: BTreeMap<String, Output<Value>>,
}

impl RegisteredResource {
    pub(crate) fn new(
        urn: ResourceUrn,
        kind: ResourceKind,
        outputs: BTreeMap<String, Output<Value>>,
    ) -> Self {
        Self { urn, kind, outputs }
    }

    /// A raw output attribute.
    pub fn output(&self, attribute: &str) -> Output<Value> {
        match self.outputs.get(attribute) {
            Some(output) => output.clone(),
            None => Output::failed(OutputError::MissingAttribute {
                urn: self.urn.to_string(),
                attribute: attribute.to_string(),
            }),
        }
    }

    /// A string output attribute.
    pub fn string_output(&self, attribute: &str) -> Output<String> {
        let attribute_name = attribute.to_string();
        self.output(attribute).try_apply(move |value| match value {
            Value::String(s) => Ok(s),
            _ => Err(OutputError::TypeMismatch {
                attribute: attribute_name,
                expected: "string".to_string(),
            }),
        })
    }

    /// Names of all output attributes.
    pub fn output_names(&self) -> impl Iterator<Item = &str> {
        self.outputs.keys().map(String::as_str)
    }
}
