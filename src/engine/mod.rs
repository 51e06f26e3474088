//! Standalone Execution Engine
//!
//! Realizes a declared [`Stack`] against a [`Provider`]. Resources are
//! scheduled as soon as every resource they depend on has been realized,
//! so independent branches (the website configuration, the objects, and
//! the public access block of a static page) run concurrently, bounded by
//! a semaphore.
//!
//! On the first provider error no further resource is started. Resources
//! already running finish, every resource downstream of the failure is
//! reported as skipped, and the provider error is returned unchanged.
//!
//! Components have no provider-side existence. They unblock their children
//! immediately and are complete once their registered outputs resolve.

pub mod provider;
pub mod simulated;

#[cfg(feature = "aws")]
pub mod aws;

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::output::OutputError;
use crate::resource::{PropertyMap, ResourceKind, ResourceUrn};
use crate::state::{DiffEngine, DiffReport, ResolverSet, ResourceGraph, Stack, StateSnapshot};

pub use provider::{
    CreateRequest, DeleteRequest, Outputs, Provider, ProviderError, ProviderResult,
};
pub use simulated::{Operation, ProviderEvent, SimulatedProvider, DEFAULT_REGION};

#[cfg(feature = "aws")]
pub use aws::AwsProvider;

/// Default number of resources realized concurrently.
pub const DEFAULT_PARALLELISM: usize = 10;

/// Outcome of one resource in a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    /// Realized (or, for components, all outputs resolved)
    Created,
    /// Not started because a dependency failed or the run was aborted
    Skipped,
    /// The provider rejected it
    Failed,
}

/// What happened to one resource
#[derive(Debug, Clone, Serialize)]
pub struct ResourceRecord {
    /// Resource URN
    pub urn: ResourceUrn,
    /// Resource kind
    pub kind: ResourceKind,
    /// Outcome
    pub status: ResourceStatus,
    /// Resolved inputs sent to the provider
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, Value>,
    /// Reported outputs, or resolved registered outputs for components
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: Outputs,
    /// Failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Counts of a deployment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeploymentSummary {
    /// Realized resources
    pub created: usize,
    /// Skipped resources
    pub skipped: usize,
    /// Failed resources
    pub failed: usize,
}

/// Result of realizing a stack
#[derive(Debug, Serialize)]
pub struct Deployment {
    /// Unique id of this run
    pub id: Uuid,
    /// Project name
    pub project: String,
    /// Stack name
    pub stack: String,
    /// Provider used
    pub provider: String,
    /// Start time
    pub started_at: DateTime<Utc>,
    /// End time
    pub finished_at: DateTime<Utc>,
    /// Per-resource outcome; realized resources appear in completion order
    pub resources: IndexMap<ResourceUrn, ResourceRecord>,
    /// Resolved stack exports
    pub outputs: BTreeMap<String, Value>,
    /// First error that stopped the run
    #[serde(skip)]
    pub failure: Option<Error>,
}

impl Deployment {
    /// Whether every resource was realized.
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// The error that stopped the run.
    pub fn failure(&self) -> Option<&Error> {
        self.failure.as_ref()
    }

    /// Outcome of one resource.
    pub fn status_of(&self, urn: &ResourceUrn) -> Option<ResourceStatus> {
        self.resources.get(urn).map(|r| r.status)
    }

    /// Outputs of one resource.
    pub fn outputs_of(&self, urn: &ResourceUrn) -> Option<&Outputs> {
        self.resources.get(urn).map(|r| &r.outputs)
    }

    /// Realized provider resources, in completion order.
    pub fn completion_order(&self) -> Vec<&ResourceUrn> {
        self.resources
            .values()
            .filter(|r| r.status == ResourceStatus::Created && !r.kind.is_component())
            .map(|r| &r.urn)
            .collect()
    }

    /// Resources with the given outcome.
    pub fn with_status(&self, status: ResourceStatus) -> impl Iterator<Item = &ResourceRecord> {
        self.resources.values().filter(move |r| r.status == status)
    }

    /// Summary counts.
    pub fn summary(&self) -> DeploymentSummary {
        let mut summary = DeploymentSummary::default();
        for record in self.resources.values() {
            match record.status {
                ResourceStatus::Created => summary.created += 1,
                ResourceStatus::Skipped => summary.skipped += 1,
                ResourceStatus::Failed => summary.failed += 1,
            }
        }
        summary
    }

    /// Wall-clock duration.
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// What `up` would do
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    /// Desired state
    pub snapshot: StateSnapshot,
    /// Changes against the previous state
    pub diff: DiffReport,
    /// Groups of resources that can be realized concurrently, in order
    pub waves: Vec<Vec<ResourceUrn>>,
}

type Realized = (BTreeMap<String, Value>, Outputs);

/// Realizes stacks against a provider.
#[derive(Debug, Clone)]
pub struct Engine {
    provider: Arc<dyn Provider>,
    parallelism: usize,
}

impl Engine {
    /// Create an engine for `provider`.
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            parallelism: DEFAULT_PARALLELISM,
        }
    }

    /// Limit how many resources are realized at once.
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Concurrency limit.
    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// The provider.
    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    /// Compute the plan for `stack` without touching the provider.
    pub fn preview(&self, stack: &Stack, previous: Option<&StateSnapshot>) -> Result<Plan> {
        let waves = stack.graph().execution_waves()?;
        let snapshot = stack.snapshot();
        let diff = DiffEngine::new().diff(previous, &snapshot);
        debug!(
            resources = snapshot.resources.len(),
            waves = waves.len(),
            changes = diff.summary.total_changes(),
            "Computed plan"
        );
        Ok(Plan {
            snapshot,
            diff,
            waves,
        })
    }

    /// Realize `stack`, returning the error that stopped the run, if any.
    pub async fn up(&self, stack: Stack) -> Result<Deployment> {
        let mut deployment = self.execute(stack).await;
        match deployment.failure.take() {
            Some(err) => Err(err),
            None => Ok(deployment),
        }
    }

    /// Realize `stack`. Always returns the deployment; a failure is recorded
    /// in [`Deployment::failure`].
    #[instrument(skip_all, fields(project = %stack.project(), stack = %stack.name(), provider = %self.provider.name()))]
    pub async fn execute(&self, mut stack: Stack) -> Deployment {
        let started_at = Utc::now();
        info!("Realizing {} resources", stack.len());

        let mut run = Run::new(&mut stack);
        if let Err(err) = stack.graph().execution_order() {
            run.failure = Some(err);
        } else {
            run.schedule(&stack, &self.provider, self.parallelism).await;
        }

        // Outputs of resources that never ran can no longer resolve.
        let abandoned = run.resolvers.len();
        run.resolvers.clear();
        if abandoned > 0 {
            debug!(abandoned, "Abandoned outputs of unrealized resources");
        }

        run.finalize_components(&stack).await;
        run.mark_skipped(&stack);
        let outputs = run.resolve_exports(&stack).await;

        let deployment = Deployment {
            id: Uuid::new_v4(),
            project: stack.project().to_string(),
            stack: stack.name().to_string(),
            provider: self.provider.name().to_string(),
            started_at,
            finished_at: Utc::now(),
            resources: run.records,
            outputs,
            failure: run.failure,
        };

        let summary = deployment.summary();
        match &deployment.failure {
            None => info!(
                created = summary.created,
                "Deployment {} completed",
                deployment.id
            ),
            Some(err) => warn!(
                created = summary.created,
                skipped = summary.skipped,
                failed = summary.failed,
                "Deployment {} failed: {}",
                deployment.id,
                err
            ),
        }
        deployment
    }

    /// Delete every resource a deployment realized, dependents first.
    /// Returns the deleted URNs in deletion order.
    #[instrument(skip_all, fields(deployment = %deployment.id))]
    pub async fn destroy(&self, deployment: &Deployment) -> Result<Vec<ResourceUrn>> {
        let mut deleted = Vec::new();

        for urn in deployment.completion_order().into_iter().rev() {
            let Some(record) = deployment.resources.get(urn) else {
                continue;
            };
            let request = DeleteRequest {
                urn: record.urn.clone(),
                kind: record.kind.clone(),
                inputs: record.inputs.clone(),
                outputs: record.outputs.clone(),
            };
            self.provider.delete(&request).await?;
            debug!(urn = %urn, "Deleted resource");
            deleted.push(urn.clone());
        }

        info!("Destroyed {} resources", deleted.len());
        Ok(deleted)
    }
}

/// Mutable bookkeeping of one `execute` call.
struct Run {
    graph: ResourceGraph,
    resolvers: HashMap<ResourceUrn, ResolverSet>,
    records: IndexMap<ResourceUrn, ResourceRecord>,
    failure: Option<Error>,
}

impl Run {
    fn new(stack: &mut Stack) -> Self {
        Self {
            graph: stack.graph().clone(),
            resolvers: stack.take_resolvers(),
            records: IndexMap::new(),
            failure: None,
        }
    }

    async fn schedule(&mut self, stack: &Stack, provider: &Arc<dyn Provider>, parallelism: usize) {
        let semaphore = Arc::new(Semaphore::new(parallelism));
        let mut tasks: JoinSet<(ResourceUrn, Result<Realized>)> = JoinSet::new();

        let mut waiting: HashMap<ResourceUrn, usize> = HashMap::new();
        let mut ready = VecDeque::new();
        for node in self.graph.nodes() {
            let count = self.graph.direct_dependencies(&node.urn).len();
            if count == 0 {
                ready.push_back(node.urn.clone());
            } else {
                waiting.insert(node.urn.clone(), count);
            }
        }

        loop {
            while self.failure.is_none() {
                let Some(urn) = ready.pop_front() else {
                    break;
                };
                let Some(declared) = stack.resource(&urn) else {
                    continue;
                };

                if declared.kind.is_component() {
                    self.release_dependents(&urn, &mut waiting, &mut ready);
                    continue;
                }

                let permit = match Arc::clone(&semaphore).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(err) => {
                        self.failure = Some(Error::Engine(err.to_string()));
                        break;
                    }
                };

                debug!(urn = %urn, "Starting resource");
                let provider = Arc::clone(provider);
                let kind = declared.kind.clone();
                let inputs = declared.inputs.clone();
                tasks.spawn(async move {
                    let _permit = permit;
                    let result = realize(provider, urn.clone(), kind, inputs).await;
                    (urn, result)
                });
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };

            match joined {
                Ok((urn, Ok((inputs, outputs)))) => {
                    self.resolve_outputs(&urn, &outputs);
                    self.insert_record(&urn, stack, ResourceStatus::Created, inputs, outputs, None);
                    self.release_dependents(&urn, &mut waiting, &mut ready);
                }
                Ok((urn, Err(err))) => {
                    warn!(urn = %urn, error = %err, "Resource failed");
                    if let Some(resolvers) = self.resolvers.remove(&urn) {
                        for resolver in resolvers.into_values() {
                            resolver.reject(OutputError::Failed {
                                urn: urn.to_string(),
                                message: err.to_string(),
                            });
                        }
                    }
                    self.insert_record(
                        &urn,
                        stack,
                        ResourceStatus::Failed,
                        BTreeMap::new(),
                        Outputs::new(),
                        Some(err.to_string()),
                    );
                    self.failure.get_or_insert(err);
                }
                Err(join_err) => {
                    self.failure
                        .get_or_insert(Error::Engine(format!("realization task failed: {}", join_err)));
                }
            }
        }
    }

    fn release_dependents(
        &self,
        urn: &ResourceUrn,
        waiting: &mut HashMap<ResourceUrn, usize>,
        ready: &mut VecDeque<ResourceUrn>,
    ) {
        for dependent in self.graph.direct_dependents(urn) {
            if let Some(count) = waiting.get_mut(&dependent) {
                *count -= 1;
                if *count == 0 {
                    waiting.remove(&dependent);
                    ready.push_back(dependent);
                }
            }
        }
    }

    fn resolve_outputs(&mut self, urn: &ResourceUrn, outputs: &Outputs) {
        let Some(resolvers) = self.resolvers.remove(urn) else {
            return;
        };
        for (attribute, resolver) in resolvers {
            match outputs.get(&attribute) {
                Some(value) => resolver.resolve(value.clone()),
                None => resolver.reject(OutputError::MissingAttribute {
                    urn: urn.to_string(),
                    attribute,
                }),
            }
        }
    }

    fn insert_record(
        &mut self,
        urn: &ResourceUrn,
        stack: &Stack,
        status: ResourceStatus,
        inputs: BTreeMap<String, Value>,
        outputs: Outputs,
        error: Option<String>,
    ) {
        let kind = stack
            .resource(urn)
            .map(|r| r.kind.clone())
            .unwrap_or_else(|| ResourceKind::Component(String::new()));
        self.records.insert(
            urn.clone(),
            ResourceRecord {
                urn: urn.clone(),
                kind,
                status,
                inputs,
                outputs,
                error,
            },
        );
    }

    /// A component is created once all its registered outputs resolve.
    async fn finalize_components(&mut self, stack: &Stack) {
        let components: Vec<ResourceUrn> = stack
            .resources()
            .filter(|r| r.kind.is_component())
            .map(|r| r.urn.clone())
            .collect();

        for urn in components {
            let Some(declared) = stack.resource(&urn) else {
                continue;
            };

            let mut outputs = Outputs::new();
            let mut error = None;
            for (name, output) in declared.outputs() {
                match output.resolve().await {
                    Ok(value) => {
                        outputs.insert(name.clone(), value);
                    }
                    Err(err) => {
                        error = Some(err);
                        break;
                    }
                }
            }

            match error {
                None => {
                    debug!(urn = %urn, "Component complete");
                    self.insert_record(&urn, stack, ResourceStatus::Created, BTreeMap::new(), outputs, None);
                }
                Some(err) if self.failure.is_some() => {
                    debug!(urn = %urn, error = %err, "Component incomplete");
                }
                Some(err) => {
                    self.insert_record(
                        &urn,
                        stack,
                        ResourceStatus::Failed,
                        BTreeMap::new(),
                        Outputs::new(),
                        Some(err.to_string()),
                    );
                    self.failure = Some(Error::Output(err));
                }
            }
        }
    }

    fn mark_skipped(&mut self, stack: &Stack) {
        for declared in stack.resources() {
            if !self.records.contains_key(&declared.urn) {
                self.insert_record(
                    &declared.urn,
                    stack,
                    ResourceStatus::Skipped,
                    BTreeMap::new(),
                    Outputs::new(),
                    None,
                );
            }
        }
    }

    async fn resolve_exports(&mut self, stack: &Stack) -> BTreeMap<String, Value> {
        let mut outputs = BTreeMap::new();
        for (name, output) in stack.exports() {
            match output.resolve().await {
                Ok(value) => {
                    outputs.insert(name.clone(), value);
                }
                Err(err) => {
                    debug!(export = %name, error = %err, "Stack output unavailable");
                    self.failure.get_or_insert(Error::Output(err));
                }
            }
        }
        outputs
    }
}

/// Resolve the inputs of one resource and hand it to the provider.
async fn realize(
    provider: Arc<dyn Provider>,
    urn: ResourceUrn,
    kind: ResourceKind,
    inputs: PropertyMap,
) -> Result<Realized> {
    let mut resolved = BTreeMap::new();
    for (name, input) in inputs {
        resolved.insert(name, input.resolve().await?);
    }

    let request = CreateRequest {
        urn,
        kind,
        inputs: resolved,
    };
    let outputs = provider.create(&request).await?;
    debug!(urn = %request.urn, "Created resource");
    Ok((request.inputs, outputs))
}
