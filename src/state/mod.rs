//! Declaration Scope and Desired State
//!
//! A [`Stack`] collects every resource a program declares, wires the
//! dependency edges implied by parents, inputs, and explicit `depends_on`,
//! and hands out deferred outputs for each resource. Declaration is
//! synchronous; realizing the stack is the engine's job.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                           Stack                              │
//! │   (URN registry, declared inputs, deferred output handles)   │
//! └─────────────────────────────────────────────────────────────┘
//!                 │                               │
//!                 ▼                               ▼
//!      ┌─────────────────────┐        ┌─────────────────────┐
//!      │   ResourceGraph     │        │   StateSnapshot     │
//!      │ (typed dependency   │        │  (serializable      │
//!      │  edges, ordering)   │        │   desired state)    │
//!      └─────────────────────┘        └─────────────────────┘
//!                                                 │
//!                                                 ▼
//!                                     ┌─────────────────────┐
//!                                     │     DiffEngine      │
//!                                     │ (create / update /  │
//!                                     │  replace / delete)  │
//!                                     └─────────────────────┘
//! ```

pub mod dependencies;
pub mod diff;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::output::{Output, OutputResolver};
use crate::resource::{
    PropertyMap, PropertyValue, RegisteredResource, ResourceArgs, ResourceKind, ResourceOptions,
    ResourceUrn,
};

pub use dependencies::{DependencyKind, GraphNode, ResourceDependency, ResourceGraph};
pub use diff::{ChangeType, DiffEngine, DiffReport, DiffSummary, PropertyChange, ResourceChange};

/// Resolvers for the output attributes of one resource.
pub(crate) type ResolverSet = BTreeMap<String, OutputResolver<Value>>;

/// A resource as declared in a stack.
#[derive(Debug, Clone)]
pub struct DeclaredResource {
    /// Identity
    pub urn: ResourceUrn,
    /// Kind
    pub kind: ResourceKind,
    /// Owning resource
    pub parent: Option<ResourceUrn>,
    /// Declared inputs (empty for components)
    pub inputs: PropertyMap,
    /// Explicit dependencies
    pub depends_on: Vec<ResourceUrn>,
    /// Provider attributes, or registered outputs for components
    outputs: BTreeMap<String, Output<Value>>,
    outputs_registered: bool,
}

impl DeclaredResource {
    /// Output handles of this resource.
    pub fn outputs(&self) -> &BTreeMap<String, Output<Value>> {
        &self.outputs
    }

    /// Whether a component has registered its outputs.
    pub fn outputs_registered(&self) -> bool {
        self.outputs_registered
    }

    /// Snapshot the declared inputs.
    pub fn input_properties(&self) -> BTreeMap<String, PropertyValue> {
        self.inputs
            .iter()
            .map(|(name, input)| (name.clone(), input.to_property()))
            .collect()
    }
}

/// The in-process declaration scope of one project and stack.
#[derive(Debug)]
pub struct Stack {
    project: String,
    name: String,
    graph: ResourceGraph,
    resources: IndexMap<ResourceUrn, DeclaredResource>,
    resolvers: HashMap<ResourceUrn, ResolverSet>,
    exports: BTreeMap<String, Output<Value>>,
}

impl Stack {
    /// Create an empty stack.
    pub fn new(project: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            name: name.into(),
            graph: ResourceGraph::new(),
            resources: IndexMap::new(),
            resolvers: HashMap::new(),
            exports: BTreeMap::new(),
        }
    }

    /// Project name.
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Stack name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a logical component. Components have no provider-side
    /// existence; they group children and publish outputs.
    pub fn register_component(
        &mut self,
        type_token: &str,
        name: &str,
        opts: &ResourceOptions,
    ) -> Result<ResourceUrn> {
        let kind = ResourceKind::Component(type_token.to_string());
        let urn = self.declare(kind, name, PropertyMap::new(), opts)?;
        Ok(urn)
    }

    /// Register a provider resource and return handles to its eventual
    /// output attributes. Output-typed inputs become dependency edges.
    pub fn register_resource<A: ResourceArgs>(
        &mut self,
        name: &str,
        args: A,
        opts: &ResourceOptions,
    ) -> Result<RegisteredResource> {
        let kind = args.kind();
        let inputs = args.into_properties();
        let urn = self.declare(kind.clone(), name, inputs, opts)?;

        let mut outputs = BTreeMap::new();
        let mut resolvers = ResolverSet::new();
        for attribute in kind.output_names() {
            let (output, resolver) = Output::<Value>::deferred(&urn);
            outputs.insert(attribute.to_string(), output);
            resolvers.insert(attribute.to_string(), resolver);
        }

        if let Some(declared) = self.resources.get_mut(&urn) {
            declared.outputs = outputs.clone();
        }
        self.resolvers.insert(urn.clone(), resolvers);

        Ok(RegisteredResource::new(urn, kind, outputs))
    }

    fn declare(
        &mut self,
        kind: ResourceKind,
        name: &str,
        inputs: PropertyMap,
        opts: &ResourceOptions,
    ) -> Result<ResourceUrn> {
        let urn = ResourceUrn::new(&self.name, &self.project, opts.parent.as_ref(), &kind, name);

        // Validate everything before touching the graph.
        if self.resources.contains_key(&urn) {
            return Err(Error::DuplicateResource(urn.to_string()));
        }
        if let Some(parent) = &opts.parent {
            self.require(parent)?;
        }
        for dependency in &opts.depends_on {
            self.require(dependency)?;
        }
        let input_resources: BTreeSet<ResourceUrn> =
            inputs.values().flat_map(|input| input.resources()).collect();
        for producer in &input_resources {
            self.require(producer)?;
        }

        self.graph.add_node(urn.clone(), kind.clone())?;
        if let Some(parent) = &opts.parent {
            self.graph
                .add_dependency(&urn, parent, DependencyKind::Parent)?;
        }
        for producer in &input_resources {
            self.graph
                .add_dependency(&urn, producer, DependencyKind::Input)?;
        }
        for dependency in &opts.depends_on {
            self.graph
                .add_dependency(&urn, dependency, DependencyKind::Explicit)?;
        }

        debug!(urn = %urn, kind = %kind.short_name(), "Declared resource");
        trace!(inputs = ?inputs.keys().collect::<Vec<_>>(), "Resource inputs");

        self.resources.insert(
            urn.clone(),
            DeclaredResource {
                urn: urn.clone(),
                kind,
                parent: opts.parent.clone(),
                inputs,
                depends_on: opts.depends_on.clone(),
                outputs: BTreeMap::new(),
                outputs_registered: false,
            },
        );
        Ok(urn)
    }

    fn require(&self, urn: &ResourceUrn) -> Result<()> {
        if self.resources.contains_key(urn) {
            Ok(())
        } else {
            Err(Error::ResourceNotFound(urn.to_string()))
        }
    }

    /// Publish the outputs of a component. A component is complete once
    /// all of them resolve.
    pub fn register_outputs(
        &mut self,
        urn: &ResourceUrn,
        outputs: BTreeMap<String, Output<Value>>,
    ) -> Result<()> {
        let declared = self
            .resources
            .get_mut(urn)
            .ok_or_else(|| Error::ResourceNotFound(urn.to_string()))?;
        if declared.outputs_registered {
            return Err(Error::OutputsAlreadyRegistered(urn.to_string()));
        }
        debug!(urn = %urn, outputs = ?outputs.keys().collect::<Vec<_>>(), "Registered outputs");
        declared.outputs = outputs;
        declared.outputs_registered = true;
        Ok(())
    }

    /// Registered outputs of a resource.
    pub fn outputs_of(&self, urn: &ResourceUrn) -> Option<&BTreeMap<String, Output<Value>>> {
        self.resources.get(urn).map(|r| &r.outputs)
    }

    /// Export a stack-level output.
    pub fn export(&mut self, name: impl Into<String>, value: Output<Value>) {
        self.exports.insert(name.into(), value);
    }

    /// Stack-level outputs.
    pub fn exports(&self) -> &BTreeMap<String, Output<Value>> {
        &self.exports
    }

    /// A declared resource.
    pub fn resource(&self, urn: &ResourceUrn) -> Option<&DeclaredResource> {
        self.resources.get(urn)
    }

    /// Declared resources in declaration order.
    pub fn resources(&self) -> impl Iterator<Item = &DeclaredResource> {
        self.resources.values()
    }

    /// Resources of one kind, in declaration order.
    pub fn resources_of_kind<'a>(
        &'a self,
        kind: &'a ResourceKind,
    ) -> impl Iterator<Item = &'a DeclaredResource> + 'a {
        self.resources.values().filter(move |r| &r.kind == kind)
    }

    /// Number of declared resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether nothing was declared.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// The dependency graph.
    pub fn graph(&self) -> &ResourceGraph {
        &self.graph
    }

    /// Serializable desired state.
    pub fn snapshot(&self) -> StateSnapshot {
        let resources = self
            .resources
            .values()
            .map(|r| {
                let mut dependencies: Vec<String> = self
                    .graph
                    .direct_dependencies(&r.urn)
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                dependencies.sort();

                let outputs = if r.outputs_registered {
                    r.outputs.keys().cloned().collect()
                } else {
                    Vec::new()
                };

                (
                    r.urn.to_string(),
                    ResourceState {
                        kind: r.kind.clone(),
                        parent: r.parent.as_ref().map(ToString::to_string),
                        dependencies,
                        inputs: r.input_properties(),
                        outputs,
                    },
                )
            })
            .collect();

        StateSnapshot {
            project: self.project.clone(),
            stack: self.name.clone(),
            resources,
            outputs: self.exports.keys().cloned().collect(),
        }
    }

    /// Hand the output resolvers to the engine. Called once per realization.
    pub(crate) fn take_resolvers(&mut self) -> HashMap<ResourceUrn, ResolverSet> {
        std::mem::take(&mut self.resolvers)
    }
}

/// Desired state of one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Resource type token
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    /// Owning resource URN
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// URNs of direct dependencies, sorted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    /// Declared input properties
    #[serde(default)]
    pub inputs: BTreeMap<String, PropertyValue>,
    /// Registered output names (components only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<String>,
}

/// Serializable desired state of a stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Project name
    pub project: String,
    /// Stack name
    pub stack: String,
    /// Resources keyed by URN
    pub resources: BTreeMap<String, ResourceState>,
    /// Exported stack output names
    #[serde(default)]
    pub outputs: Vec<String>,
}

impl StateSnapshot {
    /// Parse a snapshot from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Render as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a snapshot file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Write a snapshot file.
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Resources of one kind.
    pub fn resources_of_kind<'a>(
        &'a self,
        kind: &'a ResourceKind,
    ) -> impl Iterator<Item = (&'a String, &'a ResourceState)> + 'a {
        self.resources.iter().filter(move |(_, r)| &r.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{BucketArgs, BucketObjectArgs, BucketPolicyArgs, STATIC_PAGE_TYPE};

    fn object_args(bucket: &RegisteredResource, key: &str) -> BucketObjectArgs {
        BucketObjectArgs {
            bucket: bucket.string_output("bucket").into(),
            key: key.to_string(),
            content: "<h1>Hello</h1>".to_string(),
            content_type: "text/html".to_string(),
        }
    }

    #[test]
    fn test_register_component_and_children() {
        let mut stack = Stack::new("site", "dev");
        let component = stack
            .register_component(STATIC_PAGE_TYPE, "demo", &ResourceOptions::new())
            .unwrap();
        let bucket = stack
            .register_resource(
                "demo",
                BucketArgs::default(),
                &ResourceOptions::new().parent(&component),
            )
            .unwrap();
        let object = stack
            .register_resource(
                "demo-index-object",
                object_args(&bucket, "index.html"),
                &ResourceOptions::new().parent(&bucket.urn),
            )
            .unwrap();

        assert_eq!(stack.len(), 3);
        assert_eq!(
            stack.graph().dependency_kinds(&object.urn, &bucket.urn),
            BTreeSet::from([DependencyKind::Parent, DependencyKind::Input])
        );
        assert!(bucket.output_names().any(|n| n == "arn"));
        assert!(!bucket.output("bucket").is_ready());
    }

    #[test]
    fn test_duplicate_urn_rejected() {
        let mut stack = Stack::new("site", "dev");
        stack
            .register_resource("demo", BucketArgs::default(), &ResourceOptions::new())
            .unwrap();
        let err = stack
            .register_resource("demo", BucketArgs::default(), &ResourceOptions::new())
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateResource(_)));
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_unknown_dependency_rejected_without_side_effects() {
        let mut stack = Stack::new("site", "dev");
        let ghost = ResourceUrn::new("dev", "site", None, &ResourceKind::Bucket, "ghost");
        let err = stack
            .register_resource(
                "demo",
                BucketArgs::default(),
                &ResourceOptions::new().depends_on(&ghost),
            )
            .unwrap_err();
        assert!(matches!(err, Error::ResourceNotFound(_)));
        assert!(stack.is_empty());
        assert_eq!(stack.graph().node_count(), 0);
    }

    #[test]
    fn test_input_from_other_stack_is_rejected() {
        let mut other = Stack::new("site", "other");
        let foreign = other
            .register_resource("demo", BucketArgs::default(), &ResourceOptions::new())
            .unwrap();

        let mut stack = Stack::new("site", "dev");
        let err = stack
            .register_resource(
                "demo-bucket-policy",
                BucketPolicyArgs {
                    bucket: foreign.string_output("bucket").into(),
                    policy: "{}".into(),
                },
                &ResourceOptions::new(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::ResourceNotFound(_)));
    }

    #[test]
    fn test_register_outputs_once() {
        let mut stack = Stack::new("site", "dev");
        let component = stack
            .register_component(STATIC_PAGE_TYPE, "demo", &ResourceOptions::new())
            .unwrap();
        let outputs = BTreeMap::from([(
            "endpoint".to_string(),
            Output::known(Value::String("http://example/".into())),
        )]);
        stack.register_outputs(&component, outputs.clone()).unwrap();
        assert!(stack.resource(&component).unwrap().outputs_registered());
        assert!(matches!(
            stack.register_outputs(&component, outputs),
            Err(Error::OutputsAlreadyRegistered(_))
        ));
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let mut stack = Stack::new("site", "dev");
        let bucket = stack
            .register_resource("demo", BucketArgs::default(), &ResourceOptions::new())
            .unwrap();
        stack
            .register_resource(
                "demo-index-object",
                object_args(&bucket, "index.html"),
                &ResourceOptions::new().parent(&bucket.urn),
            )
            .unwrap();
        stack.export("bucket", bucket.output("bucket"));

        let snapshot = stack.snapshot();
        assert_eq!(snapshot.resources.len(), 2);
        assert_eq!(snapshot.outputs, vec!["bucket".to_string()]);

        let object = snapshot
            .resources_of_kind(&ResourceKind::BucketObject)
            .next()
            .map(|(_, r)| r)
            .unwrap();
        assert_eq!(object.dependencies, vec![bucket.urn.to_string()]);
        assert!(!object.inputs["bucket"].is_known());
        assert_eq!(object.inputs["key"].as_str(), Some("index.html"));

        let json = snapshot.to_json().unwrap();
        let back = StateSnapshot::from_json(&json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn test_take_resolvers_once() {
        let mut stack = Stack::new("site", "dev");
        stack
            .register_resource("demo", BucketArgs::default(), &ResourceOptions::new())
            .unwrap();
        let resolvers = stack.take_resolvers();
        assert_eq!(resolvers.len(), 1);
        assert!(stack.take_resolvers().is_empty());
    }
}
