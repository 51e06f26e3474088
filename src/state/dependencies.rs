//! Resource Dependency Tracking
//!
//! The desired state of a stack is a directed acyclic graph. An edge
//! `a -> b` means `b` depends on `a`: `a` is realized first and deleted last.
//! Edges carry the reason they exist:
//!
//! - [`DependencyKind::Parent`]: ownership, used for lifecycle scoping
//! - [`DependencyKind::Input`]: `b` consumes an output of `a`
//! - [`DependencyKind::Explicit`]: declared with `depends_on`
//!
//! This enables:
//!
//! - Execution ordering and parallel waves
//! - Teardown ordering (reverse of execution)
//! - Cycle detection
//! - Visualization in DOT and Mermaid formats

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::resource::{ResourceKind, ResourceUrn};

/// A node in the resource graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    /// Resource identity
    pub urn: ResourceUrn,
    /// Resource kind
    pub kind: ResourceKind,
    /// Declaration order
    pub sequence: u64,
}

/// Why one resource depends on another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// Ownership (parent before child)
    Parent,
    /// Consumes an output of the dependency
    Input,
    /// Declared through `depends_on`
    Explicit,
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyKind::Parent => write!(f, "parent"),
            DependencyKind::Input => write!(f, "input"),
            DependencyKind::Explicit => write!(f, "explicit"),
        }
    }
}

/// A dependency edge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDependency {
    /// Realized first
    pub dependency: ResourceUrn,
    /// Realized after `dependency`
    pub dependent: ResourceUrn,
    /// Reason for the edge
    pub kind: DependencyKind,
}

/// The dependency graph of a stack
#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    /// The underlying graph
    graph: DiGraph<GraphNode, ResourceDependency>,
    /// Map from URN to node index
    node_indices: HashMap<ResourceUrn, NodeIndex>,
    /// Next declaration sequence number
    sequence_counter: u64,
}

impl ResourceGraph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource to the graph
    pub fn add_node(&mut self, urn: ResourceUrn, kind: ResourceKind) -> Result<NodeIndex> {
        if self.node_indices.contains_key(&urn) {
            return Err(Error::DuplicateResource(urn.to_string()));
        }

        let node = GraphNode {
            urn: urn.clone(),
            kind,
            sequence: self.sequence_counter,
        };
        self.sequence_counter += 1;

        let idx = self.graph.add_node(node);
        self.node_indices.insert(urn, idx);
        Ok(idx)
    }

    /// Record that `dependent` depends on `dependency`
    pub fn add_dependency(
        &mut self,
        dependent: &ResourceUrn,
        dependency: &ResourceUrn,
        kind: DependencyKind,
    ) -> Result<()> {
        if dependent == dependency {
            return Err(Error::SelfDependency(dependent.to_string()));
        }
        let to_idx = self.index_of(dependent)?;
        let from_idx = self.index_of(dependency)?;

        let exists = self
            .graph
            .edges_connecting(from_idx, to_idx)
            .any(|edge| edge.weight().kind == kind);
        if !exists {
            self.graph.add_edge(
                from_idx,
                to_idx,
                ResourceDependency {
                    dependency: dependency.clone(),
                    dependent: dependent.clone(),
                    kind,
                },
            );
        }
        Ok(())
    }

    fn index_of(&self, urn: &ResourceUrn) -> Result<NodeIndex> {
        self.node_indices
            .get(urn)
            .copied()
            .ok_or_else(|| Error::ResourceNotFound(urn.to_string()))
    }

    /// Whether the resource is in the graph
    pub fn contains(&self, urn: &ResourceUrn) -> bool {
        self.node_indices.contains_key(urn)
    }

    /// Get a node by URN
    pub fn node(&self, urn: &ResourceUrn) -> Option<&GraphNode> {
        self.node_indices
            .get(urn)
            .and_then(|idx| self.graph.node_weight(*idx))
    }

    /// All nodes in declaration order
    pub fn nodes(&self) -> Vec<&GraphNode> {
        let mut nodes: Vec<&GraphNode> = self.graph.node_weights().collect();
        nodes.sort_by_key(|n| n.sequence);
        nodes
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Get the number of edges
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// All edges
    pub fn edges(&self) -> impl Iterator<Item = &ResourceDependency> {
        self.graph.edge_weights()
    }

    /// Check for dependency cycles
    pub fn has_cycles(&self) -> bool {
        tarjan_scc(&self.graph).iter().any(|scc| scc.len() > 1)
    }

    /// Get all cycles in the graph
    pub fn get_cycles(&self) -> Vec<Vec<ResourceUrn>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .map(|scc| {
                scc.into_iter()
                    .filter_map(|idx| self.graph.node_weight(idx).map(|n| n.urn.clone()))
                    .collect()
            })
            .collect()
    }

    /// Topological order: every resource appears after its dependencies
    pub fn execution_order(&self) -> Result<Vec<ResourceUrn>> {
        Ok(self.execution_waves()?.into_iter().flatten().collect())
    }

    /// Group resources into waves. Resources in one wave do not depend on
    /// each other and can be realized concurrently once all earlier waves
    /// are done.
    pub fn execution_waves(&self) -> Result<Vec<Vec<ResourceUrn>>> {
        if let Err(cycle) = toposort(&self.graph, None) {
            let urn = self
                .graph
                .node_weight(cycle.node_id())
                .map(|n| n.urn.to_string())
                .unwrap_or_default();
            return Err(Error::CircularDependency(format!(
                "cannot determine execution order, cycle through '{}'",
                urn
            )));
        }

        let mut remaining: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|idx| (idx, self.direct_predecessors(idx).len()))
            .collect();

        let mut current: Vec<NodeIndex> = remaining
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(idx, _)| *idx)
            .collect();

        let mut waves = Vec::new();
        while !current.is_empty() {
            current.sort_by_key(|idx| self.graph[*idx].sequence);

            let mut next = Vec::new();
            for idx in &current {
                for succ in self.direct_successors(*idx) {
                    if let Some(count) = remaining.get_mut(&succ) {
                        *count -= 1;
                        if *count == 0 {
                            next.push(succ);
                        }
                    }
                }
            }

            waves.push(
                current
                    .iter()
                    .map(|idx| self.graph[*idx].urn.clone())
                    .collect(),
            );
            current = next;
        }

        Ok(waves)
    }

    fn direct_predecessors(&self, idx: NodeIndex) -> HashSet<NodeIndex> {
        self.graph
            .neighbors_directed(idx, Direction::Incoming)
            .collect()
    }

    fn direct_successors(&self, idx: NodeIndex) -> HashSet<NodeIndex> {
        self.graph
            .neighbors_directed(idx, Direction::Outgoing)
            .collect()
    }

    fn sorted_urns(&self, indices: impl IntoIterator<Item = NodeIndex>) -> Vec<ResourceUrn> {
        let mut nodes: Vec<&GraphNode> = indices
            .into_iter()
            .filter_map(|idx| self.graph.node_weight(idx))
            .collect();
        nodes.sort_by_key(|n| n.sequence);
        nodes.into_iter().map(|n| n.urn.clone()).collect()
    }

    /// Resources `urn` directly depends on
    pub fn direct_dependencies(&self, urn: &ResourceUrn) -> Vec<ResourceUrn> {
        match self.node_indices.get(urn) {
            Some(&idx) => self.sorted_urns(self.direct_predecessors(idx)),
            None => Vec::new(),
        }
    }

    /// Resources that directly depend on `urn`
    pub fn direct_dependents(&self, urn: &ResourceUrn) -> Vec<ResourceUrn> {
        match self.node_indices.get(urn) {
            Some(&idx) => self.sorted_urns(self.direct_successors(idx)),
            None => Vec::new(),
        }
    }

    /// Resources `urn` depends on, directly or transitively
    pub fn dependencies_of(&self, urn: &ResourceUrn) -> Vec<ResourceUrn> {
        self.reachable(urn, Direction::Incoming)
    }

    /// Resources depending on `urn`, directly or transitively
    pub fn dependents_of(&self, urn: &ResourceUrn) -> Vec<ResourceUrn> {
        self.reachable(urn, Direction::Outgoing)
    }

    fn reachable(&self, urn: &ResourceUrn, direction: Direction) -> Vec<ResourceUrn> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();

        if let Some(&start_idx) = self.node_indices.get(urn) {
            queue.push_back(start_idx);

            while let Some(current) = queue.pop_front() {
                for neighbor in self.graph.neighbors_directed(current, direction) {
                    if seen.insert(neighbor) {
                        queue.push_back(neighbor);
                    }
                }
            }
        }

        self.sorted_urns(seen)
    }

    /// Whether `dependent` depends on `dependency`, directly or transitively
    pub fn depends_on(&self, dependent: &ResourceUrn, dependency: &ResourceUrn) -> bool {
        self.dependencies_of(dependent).contains(dependency)
    }

    /// Kinds of direct edges from `dependency` to `dependent`
    pub fn dependency_kinds(
        &self,
        dependent: &ResourceUrn,
        dependency: &ResourceUrn,
    ) -> BTreeSet<DependencyKind> {
        match (
            self.node_indices.get(dependency),
            self.node_indices.get(dependent),
        ) {
            (Some(&from), Some(&to)) => self
                .graph
                .edges_connecting(from, to)
                .map(|edge| edge.weight().kind)
                .collect(),
            _ => BTreeSet::new(),
        }
    }

    /// Resources owned by `urn`
    pub fn children_of(&self, urn: &ResourceUrn) -> Vec<ResourceUrn> {
        match self.node_indices.get(urn) {
            Some(&idx) => self.sorted_urns(
                self.graph
                    .edges_directed(idx, Direction::Outgoing)
                    .filter(|edge| edge.weight().kind == DependencyKind::Parent)
                    .map(|edge| edge.target()),
            ),
            None => Vec::new(),
        }
    }

    /// Generate a DOT format representation for visualization
    pub fn to_dot(&self) -> String {
        let mut output = String::new();
        output.push_str("digraph resources {\n");
        output.push_str("  rankdir=LR;\n");
        output.push_str("  node [shape=box];\n\n");

        for node in self.nodes() {
            let label = format!("{}\\n{}", node.urn.name(), node.kind.short_name());
            output.push_str(&format!("  \"{}\" [label=\"{}\"];\n", node.urn, label));
        }

        output.push('\n');

        for edge in self.graph.edge_references() {
            let dep = edge.weight();
            let style = match dep.kind {
                DependencyKind::Parent => "dotted",
                DependencyKind::Input => "solid",
                DependencyKind::Explicit => "bold",
            };
            output.push_str(&format!(
                "  \"{}\" -> \"{}\" [style={}, label=\"{}\"];\n",
                dep.dependency, dep.dependent, style, dep.kind
            ));
        }

        output.push_str("}\n");
        output
    }

    /// Generate a Mermaid flowchart
    pub fn to_mermaid(&self) -> String {
        let mut output = String::from("flowchart LR\n");
        let ids: HashMap<&ResourceUrn, String> = self
            .nodes()
            .into_iter()
            .map(|n| (&n.urn, format!("n{}", n.sequence)))
            .collect();

        for node in self.nodes() {
            output.push_str(&format!(
                "    {}[\"{} ({})\"]\n",
                ids[&node.urn],
                node.urn.name(),
                node.kind.short_name()
            ));
        }

        for edge in self.graph.edge_weights() {
            let arrow = match edge.kind {
                DependencyKind::Parent => "-.->",
                DependencyKind::Input => "-->",
                DependencyKind::Explicit => "==>",
            };
            output.push_str(&format!(
                "    {} {}|{}| {}\n",
                ids[&edge.dependency], arrow, edge.kind, ids[&edge.dependent]
            ));
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urn(kind: &ResourceKind, name: &str) -> ResourceUrn {
        ResourceUrn::new("dev", "site", None, kind, name)
    }

    fn sample_graph() -> (ResourceGraph, ResourceUrn, ResourceUrn, ResourceUrn, ResourceUrn) {
        let mut graph = ResourceGraph::new();
        let bucket = urn(&ResourceKind::Bucket, "demo");
        let object = urn(&ResourceKind::BucketObject, "demo-index-object");
        let block = urn(&ResourceKind::BucketPublicAccessBlock, "demo-public-access-block");
        let policy = urn(&ResourceKind::BucketPolicy, "demo-bucket-policy");

        graph.add_node(bucket.clone(), ResourceKind::Bucket).unwrap();
        graph.add_node(object.clone(), ResourceKind::BucketObject).unwrap();
        graph
            .add_node(block.clone(), ResourceKind::BucketPublicAccessBlock)
            .unwrap();
        graph.add_node(policy.clone(), ResourceKind::BucketPolicy).unwrap();

        graph.add_dependency(&object, &bucket, DependencyKind::Parent).unwrap();
        graph.add_dependency(&block, &bucket, DependencyKind::Parent).unwrap();
        graph.add_dependency(&policy, &bucket, DependencyKind::Parent).unwrap();
        graph.add_dependency(&policy, &block, DependencyKind::Explicit).unwrap();

        (graph, bucket, object, block, policy)
    }

    #[test]
    fn test_graph_creation() {
        let graph = ResourceGraph::new();
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let mut graph = ResourceGraph::new();
        let bucket = urn(&ResourceKind::Bucket, "demo");
        graph.add_node(bucket.clone(), ResourceKind::Bucket).unwrap();
        assert!(matches!(
            graph.add_node(bucket, ResourceKind::Bucket),
            Err(Error::DuplicateResource(_))
        ));
    }

    #[test]
    fn test_self_and_unknown_dependency_rejected() {
        let (mut graph, bucket, ..) = sample_graph();
        assert!(matches!(
            graph.add_dependency(&bucket, &bucket, DependencyKind::Explicit),
            Err(Error::SelfDependency(_))
        ));
        let ghost = urn(&ResourceKind::Bucket, "ghost");
        assert!(matches!(
            graph.add_dependency(&ghost, &bucket, DependencyKind::Explicit),
            Err(Error::ResourceNotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_edge_is_ignored() {
        let (mut graph, bucket, object, ..) = sample_graph();
        let before = graph.edge_count();
        graph.add_dependency(&object, &bucket, DependencyKind::Parent).unwrap();
        assert_eq!(graph.edge_count(), before);
        graph.add_dependency(&object, &bucket, DependencyKind::Input).unwrap();
        assert_eq!(graph.edge_count(), before + 1);
    }

    #[test]
    fn test_execution_waves() {
        let (graph, bucket, object, block, policy) = sample_graph();
        let waves = graph.execution_waves().unwrap();
        assert_eq!(waves.len(), 3);
        assert_eq!(waves[0], vec![bucket]);
        assert_eq!(waves[1], vec![object, block]);
        assert_eq!(waves[2], vec![policy]);
    }

    #[test]
    fn test_execution_order_respects_dependencies() {
        let (graph, bucket, _, block, policy) = sample_graph();
        let order = graph.execution_order().unwrap();
        let pos = |u: &ResourceUrn| order.iter().position(|o| o == u).unwrap();
        assert!(pos(&bucket) < pos(&block));
        assert!(pos(&block) < pos(&policy));
    }

    #[test]
    fn test_dependency_queries() {
        let (graph, bucket, object, block, policy) = sample_graph();

        assert!(graph.depends_on(&policy, &block));
        assert!(graph.depends_on(&policy, &bucket));
        assert!(!graph.depends_on(&block, &policy));

        assert_eq!(
            graph.dependency_kinds(&policy, &block),
            BTreeSet::from([DependencyKind::Explicit])
        );
        assert!(graph.dependency_kinds(&block, &policy).is_empty());

        assert_eq!(graph.direct_dependencies(&policy), vec![bucket.clone(), block.clone()]);
        assert_eq!(graph.dependents_of(&bucket), vec![object.clone(), block, policy]);
        assert_eq!(graph.children_of(&bucket).len(), 3);
        assert!(graph.children_of(&object).is_empty());
    }

    #[test]
    fn test_cycle_detection() {
        let (mut graph, bucket, .., policy) = sample_graph();
        assert!(!graph.has_cycles());

        graph.add_dependency(&bucket, &policy, DependencyKind::Explicit).unwrap();
        assert!(graph.has_cycles());
        assert!(!graph.get_cycles().is_empty());
        assert!(matches!(
            graph.execution_order(),
            Err(Error::CircularDependency(_))
        ));
    }

    #[test]
    fn test_to_dot_and_mermaid() {
        let (graph, ..) = sample_graph();
        let dot = graph.to_dot();
        assert!(dot.contains("digraph"));
        assert!(dot.contains("demo-bucket-policy"));
        assert!(dot.contains("explicit"));

        let mermaid = graph.to_mermaid();
        assert!(mermaid.starts_with("flowchart LR"));
        assert!(mermaid.contains("==>|explicit|"));
    }
}
