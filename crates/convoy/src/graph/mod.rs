//! In-memory dependency graph store.
//!
//! Loads a persisted edge list into a petgraph `DiGraph` with a node map,
//! exposing the two read paths the analyzer needs: "who does X depend on"
//! (outgoing edges) and "who depends on X" (incoming edges). The graph is
//! built once at load time and read-only afterwards, so analyzer reads need
//! no locking.

use crate::domain::{DependencyEdge, RepoName};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

/// Directed dependency graph over repositories.
///
/// Edge direction reads "source depends on target": an edge A -> B means A
/// is a dependent of B. Every node named by any edge is present, including
/// repositories that only ever appear as a target.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<RepoName, DependencyEdge>,
    node_map: HashMap<RepoName, NodeIndex>,
}

impl DependencyGraph {
    /// Build a graph from a loaded edge set.
    #[must_use]
    pub fn from_edges(edges: Vec<DependencyEdge>) -> Self {
        let mut graph = DiGraph::new();
        let mut node_map: HashMap<RepoName, NodeIndex> = HashMap::new();

        for edge in edges {
            let source = Self::intern(&mut graph, &mut node_map, &edge.source);
            let target = Self::intern(&mut graph, &mut node_map, &edge.target);
            graph.add_edge(source, target, edge);
        }

        Self { graph, node_map }
    }

    fn intern(
        graph: &mut DiGraph<RepoName, DependencyEdge>,
        node_map: &mut HashMap<RepoName, NodeIndex>,
        repo: &RepoName,
    ) -> NodeIndex {
        if let Some(&node) = node_map.get(repo) {
            return node;
        }
        let node = graph.add_node(repo.clone());
        node_map.insert(repo.clone(), node);
        node
    }

    /// Whether the repository appears anywhere in the graph.
    #[must_use]
    pub fn contains(&self, repo: &RepoName) -> bool {
        self.node_map.contains_key(repo)
    }

    /// Outgoing edges: what `repo` depends on.
    #[must_use]
    pub fn dependencies_of(&self, repo: &RepoName) -> Vec<&DependencyEdge> {
        self.edges_directed(repo, Direction::Outgoing)
    }

    /// Incoming edges: who depends on `repo`.
    #[must_use]
    pub fn dependents_of(&self, repo: &RepoName) -> Vec<&DependencyEdge> {
        self.edges_directed(repo, Direction::Incoming)
    }

    fn edges_directed(&self, repo: &RepoName, direction: Direction) -> Vec<&DependencyEdge> {
        let Some(&node) = self.node_map.get(repo) else {
            return Vec::new();
        };
        let mut edges: Vec<&DependencyEdge> = self
            .graph
            .edges_directed(node, direction)
            .map(|e| e.weight())
            .collect();
        // petgraph yields edges in reverse insertion order; restore file
        // order so traversal results are deterministic.
        edges.reverse();
        edges
    }

    /// Whether a direct edge `source -> target` exists, any dependency type.
    #[must_use]
    pub fn depends_on(&self, source: &RepoName, target: &RepoName) -> bool {
        self.dependencies_of(source)
            .iter()
            .any(|e| &e.target == target)
    }

    /// Every repository in the graph, sorted by name.
    #[must_use]
    pub fn repositories(&self) -> Vec<RepoName> {
        let mut repos: Vec<RepoName> = self.node_map.keys().cloned().collect();
        repos.sort();
        repos
    }

    /// Number of repositories.
    #[must_use]
    pub fn repo_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of dependency edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Out-degree of a repository, clamped to a minimum of 1.
    ///
    /// The clamp keeps the importance propagation formula free of division
    /// by zero for sink repositories.
    #[must_use]
    pub fn out_degree_clamped(&self, repo: &RepoName) -> usize {
        self.dependencies_of(repo).len().max(1)
    }
}
