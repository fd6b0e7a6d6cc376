//! Resolved dependency graph
//!
//! Nodes are fully versioned coordinates keyed by (group, identifier); edges
//! carry the exclusion context that was active when they were discovered.
//! The graph is built once per resolution and never mutated afterwards.

use crate::coordinate::{ArtifactCoordinate, ArtifactKey};
use crate::manifest::ExclusionPattern;
use std::collections::HashMap;

/// One resolved artifact in the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    /// Fully versioned coordinate
    pub coordinate: ArtifactCoordinate,
    /// Distance from the root at which this version was chosen
    pub depth: usize,
}

/// A depends-on edge with its carried exclusion context.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphEdge {
    pub from: ArtifactKey,
    pub to: ArtifactKey,
    pub exclusions: Vec<ExclusionPattern>,
}

/// Conflict-resolved dependency graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DependencyGraph {
    nodes: HashMap<ArtifactKey, GraphNode>,
    /// Keys in the order nodes were finalized, for deterministic iteration
    order: Vec<ArtifactKey>,
    edges: Vec<GraphEdge>,
    root: Option<ArtifactKey>,
}

impl DependencyGraph {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert_node(&mut self, coordinate: ArtifactCoordinate, depth: usize) {
        let key = coordinate.key();
        if self.root.is_none() {
            self.root = Some(key.clone());
        }
        self.order.push(key.clone());
        self.nodes.insert(key, GraphNode { coordinate, depth });
    }

    pub(crate) fn insert_edge(
        &mut self,
        from: ArtifactKey,
        to: ArtifactKey,
        exclusions: Vec<ExclusionPattern>,
    ) {
        self.edges.push(GraphEdge {
            from,
            to,
            exclusions,
        });
    }

    pub fn root(&self) -> Option<&GraphNode> {
        self.root.as_ref().and_then(|key| self.nodes.get(key))
    }

    pub fn get(&self, key: &ArtifactKey) -> Option<&GraphNode> {
        self.nodes.get(key)
    }

    pub fn contains(&self, key: &ArtifactKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// Nodes in the order they were finalized during resolution
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.order.iter().filter_map(|key| self.nodes.get(key))
    }

    /// Fully versioned coordinates, finalization order
    pub fn coordinates(&self) -> Vec<ArtifactCoordinate> {
        self.nodes().map(|node| node.coordinate.clone()).collect()
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    /// Direct dependencies of the node with the given key
    pub fn dependencies_of(&self, key: &ArtifactKey) -> Vec<&GraphNode> {
        self.edges
            .iter()
            .filter(|edge| edge.from == *key)
            .filter_map(|edge| self.nodes.get(&edge.to))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
