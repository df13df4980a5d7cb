//! Category forest construction.
//!
//! # Overview
//!
//! [`CategoryGraph`] stores the hierarchy as a [`petgraph`] directed graph
//! with one edge per category pointing at its parent. The graph is validated
//! once at build time (single parent per child, no cycles) and is read-only
//! afterwards, so every consumer borrows it.
//!
//! ## Conflicting parents
//!
//! Supplying the same `(child, parent)` pair twice is harmless and collapses
//! to one edge. Supplying a second, *different* parent for a child is a
//! conflict, handled by [`MultiParentPolicy`]:
//!
//! - [`MultiParentPolicy::Reject`] (default) fails with
//!   [`HierarchyError::MultiParent`].
//! - [`MultiParentPolicy::KeepLast`] keeps the parent from the last row.
//!
//! ## Node order
//!
//! Nodes are numbered in order of first appearance in the input (child
//! before parent within a row). Iteration helpers that return sequences use
//! this order, so output is deterministic for a given input file.
//!
//! ## Cache Invalidation
//!
//! [`CategoryGraph::content_hash`] is a BLAKE3 hash of the sorted edge set,
//! usable to tell whether two runs saw the same hierarchy.

#![allow(clippy::module_name_repetitions)]

use std::collections::{BTreeSet, HashMap};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::HierarchyError;
use crate::model::CategoryEdge;

// ---------------------------------------------------------------------------
// MultiParentPolicy
// ---------------------------------------------------------------------------

/// What to do when a child is given two different parents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiParentPolicy {
    /// Fail the build with [`HierarchyError::MultiParent`].
    #[default]
    Reject,
    /// Keep the parent supplied last.
    KeepLast,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Entry {
    Node(String),
    Edge(CategoryEdge),
}

/// Collects categories and edges, then validates them into a [`CategoryGraph`].
///
/// Explicit nodes cover categories that appear in the input without any
/// parent (isolated roots); every edge endpoint becomes a node implicitly.
#[derive(Debug, Clone, Default)]
pub struct CategoryGraphBuilder {
    entries: Vec<Entry>,
    policy: MultiParentPolicy,
}

impl CategoryGraphBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the conflicting-parent policy.
    #[must_use]
    pub const fn policy(mut self, policy: MultiParentPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Add a category without a parent edge.
    #[must_use]
    pub fn node(mut self, category: impl Into<String>) -> Self {
        self.add_node(category);
        self
    }

    /// Add a `(child, parent)` edge.
    #[must_use]
    pub fn edge(mut self, edge: impl Into<CategoryEdge>) -> Self {
        self.add_edge(edge);
        self
    }

    /// Add every edge from `edges`.
    #[must_use]
    pub fn edges<I>(mut self, edges: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<CategoryEdge>,
    {
        for edge in edges {
            self.add_edge(edge);
        }
        self
    }

    pub fn add_node(&mut self, category: impl Into<String>) {
        self.entries.push(Entry::Node(category.into()));
    }

    pub fn add_edge(&mut self, edge: impl Into<CategoryEdge>) {
        self.entries.push(Entry::Edge(edge.into()));
    }

    /// Validate the collected input and freeze it into a [`CategoryGraph`].
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::MultiParent`] for a conflicting parent under
    /// [`MultiParentPolicy::Reject`], or [`HierarchyError::Cycle`] if
    /// following parent links from some category never reaches a root.
    #[instrument(skip(self), fields(entries = self.entries.len(), policy = ?self.policy))]
    pub fn build(self) -> Result<CategoryGraph, HierarchyError> {
        let graph = CategoryGraph::assemble(self.entries, self.policy)?;

        if let Some(path) = find_cycle(&graph.graph) {
            return Err(HierarchyError::Cycle { path });
        }

        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            hash = %graph.content_hash,
            "category graph built"
        );
        Ok(graph)
    }
}

// ---------------------------------------------------------------------------
// CategoryGraph
// ---------------------------------------------------------------------------

/// A validated category forest.
///
/// Nodes are category keys. An edge `A → B` means "A is a direct
/// sub-category of B". Each node has at most one outgoing edge and following
/// outgoing edges always terminates at a root.
#[derive(Debug, Clone)]
pub struct CategoryGraph {
    graph: DiGraph<String, ()>,
    node_map: HashMap<String, NodeIndex>,
    content_hash: String,
}

impl CategoryGraph {
    /// Build a forest from `(child, parent)` pairs with the default
    /// [`MultiParentPolicy::Reject`] policy.
    ///
    /// # Errors
    ///
    /// See [`CategoryGraphBuilder::build`].
    pub fn build<I>(edges: I) -> Result<Self, HierarchyError>
    where
        I: IntoIterator,
        I::Item: Into<CategoryEdge>,
    {
        CategoryGraphBuilder::new().edges(edges).build()
    }

    #[must_use]
    pub fn builder() -> CategoryGraphBuilder {
        CategoryGraphBuilder::new()
    }

    /// Intern nodes and apply the parent policy, without cycle validation.
    fn assemble(entries: Vec<Entry>, policy: MultiParentPolicy) -> Result<Self, HierarchyError> {
        let mut graph = DiGraph::<String, ()>::new();
        let mut node_map: HashMap<String, NodeIndex> = HashMap::new();
        let mut parent_of: HashMap<NodeIndex, NodeIndex> = HashMap::new();

        let mut intern = |graph: &mut DiGraph<String, ()>, key: String| -> NodeIndex {
            *node_map
                .entry(key)
                .or_insert_with_key(|key| graph.add_node(key.clone()))
        };

        for entry in entries {
            match entry {
                Entry::Node(key) => {
                    intern(&mut graph, key);
                }
                Entry::Edge(CategoryEdge { child, parent }) => {
                    let child_idx = intern(&mut graph, child);
                    let parent_idx = intern(&mut graph, parent);

                    match parent_of.get(&child_idx) {
                        None => {
                            parent_of.insert(child_idx, parent_idx);
                        }
                        Some(existing) if *existing == parent_idx => {}
                        Some(existing) => match policy {
                            MultiParentPolicy::Reject => {
                                return Err(HierarchyError::MultiParent {
                                    child: graph[child_idx].clone(),
                                    existing: graph[*existing].clone(),
                                    conflicting: graph[parent_idx].clone(),
                                });
                            }
                            MultiParentPolicy::KeepLast => {
                                debug!(
                                    child = %graph[child_idx],
                                    dropped = %graph[*existing],
                                    kept = %graph[parent_idx],
                                    "replacing conflicting parent"
                                );
                                parent_of.insert(child_idx, parent_idx);
                            }
                        },
                    }
                }
            }
        }

        let mut links: Vec<(NodeIndex, NodeIndex)> = parent_of.into_iter().collect();
        links.sort_unstable();
        for (child_idx, parent_idx) in links {
            graph.add_edge(child_idx, parent_idx, ());
        }

        let content_hash = compute_edge_hash(&graph);

        Ok(Self {
            graph,
            node_map,
            content_hash,
        })
    }

    /// Build without cycle validation, so resolver guards can be exercised.
    #[cfg(test)]
    pub(crate) fn from_edges_unchecked(edges: &[(&str, &str)]) -> Self {
        let entries = edges
            .iter()
            .map(|(child, parent)| Entry::Edge(CategoryEdge::new(*child, *parent)))
            .collect();
        Self::assemble(entries, MultiParentPolicy::KeepLast)
            .expect("keep-last assembly never rejects")
    }

    /// Number of categories.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of child → parent edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// BLAKE3 content hash of the edge set.
    #[must_use]
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    #[must_use]
    pub fn contains(&self, category: &str) -> bool {
        self.node_map.contains_key(category)
    }

    /// Look up the `NodeIndex` for a category key.
    #[must_use]
    pub fn node_index(&self, category: &str) -> Option<NodeIndex> {
        self.node_map.get(category).copied()
    }

    /// Return the category key for a node.
    #[must_use]
    pub fn category(&self, idx: NodeIndex) -> Option<&str> {
        self.graph.node_weight(idx).map(String::as_str)
    }

    /// All category keys in first-appearance order.
    pub fn categories(&self) -> impl Iterator<Item = &str> + '_ {
        self.graph.node_indices().map(|idx| self.graph[idx].as_str())
    }

    /// Categories with no parent.
    #[must_use]
    pub fn roots(&self) -> BTreeSet<&str> {
        self.graph
            .node_indices()
            .filter(|&idx| self.parent_index(idx).is_none())
            .map(|idx| self.graph[idx].as_str())
            .collect()
    }

    /// Categories with no children.
    #[must_use]
    pub fn leaves(&self) -> BTreeSet<&str> {
        self.leaf_indices()
            .map(|idx| self.graph[idx].as_str())
            .collect()
    }

    /// Direct sub-categories of `category`.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::UnknownCategory`] if `category` is not a node.
    pub fn children(&self, category: &str) -> Result<BTreeSet<&str>, HierarchyError> {
        let idx = self.require(category)?;
        Ok(self
            .graph
            .neighbors_directed(idx, Direction::Incoming)
            .map(|child| self.graph[child].as_str())
            .collect())
    }

    /// The direct parent of `category`, or `None` for a root.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::UnknownCategory`] if `category` is not a node.
    pub fn parent(&self, category: &str) -> Result<Option<&str>, HierarchyError> {
        let idx = self.require(category)?;
        Ok(self
            .parent_index(idx)
            .map(|parent| self.graph[parent].as_str()))
    }

    /// All edges, sorted by `(child, parent)`.
    #[must_use]
    pub fn edges(&self) -> Vec<CategoryEdge> {
        let mut edges: Vec<CategoryEdge> = self
            .graph
            .edge_references()
            .map(|edge| {
                CategoryEdge::new(
                    self.graph[edge.source()].as_str(),
                    self.graph[edge.target()].as_str(),
                )
            })
            .collect();
        edges.sort_unstable();
        edges
    }

    pub(crate) fn require(&self, category: &str) -> Result<NodeIndex, HierarchyError> {
        self.node_index(category)
            .ok_or_else(|| HierarchyError::UnknownCategory(category.to_string()))
    }

    pub(crate) fn parent_index(&self, idx: NodeIndex) -> Option<NodeIndex> {
        parent_link(&self.graph, idx)
    }

    pub(crate) fn leaf_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices().filter(|&idx| self.is_leaf(idx))
    }

    pub(crate) fn is_leaf(&self, idx: NodeIndex) -> bool {
        self.graph
            .neighbors_directed(idx, Direction::Incoming)
            .next()
            .is_none()
    }

    pub(crate) fn label(&self, idx: NodeIndex) -> &str {
        self.graph[idx].as_str()
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn parent_link(graph: &DiGraph<String, ()>, idx: NodeIndex) -> Option<NodeIndex> {
    graph.neighbors_directed(idx, Direction::Outgoing).next()
}

/// Find one cycle of parent links, if any.
///
/// Each node is walked at most once: a walk stops at a node already settled
/// by an earlier walk, and reports a cycle when it meets its own trail.
fn find_cycle(graph: &DiGraph<String, ()>) -> Option<Vec<String>> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        Unseen,
        OnTrail,
        Settled,
    }

    let mut marks = vec![Mark::Unseen; graph.node_count()];
    let mut trail: Vec<NodeIndex> = Vec::new();

    for start in graph.node_indices() {
        if marks[start.index()] != Mark::Unseen {
            continue;
        }

        trail.clear();
        let mut cursor = Some(start);
        while let Some(idx) = cursor {
            match marks[idx.index()] {
                Mark::Settled => break,
                Mark::OnTrail => {
                    let from = trail.iter().position(|&n| n == idx).unwrap_or_default();
                    let mut path: Vec<String> =
                        trail[from..].iter().map(|&n| graph[n].clone()).collect();
                    path.push(graph[idx].clone());
                    return Some(path);
                }
                Mark::Unseen => {
                    marks[idx.index()] = Mark::OnTrail;
                    trail.push(idx);
                    cursor = parent_link(graph, idx);
                }
            }
        }

        for &idx in &trail {
            marks[idx.index()] = Mark::Settled;
        }
    }

    None
}

/// Compute a BLAKE3 hash of the sorted edge list.
fn compute_edge_hash(graph: &DiGraph<String, ()>) -> String {
    let mut pairs: Vec<(&str, &str)> = graph
        .edge_references()
        .map(|edge| (graph[edge.source()].as_str(), graph[edge.target()].as_str()))
        .collect();
    pairs.sort_unstable();

    let mut hasher = blake3::Hasher::new();
    for (child, parent) in pairs {
        hasher.update(child.as_bytes());
        hasher.update(b"\x00");
        hasher.update(parent.as_bytes());
        hasher.update(b"\x00");
    }
    format!("blake3:{}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
