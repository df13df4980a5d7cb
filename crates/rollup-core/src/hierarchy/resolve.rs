//! Top-ancestor resolution.
//!
//! The top ancestor of a category is the root reached by following parent
//! links until none remain. A root is its own top ancestor.
//!
//! # Algorithm
//!
//! Resolution is an iterative walk over the unique parent pointer, so it
//! runs in O(depth) and never recurses. Every walk is bounded by the node
//! count: a walk that takes more steps than there are categories must be
//! going round a cycle and fails with [`HierarchyError::Cycle`].
//!
//! [`AncestorResolver`] memoizes results. Once a category is resolved, every
//! category on its walk is recorded, so a later walk stops as soon as it
//! touches a resolved category. Resolving a whole batch therefore follows
//! each parent link at most once: O(nodes + edges) in total.

use std::collections::{BTreeMap, HashMap, HashSet};

use petgraph::graph::NodeIndex;
use tracing::{debug, instrument};

use super::HierarchyError;
use super::graph::CategoryGraph;

/// Resolve the top ancestor of one category without memoization.
///
/// # Errors
///
/// Returns [`HierarchyError::UnknownCategory`] if `category` is not in the
/// graph, or [`HierarchyError::Cycle`] if the walk exceeds the node count.
pub fn top_ancestor<'g>(graph: &'g CategoryGraph, category: &str) -> Result<&'g str, HierarchyError> {
    let start = graph.require(category)?;
    let bound = graph.node_count();

    let mut cursor = start;
    let mut steps = 0usize;
    while let Some(parent) = graph.parent_index(cursor) {
        steps += 1;
        if steps > bound {
            return Err(HierarchyError::Cycle {
                path: cycle_path(graph, start),
            });
        }
        cursor = parent;
    }

    Ok(graph.label(cursor))
}

/// Resolve many categories at once, sharing walks between them.
///
/// # Errors
///
/// Fails on the first unknown category or cycle; no partial mapping is
/// returned.
pub fn top_ancestor_batch<'g, I, S>(
    graph: &'g CategoryGraph,
    categories: I,
) -> Result<BTreeMap<&'g str, &'g str>, HierarchyError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    AncestorResolver::new(graph).resolve_batch(categories)
}

/// Memoizing top-ancestor resolver over a borrowed [`CategoryGraph`].
#[derive(Debug)]
pub struct AncestorResolver<'g> {
    graph: &'g CategoryGraph,
    memo: HashMap<NodeIndex, NodeIndex>,
    traversals: usize,
}

impl<'g> AncestorResolver<'g> {
    #[must_use]
    pub fn new(graph: &'g CategoryGraph) -> Self {
        Self {
            graph,
            memo: HashMap::new(),
            traversals: 0,
        }
    }

    /// Number of parent links followed so far.
    #[must_use]
    pub const fn traversals(&self) -> usize {
        self.traversals
    }

    /// Number of categories whose top ancestor is cached.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.memo.len()
    }

    /// Resolve one category, reusing and extending the cache.
    ///
    /// # Errors
    ///
    /// See [`top_ancestor`].
    pub fn resolve(&mut self, category: &str) -> Result<&'g str, HierarchyError> {
        let start = self.graph.require(category)?;
        let top = self.resolve_index(start)?;
        Ok(self.graph.label(top))
    }

    /// Resolve every category in `categories`.
    ///
    /// # Errors
    ///
    /// See [`top_ancestor_batch`].
    #[instrument(skip_all)]
    pub fn resolve_batch<I, S>(&mut self, categories: I) -> Result<BTreeMap<&'g str, &'g str>, HierarchyError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut resolved = BTreeMap::new();
        for category in categories {
            let start = self.graph.require(category.as_ref())?;
            let top = self.resolve_index(start)?;
            resolved.insert(self.graph.label(start), self.graph.label(top));
        }

        debug!(
            resolved = resolved.len(),
            traversals = self.traversals,
            "batch resolution complete"
        );
        Ok(resolved)
    }

    /// Resolve every category in the graph.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::Cycle`] for a graph that was not validated.
    pub fn resolve_all(&mut self) -> Result<BTreeMap<&'g str, &'g str>, HierarchyError> {
        let graph = self.graph;
        self.resolve_batch(graph.categories())
    }

    fn resolve_index(&mut self, start: NodeIndex) -> Result<NodeIndex, HierarchyError> {
        let bound = self.graph.node_count();
        let mut trail: Vec<NodeIndex> = Vec::new();
        let mut cursor = start;

        let top = loop {
            if let Some(&top) = self.memo.get(&cursor) {
                break top;
            }
            let Some(parent) = self.graph.parent_index(cursor) else {
                break cursor;
            };
            trail.push(cursor);
            if trail.len() > bound {
                return Err(HierarchyError::Cycle {
                    path: cycle_path(self.graph, start),
                });
            }
            self.traversals += 1;
            cursor = parent;
        };

        self.memo.insert(cursor, top);
        for idx in trail {
            self.memo.insert(idx, top);
        }
        Ok(top)
    }
}

/// Describe the cycle reached from `start` as `A -> B -> ... -> A`.
fn cycle_path(graph: &CategoryGraph, start: NodeIndex) -> Vec<String> {
    let mut seen: HashSet<NodeIndex> = HashSet::new();
    let mut trail: Vec<NodeIndex> = Vec::new();
    let mut cursor = Some(start);

    while let Some(idx) = cursor {
        if !seen.insert(idx) {
            let from = trail.iter().position(|&n| n == idx).unwrap_or_default();
            let mut path: Vec<String> = trail[from..]
                .iter()
                .map(|&n| graph.label(n).to_string())
                .collect();
            path.push(graph.label(idx).to_string());
            return path;
        }
        trail.push(idx);
        cursor = graph.parent_index(idx);
    }

    trail.iter().map(|&n| graph.label(n).to_string()).collect()
}
