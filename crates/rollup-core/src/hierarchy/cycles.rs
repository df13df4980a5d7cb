//! Full-input diagnostics for category tables.
//!
//! [`CategoryGraph::build`](super::CategoryGraph::build) stops at the first
//! defect. [`diagnose`] instead loads every raw edge, conflicting parents
//! included, and reports all of them at once:
//!
//! - **Cycles**: strongly connected components (Tarjan) of more than one
//!   node, plus self-loops. Under [`MultiParentPolicy::KeepLast`] only the
//!   last parent listed for each child takes part, as in the build.
//! - **Conflicts**: children listed with more than one distinct parent.

#![allow(clippy::module_name_repetitions)]

use std::collections::{HashMap, HashSet};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;

use super::MultiParentPolicy;
use crate::model::CategoryEdge;

/// A cycle of parent links with one edge whose removal breaks it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Sorted category keys on the cycle.
    pub members: Vec<String>,
    /// `(child, parent)` edge to remove.
    pub suggested_break: (String, String),
}

/// A child given more than one distinct parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParentConflict {
    pub child: String,
    /// Distinct parents in input order.
    pub parents: Vec<String>,
}

/// Everything wrong with a raw category edge list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HierarchyDiagnostics {
    pub node_count: usize,
    pub edge_count: usize,
    pub cycles: Vec<CycleReport>,
    pub conflicts: Vec<ParentConflict>,
}

impl HierarchyDiagnostics {
    /// Returns `true` when the edges form a valid forest.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.cycles.is_empty() && self.conflicts.is_empty()
    }
}

/// Diagnose a raw `(child, parent)` edge list.
///
/// `roots` are categories listed without a parent; they only count towards
/// `node_count`. Conflicts always come from the full edge list. Cycles are
/// searched over the links the build would keep under `policy`.
#[must_use]
pub fn diagnose<'a>(
    roots: impl IntoIterator<Item = &'a str>,
    edges: &'a [CategoryEdge],
    policy: MultiParentPolicy,
) -> HierarchyDiagnostics {
    let mut graph = DiGraph::<String, ()>::new();
    let mut node_map: HashMap<&str, NodeIndex> = HashMap::new();
    let mut parents: Vec<(NodeIndex, Vec<NodeIndex>)> = Vec::new();
    let mut parents_slot: HashMap<NodeIndex, usize> = HashMap::new();
    let mut last_parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();

    for root in roots {
        node_map
            .entry(root)
            .or_insert_with(|| graph.add_node(root.to_string()));
    }

    for edge in edges {
        let child = *node_map
            .entry(edge.child.as_str())
            .or_insert_with(|| graph.add_node(edge.child.clone()));
        let parent = *node_map
            .entry(edge.parent.as_str())
            .or_insert_with(|| graph.add_node(edge.parent.clone()));

        last_parent.insert(child, parent);
        if graph.contains_edge(child, parent) {
            continue;
        }
        graph.add_edge(child, parent, ());

        let slot = *parents_slot.entry(child).or_insert_with(|| {
            parents.push((child, Vec::new()));
            parents.len() - 1
        });
        parents[slot].1.push(parent);
    }

    let conflicts = parents
        .into_iter()
        .filter(|(_, listed)| listed.len() > 1)
        .map(|(child, listed)| ParentConflict {
            child: graph[child].clone(),
            parents: listed.into_iter().map(|idx| graph[idx].clone()).collect(),
        })
        .collect();

    let cycles = match policy {
        MultiParentPolicy::Reject => find_cycles(&graph),
        MultiParentPolicy::KeepLast => {
            let kept = graph.filter_map(
                |_, name| Some(name.clone()),
                |edge, _| {
                    let (child, parent) = graph.edge_endpoints(edge)?;
                    (last_parent.get(&child) == Some(&parent)).then_some(())
                },
            );
            find_cycles(&kept)
        }
    };

    HierarchyDiagnostics {
        node_count: graph.node_count(),
        edge_count: graph.edge_count(),
        cycles,
        conflicts,
    }
}

fn find_cycles(graph: &DiGraph<String, ()>) -> Vec<CycleReport> {
    let mut reports: Vec<CycleReport> = tarjan_scc(graph)
        .into_iter()
        .filter(|component| {
            component.len() > 1
                || component
                    .first()
                    .is_some_and(|&node| graph.contains_edge(node, node))
        })
        .filter_map(|component| {
            let members_set: HashSet<NodeIndex> = component.iter().copied().collect();
            let first = component
                .iter()
                .copied()
                .min_by(|a, b| graph[*a].cmp(&graph[*b]))?;
            let target = graph
                .neighbors(first)
                .filter(|n| members_set.contains(n))
                .min_by(|a, b| graph[*a].cmp(&graph[*b]))?;

            let mut members: Vec<String> = component.iter().map(|&idx| graph[idx].clone()).collect();
            members.sort_unstable();

            Some(CycleReport {
                members,
                suggested_break: (graph[first].clone(), graph[target].clone()),
            })
        })
        .collect();

    reports.sort_unstable_by(|a, b| a.members.cmp(&b.members));
    reports
}
