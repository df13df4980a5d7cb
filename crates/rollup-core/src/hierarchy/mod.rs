//! Category hierarchy: forest construction, ancestor resolution, path export.
//!
//! ## Edge Direction
//!
//! An edge `A → B` in the graph means "A is a direct sub-category of B"
//! (child → parent). Every category has at most one outgoing edge.
//!
//! - A **root** category has no outgoing edge (top of its branch).
//! - A **leaf** category has no incoming edge (bottom of its branch).
//!
//! ## Pipeline
//!
//! ```text
//! (child, parent) rows
//!        ↓  graph::CategoryGraph::build()
//! CategoryGraph (validated forest, immutable)
//!        ├─ resolve::top_ancestor_batch()  → category → top ancestor
//!        └─ paths::all_root_to_leaf_paths() → leaf-to-root paths
//! ```
//!
//! [`cycles`] works on the raw edge list instead, so it can describe every
//! defect in an input that [`CategoryGraph::build`] would reject.

pub mod cycles;
pub mod graph;
pub mod paths;
pub mod resolve;

pub use cycles::{CycleReport, HierarchyDiagnostics, ParentConflict, diagnose};
pub use graph::{CategoryGraph, CategoryGraphBuilder, MultiParentPolicy};
pub use paths::{PathIter, PathPadding, PathTable, all_root_to_leaf_paths};
pub use resolve::{AncestorResolver, top_ancestor, top_ancestor_batch};

use crate::error::ErrorCode;

/// Errors raised while building or querying a [`CategoryGraph`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HierarchyError {
    /// Following parent links never reached a root.
    ///
    /// `path` lists the categories on the cycle, closed by repeating the
    /// first one: `A -> B -> C -> A`.
    #[error("category cycle detected: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },

    /// A child was given two different parents under the reject policy.
    #[error(
        "category '{child}' has conflicting parents '{existing}' and '{conflicting}'"
    )]
    MultiParent {
        child: String,
        existing: String,
        conflicting: String,
    },

    /// The category key is not a node of the graph.
    #[error("category not found: '{0}'")]
    UnknownCategory(String),

    /// A path does not fit a fixed-width path table.
    #[error("path from leaf '{leaf}' has {depth} categories but the table has {columns} columns")]
    PathTooDeep {
        leaf: String,
        depth: usize,
        columns: usize,
    },
}

impl HierarchyError {
    /// Map this error to its stable [`ErrorCode`].
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Cycle { .. } => ErrorCode::CycleDetected,
            Self::MultiParent { .. } => ErrorCode::ConflictingParents,
            Self::UnknownCategory(_) => ErrorCode::UnknownCategory,
            Self::PathTooDeep { .. } => ErrorCode::PathTooDeep,
        }
    }
}
