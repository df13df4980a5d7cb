//! Leaf-to-root category paths and their tabular export.
//!
//! Every leaf has exactly one path up to its root, found by following parent
//! links. Paths are ordered most specific first: `path[0]` is the leaf and
//! the last element is the root. An isolated category yields a one-element
//! path.
//!
//! [`PathTable`] lays paths out as fixed-width rows named `Category0`,
//! `Category1`, ... . Shorter paths are padded with empty cells:
//!
//! - [`PathPadding::Right`] (default): cells after the root are empty, so
//!   column 0 always holds the leaf.
//! - [`PathPadding::Left`]: cells before the leaf are empty, so the last
//!   column always holds the root.

use std::io;

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

use super::HierarchyError;
use super::graph::CategoryGraph;

/// Enumerate the path of every leaf, in first-appearance order of leaves.
///
/// The iterator is lazy and borrows the graph; call again to restart.
#[must_use]
pub fn all_root_to_leaf_paths(graph: &CategoryGraph) -> PathIter<'_> {
    PathIter { graph, next: 0 }
}

/// Lazy iterator over leaf-to-root paths. See [`all_root_to_leaf_paths`].
#[derive(Debug, Clone)]
pub struct PathIter<'g> {
    graph: &'g CategoryGraph,
    next: usize,
}

impl<'g> Iterator for PathIter<'g> {
    type Item = Vec<&'g str>;

    fn next(&mut self) -> Option<Self::Item> {
        let count = self.graph.node_count();
        while self.next < count {
            let idx = NodeIndex::new(self.next);
            self.next += 1;
            if self.graph.is_leaf(idx) {
                return Some(walk_up(self.graph, idx));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.graph.node_count().saturating_sub(self.next)))
    }
}

fn walk_up(graph: &CategoryGraph, leaf: NodeIndex) -> Vec<&str> {
    // Bounded by node count; a validated graph always ends at a root first.
    let mut path = Vec::new();
    let mut cursor = Some(leaf);
    while let Some(idx) = cursor {
        if path.len() == graph.node_count() {
            break;
        }
        path.push(graph.label(idx));
        cursor = graph.parent_index(idx);
    }
    path
}

/// Which side of a short path receives the empty padding cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathPadding {
    #[default]
    Right,
    Left,
}

/// Fixed-width rendering of every leaf-to-root path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl PathTable {
    /// Lay out the paths of `graph`.
    ///
    /// `width` fixes the column count; `None` sizes the table to the deepest
    /// path.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::PathTooDeep`] if a path is longer than a
    /// fixed `width`.
    pub fn from_graph(
        graph: &CategoryGraph,
        width: Option<usize>,
        padding: PathPadding,
        column_prefix: &str,
    ) -> Result<Self, HierarchyError> {
        let paths: Vec<Vec<&str>> = all_root_to_leaf_paths(graph).collect();
        let deepest = paths.iter().map(Vec::len).max().unwrap_or(0);
        let width = width.unwrap_or(deepest);

        let rows = paths
            .into_iter()
            .map(|path| {
                if path.len() > width {
                    return Err(HierarchyError::PathTooDeep {
                        leaf: path.first().copied().unwrap_or_default().to_string(),
                        depth: path.len(),
                        columns: width,
                    });
                }
                let blanks = std::iter::repeat_n(String::new(), width - path.len());
                let cells = path.into_iter().map(str::to_string);
                Ok(match padding {
                    PathPadding::Right => cells.chain(blanks).collect(),
                    PathPadding::Left => blanks.chain(cells).collect(),
                })
            })
            .collect::<Result<Vec<Vec<String>>, _>>()?;

        let columns = (0..width).map(|i| format!("{column_prefix}{i}")).collect();

        Ok(Self { columns, rows })
    }

    /// Write the table as CSV with a header row.
    ///
    /// # Errors
    ///
    /// Returns a CSV or I/O error from the underlying writer.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut out = csv::Writer::from_writer(writer);
        out.write_record(&self.columns)?;
        for row in &self.rows {
            out.write_record(row)?;
        }
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shop() -> CategoryGraph {
        CategoryGraph::builder()
            .edges([
                ("Shirts", "Clothing"),
                ("Clothing", "All"),
                ("Novels", "Books"),
                ("Books", "All"),
                ("Maps", "All"),
            ])
            .node("Misc")
            .build()
            .expect("valid forest")
    }

    #[test]
    fn one_path_per_leaf_leaf_first() {
        let graph = shop();
        let paths: Vec<Vec<&str>> = all_root_to_leaf_paths(&graph).collect();
        assert_eq!(
            paths,
            vec![
                vec!["Shirts", "Clothing", "All"],
                vec!["Novels", "Books", "All"],
                vec!["Maps", "All"],
                vec!["Misc"],
            ]
        );
    }

    #[test]
    fn iteration_is_restartable() {
        let graph = shop();
        let first: Vec<_> = all_root_to_leaf_paths(&graph).collect();
        let second: Vec<_> = all_root_to_leaf_paths(&graph).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn table_right_pads_to_deepest_path() {
        let graph = shop();
        let table = PathTable::from_graph(&graph, None, PathPadding::Right, "Category").expect("table");
        assert_eq!(table.columns, vec!["Category0", "Category1", "Category2"]);
        assert_eq!(table.rows[2], vec!["Maps", "All", ""]);
        assert_eq!(table.rows[3], vec!["Misc", "", ""]);
    }

    #[test]
    fn table_left_padding_aligns_roots() {
        let graph = shop();
        let table = PathTable::from_graph(&graph, None, PathPadding::Left, "Category").expect("table");
        assert_eq!(table.rows[2], vec!["", "Maps", "All"]);
    }

    #[test]
    fn fixed_width_matches_four_column_layout() {
        let graph = shop();
        let table = PathTable::from_graph(&graph, Some(4), PathPadding::Right, "Category").expect("table");
        assert_eq!(table.columns.len(), 4);
        assert_eq!(table.rows[0], vec!["Shirts", "Clothing", "All", ""]);
    }

    #[test]
    fn fixed_width_rejects_deeper_paths() {
        let graph = shop();
        let err = PathTable::from_graph(&graph, Some(2), PathPadding::Right, "Category")
            .expect_err("too deep");
        assert_eq!(
            err,
            HierarchyError::PathTooDeep {
                leaf: "Shirts".into(),
                depth: 3,
                columns: 2,
            }
        );
    }

    #[test]
    fn csv_output_has_header_and_blank_cells() {
        let graph = CategoryGraph::build([("Shirts", "Clothing")]).expect("forest");
        let table = PathTable::from_graph(&graph, Some(3), PathPadding::Right, "Category").expect("table");
        let mut buf = Vec::new();
        table.write_csv(&mut buf).expect("write");
        let text = String::from_utf8(buf).expect("utf8");
        assert_eq!(text, "Category0,Category1,Category2\nShirts,Clothing,\n");
    }

    #[test]
    fn empty_graph_has_no_paths() {
        let graph = CategoryGraph::build(Vec::<(&str, &str)>::new()).expect("empty");
        assert_eq!(all_root_to_leaf_paths(&graph).count(), 0);
        let table = PathTable::from_graph(&graph, None, PathPadding::Right, "Category").expect("table");
        assert!(table.columns.is_empty());
        assert!(table.rows.is_empty());
    }
}
