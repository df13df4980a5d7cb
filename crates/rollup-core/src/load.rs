//! CSV readers for the three input tables.
//!
//! Columns are located by header name (see
//! [`ColumnConfig`](crate::config::ColumnConfig)); other columns are
//! ignored. Cells are trimmed. Row numbers in errors are file line numbers,
//! header included.

use std::collections::HashSet;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{debug, instrument};

use crate::config::ColumnConfig;
use crate::error::ErrorCode;
use crate::hierarchy::{CategoryGraphBuilder, HierarchyDiagnostics, MultiParentPolicy, diagnose};
use crate::model::{CategoryEdge, Product, Transaction};

/// Errors from reading an input table.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{table} table has no '{column}' column")]
    MissingColumn { table: &'static str, column: String },

    #[error("{table} table line {line}: '{column}' is empty")]
    EmptyCell {
        table: &'static str,
        line: u64,
        column: String,
    },

    #[error("{table} table line {line}: '{column}' value '{value}' is not a finite number")]
    InvalidNumber {
        table: &'static str,
        line: u64,
        column: String,
        value: String,
    },

    #[error("{table} table line {line}: duplicate product id '{id}'")]
    DuplicateProduct {
        table: &'static str,
        line: u64,
        id: String,
    },

    #[error("{table} table: {source}")]
    Csv {
        table: &'static str,
        #[source]
        source: csv::Error,
    },
}

impl LoadError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Open { .. } => ErrorCode::InputNotFound,
            _ => ErrorCode::MalformedInput,
        }
    }
}

/// One row of the categories table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRow {
    pub category: String,
    /// `None` when the parent cell is empty: the category is a root.
    pub parent: Option<String>,
}

/// The categories table in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryTable {
    pub rows: Vec<CategoryRow>,
}

impl CategoryTable {
    /// Rows that carry a parent, as edges.
    #[must_use]
    pub fn edges(&self) -> Vec<CategoryEdge> {
        self.rows
            .iter()
            .filter_map(|row| {
                row.parent
                    .as_ref()
                    .map(|parent| CategoryEdge::new(row.category.as_str(), parent.as_str()))
            })
            .collect()
    }

    /// Every cycle and conflict in the table, with cycles judged the way
    /// the build treats conflicting parents under `policy`.
    #[must_use]
    pub fn diagnose(&self, policy: MultiParentPolicy) -> HierarchyDiagnostics {
        let edges = self.edges();
        let roots = self
            .rows
            .iter()
            .filter(|row| row.parent.is_none())
            .map(|row| row.category.as_str());
        diagnose(roots, &edges, policy)
    }

    /// A graph builder holding every row, in file order.
    #[must_use]
    pub fn builder(&self, policy: MultiParentPolicy) -> CategoryGraphBuilder {
        let mut builder = CategoryGraphBuilder::new().policy(policy);
        for row in &self.rows {
            match &row.parent {
                Some(parent) => builder.add_edge((row.category.as_str(), parent.as_str())),
                None => builder.add_node(row.category.as_str()),
            }
        }
        builder
    }
}

const CATEGORIES: &str = "categories";
const PRODUCTS: &str = "products";
const TRANSACTIONS: &str = "transactions";

/// Load the categories table from `path`.
///
/// # Errors
///
/// See [`read_categories`]; also [`LoadError::Open`].
#[instrument(skip(columns))]
pub fn load_categories(path: &Path, columns: &ColumnConfig) -> Result<CategoryTable, LoadError> {
    read_categories(open(path)?, columns)
}

/// Load the products table from `path`.
///
/// # Errors
///
/// See [`read_products`]; also [`LoadError::Open`].
#[instrument(skip(columns))]
pub fn load_products(path: &Path, columns: &ColumnConfig) -> Result<Vec<Product>, LoadError> {
    read_products(open(path)?, columns)
}

/// Load the transactions table from `path`.
///
/// # Errors
///
/// See [`read_transactions`]; also [`LoadError::Open`].
#[instrument(skip(columns))]
pub fn load_transactions(path: &Path, columns: &ColumnConfig) -> Result<Vec<Transaction>, LoadError> {
    read_transactions(open(path)?, columns)
}

/// Read a categories table with `category` and `parent` columns.
///
/// # Errors
///
/// Returns [`LoadError`] for a missing column, an empty category cell, or a
/// CSV syntax error.
pub fn read_categories<R: io::Read>(reader: R, columns: &ColumnConfig) -> Result<CategoryTable, LoadError> {
    let mut table = Table::open(reader, CATEGORIES)?;
    let category_col = table.column(&columns.category)?;
    let parent_col = table.column(&columns.parent)?;

    let mut rows = Vec::new();
    while let Some(record) = table.next_record()? {
        let category = table.required(&record, category_col, &columns.category)?;
        let parent = cell(&record, parent_col);
        rows.push(CategoryRow { category, parent });
    }

    debug!(rows = rows.len(), "categories loaded");
    Ok(CategoryTable { rows })
}

/// Read a products table with `product_id`, `category` and `price` columns.
///
/// An empty category cell is kept as an empty key; it will not match any
/// category and falls under the missing-category policy of the report.
///
/// # Errors
///
/// Returns [`LoadError`] for a missing column, an empty id, a bad price, a
/// duplicate product id, or a CSV syntax error.
pub fn read_products<R: io::Read>(reader: R, columns: &ColumnConfig) -> Result<Vec<Product>, LoadError> {
    let mut table = Table::open(reader, PRODUCTS)?;
    let id_col = table.column(&columns.product_id)?;
    let category_col = table.column(&columns.category)?;
    let price_col = table.column(&columns.price)?;

    let mut seen: HashSet<String> = HashSet::new();
    let mut products = Vec::new();
    while let Some(record) = table.next_record()? {
        let id = table.required(&record, id_col, &columns.product_id)?;
        let category = cell(&record, category_col).unwrap_or_default();
        let price = table.number(&record, price_col, &columns.price)?;

        if !seen.insert(id.clone()) {
            return Err(LoadError::DuplicateProduct {
                table: PRODUCTS,
                line: line_of(&record),
                id,
            });
        }
        products.push(Product { id, category, price });
    }

    debug!(rows = products.len(), "products loaded");
    Ok(products)
}

/// Read a transactions table with `product_id` and `quantity` columns.
///
/// # Errors
///
/// Returns [`LoadError`] for a missing column, an empty id, a bad quantity,
/// or a CSV syntax error.
pub fn read_transactions<R: io::Read>(
    reader: R,
    columns: &ColumnConfig,
) -> Result<Vec<Transaction>, LoadError> {
    let mut table = Table::open(reader, TRANSACTIONS)?;
    let id_col = table.column(&columns.product_id)?;
    let quantity_col = table.column(&columns.quantity)?;

    let mut transactions = Vec::new();
    while let Some(record) = table.next_record()? {
        let product_id = table.required(&record, id_col, &columns.product_id)?;
        let quantity = table.number(&record, quantity_col, &columns.quantity)?;
        transactions.push(Transaction { product_id, quantity });
    }

    debug!(rows = transactions.len(), "transactions loaded");
    Ok(transactions)
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn open(path: &Path) -> Result<File, LoadError> {
    File::open(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })
}

fn cell(record: &StringRecord, idx: usize) -> Option<String> {
    record
        .get(idx)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map_or(0, csv::Position::line)
}

struct Table<R> {
    reader: csv::Reader<R>,
    headers: StringRecord,
    name: &'static str,
}

impl<R: io::Read> Table<R> {
    fn open(reader: R, name: &'static str) -> Result<Self, LoadError> {
        let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
        let headers = reader
            .headers()
            .map_err(|source| LoadError::Csv { table: name, source })?
            .clone();
        Ok(Self {
            reader,
            headers,
            name,
        })
    }

    fn column(&self, column: &str) -> Result<usize, LoadError> {
        self.headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| LoadError::MissingColumn {
                table: self.name,
                column: column.to_string(),
            })
    }

    fn next_record(&mut self) -> Result<Option<StringRecord>, LoadError> {
        let mut record = StringRecord::new();
        let more = self
            .reader
            .read_record(&mut record)
            .map_err(|source| LoadError::Csv {
                table: self.name,
                source,
            })?;
        Ok(more.then_some(record))
    }

    fn required(&self, record: &StringRecord, idx: usize, column: &str) -> Result<String, LoadError> {
        cell(record, idx).ok_or_else(|| LoadError::EmptyCell {
            table: self.name,
            line: line_of(record),
            column: column.to_string(),
        })
    }

    fn number(&self, record: &StringRecord, idx: usize, column: &str) -> Result<f64, LoadError> {
        let raw = self.required(record, idx, column)?;
        match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(LoadError::InvalidNumber {
                table: self.name,
                line: line_of(record),
                column: column.to_string(),
                value: raw,
            }),
        }
    }
}
