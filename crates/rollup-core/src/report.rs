//! Per-category sales aggregation.
//!
//! # Overview
//!
//! Every product is mapped to the top ancestor of its category, then:
//!
//! - **Average Price**: mean price of the products under the ancestor.
//! - **Number of Products**: how many products roll up to it.
//! - **Total Value**: Σ quantity × price over transactions of those products.
//!
//! A final summary row (label configurable, `All categories` by default)
//! carries the mean price over every aggregated product and the sums of the
//! count and value columns. Floats are rounded to 2 decimal places.
//!
//! ## Records that cannot be joined
//!
//! - A product whose category is not in the hierarchy falls under
//!   [`ReportOptions::missing_category`]: skipped and listed in
//!   [`SalesReport::skipped_products`], or a hard failure.
//! - A transaction for an unknown product falls under
//!   [`ReportOptions::unknown_product`].
//! - A transaction for a skipped product is always skipped with it.
//!
//! Skipped transactions are counted in [`SalesReport::skipped_transactions`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::config::{RecordPolicy, ReportConfig};
use crate::error::ErrorCode;
use crate::hierarchy::{AncestorResolver, CategoryGraph, HierarchyError};
use crate::model::{Product, ResolvedProduct, Transaction};

/// Report column headers, in output order.
pub const REPORT_COLUMNS: [&str; 4] = ["Category", "Average Price", "Number of Products", "Total Value"];

/// Errors that abort report generation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReportError {
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),

    #[error("product '{product}' has category '{category}', which is not in the hierarchy")]
    MissingCategory { product: String, category: String },

    #[error("transaction references unknown product '{0}'")]
    UnknownProduct(String),
}

impl ReportError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Hierarchy(inner) => inner.code(),
            Self::MissingCategory { .. } => ErrorCode::MissingProductCategory,
            Self::UnknownProduct(_) => ErrorCode::UnknownProduct,
        }
    }
}

/// Aggregation knobs, usually taken from [`ReportConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOptions {
    pub missing_category: RecordPolicy,
    pub unknown_product: RecordPolicy,
    pub summary_label: String,
    /// Keep ancestors whose products have no transactions (total 0.00).
    pub include_categories_without_transactions: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self::from(&ReportConfig::default())
    }
}

impl From<&ReportConfig> for ReportOptions {
    fn from(config: &ReportConfig) -> Self {
        Self {
            missing_category: config.missing_category,
            unknown_product: config.unknown_product,
            summary_label: config.summary_label.clone(),
            include_categories_without_transactions: config.include_categories_without_transactions,
        }
    }
}

/// One output row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStats {
    pub category: String,
    pub average_price: f64,
    pub product_count: usize,
    pub total_value: f64,
}

/// The aggregated report plus bookkeeping about what was left out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesReport {
    pub rows: Vec<CategoryStats>,
    pub summary: CategoryStats,
    /// Ids of products skipped for a missing category.
    pub skipped_products: Vec<String>,
    pub skipped_transactions: usize,
    /// Content hash of the hierarchy the report was computed from.
    pub hierarchy_hash: String,
}

/// Outcome of resolving every product against the hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductResolution {
    pub resolved: Vec<ResolvedProduct>,
    pub skipped: Vec<String>,
    /// Parent links followed while resolving.
    pub traversals: usize,
}

/// Attach the top ancestor to every product.
///
/// # Errors
///
/// Returns [`ReportError::MissingCategory`] under [`RecordPolicy::Fail`], or
/// [`ReportError::Hierarchy`] if resolution fails.
#[instrument(skip_all, fields(products = products.len()))]
pub fn resolve_products(
    graph: &CategoryGraph,
    products: &[Product],
    missing_category: RecordPolicy,
) -> Result<ProductResolution, ReportError> {
    let mut resolver = AncestorResolver::new(graph);
    let mut resolved = Vec::with_capacity(products.len());
    let mut skipped = Vec::new();

    for product in products {
        if !graph.contains(&product.category) {
            match missing_category {
                RecordPolicy::Fail => {
                    return Err(ReportError::MissingCategory {
                        product: product.id.clone(),
                        category: product.category.clone(),
                    });
                }
                RecordPolicy::Skip => {
                    warn!(
                        product = %product.id,
                        category = %product.category,
                        "skipping product with category missing from hierarchy"
                    );
                    skipped.push(product.id.clone());
                    continue;
                }
            }
        }

        let top = resolver.resolve(&product.category)?;
        resolved.push(ResolvedProduct {
            product: product.clone(),
            top_ancestor: top.to_string(),
        });
    }

    Ok(ProductResolution {
        resolved,
        skipped,
        traversals: resolver.traversals(),
    })
}

#[derive(Debug, Default)]
struct Accumulator {
    price_sum: f64,
    count: usize,
    value: f64,
    transacted: bool,
}

/// Build the sales report.
///
/// # Errors
///
/// Returns [`ReportError`] when a policy is [`RecordPolicy::Fail`] and a
/// record cannot be joined, or when hierarchy resolution fails.
#[instrument(skip_all, fields(products = products.len(), transactions = transactions.len()))]
pub fn aggregate(
    graph: &CategoryGraph,
    products: &[Product],
    transactions: &[Transaction],
    options: &ReportOptions,
) -> Result<SalesReport, ReportError> {
    let resolution = resolve_products(graph, products, options.missing_category)?;

    let mut by_ancestor: BTreeMap<&str, Accumulator> = BTreeMap::new();
    let mut lookup: HashMap<&str, (&str, f64)> = HashMap::with_capacity(resolution.resolved.len());
    for item in &resolution.resolved {
        let acc = by_ancestor.entry(item.top_ancestor.as_str()).or_default();
        acc.price_sum += item.product.price;
        acc.count += 1;
        lookup.insert(
            item.product.id.as_str(),
            (item.top_ancestor.as_str(), item.product.price),
        );
    }

    let skipped_ids: HashSet<&str> = resolution.skipped.iter().map(String::as_str).collect();
    let mut skipped_transactions = 0usize;

    for tx in transactions {
        if let Some(&(top, price)) = lookup.get(tx.product_id.as_str()) {
            if let Some(acc) = by_ancestor.get_mut(top) {
                acc.value += tx.value(price);
                acc.transacted = true;
            }
            continue;
        }

        if !skipped_ids.contains(tx.product_id.as_str()) && options.unknown_product == RecordPolicy::Fail {
            return Err(ReportError::UnknownProduct(tx.product_id.clone()));
        }
        warn!(product = %tx.product_id, "skipping transaction for unresolved product");
        skipped_transactions += 1;
    }

    let rows: Vec<CategoryStats> = by_ancestor
        .iter()
        .filter(|(_, acc)| acc.transacted || options.include_categories_without_transactions)
        .map(|(category, acc)| CategoryStats {
            category: (*category).to_string(),
            average_price: round2(mean(acc.price_sum, acc.count)),
            product_count: acc.count,
            total_value: round2(acc.value),
        })
        .collect();

    let all_price_sum: f64 = resolution.resolved.iter().map(|item| item.product.price).sum();
    let emitted_value: f64 = by_ancestor
        .values()
        .filter(|acc| acc.transacted || options.include_categories_without_transactions)
        .map(|acc| acc.value)
        .sum();

    let summary = CategoryStats {
        category: options.summary_label.clone(),
        average_price: round2(mean(all_price_sum, resolution.resolved.len())),
        product_count: rows.iter().map(|row| row.product_count).sum(),
        total_value: round2(emitted_value),
    };

    info!(
        rows = rows.len(),
        skipped_products = resolution.skipped.len(),
        skipped_transactions,
        traversals = resolution.traversals,
        "report aggregated"
    );

    Ok(SalesReport {
        rows,
        summary,
        skipped_products: resolution.skipped,
        skipped_transactions,
        hierarchy_hash: graph.content_hash().to_string(),
    })
}

impl SalesReport {
    /// Write the report as CSV: one row per ancestor, then the summary row.
    ///
    /// # Errors
    ///
    /// Returns a CSV or I/O error from the underlying writer.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut out = csv::Writer::from_writer(writer);
        out.write_record(REPORT_COLUMNS)?;
        for row in self.rows.iter().chain(std::iter::once(&self.summary)) {
            out.write_record([
                row.category.clone(),
                format!("{:.2}", row.average_price),
                row.product_count.to_string(),
                format!("{:.2}", row.total_value),
            ])?;
        }
        out.flush()?;
        Ok(())
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(sum: f64, count: usize) -> f64 {
    if count == 0 { 0.0 } else { sum / count as f64 }
}

/// Two decimals, halves to even.
fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}
