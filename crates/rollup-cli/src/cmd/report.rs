//! `rollup report`: roll product and transaction data up to top-level
//! categories and write the report CSV.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Args;
use rollup_core::load::{load_products, load_transactions};
use rollup_core::report::{CategoryStats, ReportOptions, SalesReport, aggregate};
use rollup_core::timing;
use serde::Serialize;
use tracing::info;

use super::{Context, create_output};
use crate::output::{OutputMode, pretty_kv, pretty_rule, pretty_section, render_mode};

/// Arguments for `rollup report`.
#[derive(Args, Debug, Default)]
pub struct ReportArgs {
    /// Categories table (overrides `input.categories`).
    #[arg(long, value_name = "FILE")]
    pub categories: Option<PathBuf>,

    /// Products table (overrides `input.products`).
    #[arg(long, value_name = "FILE")]
    pub products: Option<PathBuf>,

    /// Transactions table (overrides `input.transactions`).
    #[arg(long, value_name = "FILE")]
    pub transactions: Option<PathBuf>,

    /// Report destination (overrides `report.output`).
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ReportOutput {
    output: PathBuf,
    rows: Vec<CategoryStats>,
    summary: CategoryStats,
    skipped_products: Vec<String>,
    skipped_transactions: usize,
    hierarchy_hash: String,
}

impl ReportOutput {
    fn new(output: PathBuf, report: SalesReport) -> Self {
        Self {
            output,
            rows: report.rows,
            summary: report.summary,
            skipped_products: report.skipped_products,
            skipped_transactions: report.skipped_transactions,
            hierarchy_hash: report.hierarchy_hash,
        }
    }
}

/// Execute `rollup report`.
pub fn run_report(args: &ReportArgs, output: OutputMode, ctx: &Context) -> anyhow::Result<()> {
    let input = &ctx.config.input;
    let columns = &ctx.config.columns;

    let graph = ctx.load_graph(args.categories.as_deref())?;

    let products_path = ctx.path(args.products.as_deref().unwrap_or(&input.products));
    let products = timing::timed("load.products", || load_products(&products_path, columns))
        .with_context(|| format!("loading products from {}", products_path.display()))?;

    let transactions_path = ctx.path(args.transactions.as_deref().unwrap_or(&input.transactions));
    let transactions = timing::timed("load.transactions", || {
        load_transactions(&transactions_path, columns)
    })
    .with_context(|| format!("loading transactions from {}", transactions_path.display()))?;

    let options = ReportOptions::from(&ctx.config.report);
    let report = timing::timed("report.aggregate", || {
        aggregate(&graph, &products, &transactions, &options)
    })?;

    let destination = ctx.path(args.output.as_deref().unwrap_or(&ctx.config.report.output));
    timing::timed("report.write", || write_report(&report, &destination))?;
    info!(path = %destination.display(), rows = report.rows.len(), "report written");

    let payload = ReportOutput::new(destination, report);
    render_mode(output, &payload, render_report_text, render_report_pretty)
}

fn write_report(report: &SalesReport, destination: &Path) -> anyhow::Result<()> {
    report
        .write_csv(create_output(destination)?)
        .with_context(|| format!("writing report to {}", destination.display()))
}

fn render_report_text(payload: &ReportOutput, w: &mut dyn Write) -> std::io::Result<()> {
    for row in payload.rows.iter().chain(std::iter::once(&payload.summary)) {
        writeln!(
            w,
            "{}\t{:.2}\t{}\t{:.2}",
            row.category, row.average_price, row.product_count, row.total_value
        )?;
    }
    writeln!(
        w,
        "output={} skipped_products={} skipped_transactions={}",
        payload.output.display(),
        payload.skipped_products.len(),
        payload.skipped_transactions
    )
}

fn render_report_pretty(payload: &ReportOutput, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, "Sales report")?;
    writeln!(
        w,
        "{:<24} {:>14} {:>10} {:>14}",
        "Category", "Average Price", "Products", "Total Value"
    )?;
    for row in &payload.rows {
        write_stats_row(w, row)?;
    }
    pretty_rule(w)?;
    write_stats_row(w, &payload.summary)?;
    writeln!(w)?;

    pretty_kv(w, "Written to", payload.output.display().to_string())?;
    pretty_kv(w, "Hierarchy", &payload.hierarchy_hash)?;
    if !payload.skipped_products.is_empty() {
        pretty_kv(
            w,
            "Skipped products",
            format!(
                "{} ({})",
                payload.skipped_products.len(),
                payload.skipped_products.join(", ")
            ),
        )?;
    }
    if payload.skipped_transactions > 0 {
        pretty_kv(w, "Skipped transactions", payload.skipped_transactions.to_string())?;
    }
    Ok(())
}

fn write_stats_row(w: &mut dyn Write, row: &CategoryStats) -> std::io::Result<()> {
    writeln!(
        w,
        "{:<24} {:>14.2} {:>10} {:>14.2}",
        row.category, row.average_price, row.product_count, row.total_value
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use rollup_core::ErrorCode;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: ReportArgs,
    }

    fn sample() -> ReportOutput {
        ReportOutput {
            output: PathBuf::from("results.csv"),
            rows: vec![CategoryStats {
                category: "Clothing".into(),
                average_price: 30.0,
                product_count: 2,
                total_value: 80.0,
            }],
            summary: CategoryStats {
                category: "All categories".into(),
                average_price: 30.0,
                product_count: 2,
                total_value: 80.0,
            },
            skipped_products: vec!["5".into()],
            skipped_transactions: 2,
            hierarchy_hash: "blake3:abc".into(),
        }
    }

    #[test]
    fn report_args_parse_overrides() {
        let parsed = Wrapper::parse_from([
            "test",
            "--categories",
            "tree.csv",
            "--products",
            "items.csv",
            "-o",
            "out.csv",
        ]);
        assert_eq!(parsed.args.categories, Some(PathBuf::from("tree.csv")));
        assert_eq!(parsed.args.products, Some(PathBuf::from("items.csv")));
        assert!(parsed.args.transactions.is_none());
        assert_eq!(parsed.args.output, Some(PathBuf::from("out.csv")));
    }

    #[test]
    fn report_args_default_to_config() {
        let parsed = Wrapper::parse_from(["test"]);
        assert!(parsed.args.categories.is_none());
        assert!(parsed.args.output.is_none());
    }

    #[test]
    fn text_render_is_tab_separated_with_summary_last() {
        let mut out = Vec::new();
        render_report_text(&sample(), &mut out).expect("render");
        let rendered = String::from_utf8(out).expect("utf8");
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "Clothing\t30.00\t2\t80.00");
        assert_eq!(lines[1], "All categories\t30.00\t2\t80.00");
        assert!(lines[2].contains("skipped_transactions=2"));
    }

    #[test]
    fn pretty_render_lists_skips() {
        let mut out = Vec::new();
        render_report_pretty(&sample(), &mut out).expect("render");
        let rendered = String::from_utf8(out).expect("utf8");
        assert!(rendered.contains("Sales report"));
        assert!(rendered.contains("Skipped products:      1 (5)"));
        assert!(rendered.contains("blake3:abc"));
    }

    #[test]
    fn write_report_to_missing_directory_is_write_failure() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let report = SalesReport {
            rows: Vec::new(),
            summary: sample().summary,
            skipped_products: Vec::new(),
            skipped_transactions: 0,
            hierarchy_hash: String::new(),
        };
        let err = write_report(&report, &dir.path().join("nope/results.csv")).expect_err("fails");
        assert_eq!(crate::output::classify(&err), ErrorCode::ReportWriteFailed);
    }
}
