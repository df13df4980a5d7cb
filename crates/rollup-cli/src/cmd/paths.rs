//! `rollup paths`: export every leaf-to-root category path as a
//! fixed-width table.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Context as _;
use clap::Args;
use rollup_core::hierarchy::PathTable;
use rollup_core::timing;
use serde::Serialize;
use tracing::info;

use super::{Context, create_output};
use crate::output::{OutputMode, pretty_kv, render_mode};

/// Arguments for `rollup paths`.
#[derive(Args, Debug, Default)]
pub struct PathsArgs {
    /// Write the table to FILE instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Fixed column count (overrides `paths.columns`).
    #[arg(long, value_name = "N")]
    pub columns: Option<usize>,

    /// Categories table (overrides `input.categories`).
    #[arg(long, value_name = "FILE")]
    pub categories: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct PathsWritten {
    output: PathBuf,
    columns: usize,
    rows: usize,
}

/// Execute `rollup paths`.
pub fn run_paths(args: &PathsArgs, output: OutputMode, ctx: &Context) -> anyhow::Result<()> {
    let graph = ctx.load_graph(args.categories.as_deref())?;
    let settings = &ctx.config.paths;

    let table = timing::timed("paths.table", || {
        PathTable::from_graph(
            &graph,
            args.columns.or(settings.columns),
            settings.padding,
            &settings.column_prefix,
        )
    })?;

    let Some(destination) = args.output.as_deref().map(|path| ctx.path(path)) else {
        return write_to_stdout(&table, output);
    };

    let file = create_output(&destination)?;
    timing::timed("paths.write", || table.write_csv(file))
        .with_context(|| format!("writing path table to {}", destination.display()))?;
    info!(path = %destination.display(), rows = table.rows.len(), "path table written");

    let payload = PathsWritten {
        output: destination,
        columns: table.columns.len(),
        rows: table.rows.len(),
    };
    render_mode(output, &payload, render_written_text, render_written_pretty)
}

/// CSV on stdout, or the table as JSON in json mode.
fn write_to_stdout(table: &PathTable, output: OutputMode) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if output.is_json() {
        serde_json::to_writer_pretty(&mut out, table)?;
        writeln!(out)?;
        return Ok(());
    }
    table.write_csv(out).context("writing path table to stdout")
}

fn render_written_text(payload: &PathsWritten, w: &mut dyn Write) -> io::Result<()> {
    writeln!(
        w,
        "output={} columns={} rows={}",
        payload.output.display(),
        payload.columns,
        payload.rows
    )
}

fn render_written_pretty(payload: &PathsWritten, w: &mut dyn Write) -> io::Result<()> {
    pretty_kv(w, "Written to", payload.output.display().to_string())?;
    pretty_kv(w, "Columns", payload.columns.to_string())?;
    pretty_kv(w, "Paths", payload.rows.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: PathsArgs,
    }

    #[test]
    fn paths_args_parse_columns_and_output() {
        let parsed = Wrapper::parse_from(["test", "--columns", "4", "-o", "paths.csv"]);
        assert_eq!(parsed.args.columns, Some(4));
        assert_eq!(parsed.args.output, Some(PathBuf::from("paths.csv")));
    }

    #[test]
    fn paths_args_reject_non_numeric_columns() {
        assert!(Wrapper::try_parse_from(["test", "--columns", "four"]).is_err());
    }

    #[test]
    fn written_summary_text_is_single_line() {
        let payload = PathsWritten {
            output: PathBuf::from("paths.csv"),
            columns: 4,
            rows: 3,
        };
        let mut out = Vec::new();
        render_written_text(&payload, &mut out).expect("render");
        assert_eq!(
            String::from_utf8(out).expect("utf8"),
            "output=paths.csv columns=4 rows=3\n"
        );
    }
}
