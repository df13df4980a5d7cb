//! `rollup resolve`: print the top-level ancestor of categories.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use rollup_core::hierarchy::AncestorResolver;
use rollup_core::timing;
use serde::Serialize;

use super::Context;
use crate::output::{OutputMode, pretty_section, render_mode};

/// Arguments for `rollup resolve`.
#[derive(Args, Debug, Default)]
pub struct ResolveArgs {
    /// Categories to resolve. Every category when omitted.
    #[arg(value_name = "CATEGORY")]
    pub names: Vec<String>,

    /// Categories table (overrides `input.categories`).
    #[arg(long, value_name = "FILE")]
    pub categories: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ResolveOutput {
    mapping: BTreeMap<String, String>,
    traversals: usize,
}

/// Execute `rollup resolve`.
pub fn run_resolve(args: &ResolveArgs, output: OutputMode, ctx: &Context) -> anyhow::Result<()> {
    let graph = ctx.load_graph(args.categories.as_deref())?;
    let mut resolver = AncestorResolver::new(&graph);

    let mapping = timing::timed("resolve.batch", || {
        if args.names.is_empty() {
            resolver.resolve_all()
        } else {
            resolver.resolve_batch(&args.names)
        }
    })?;

    let payload = ResolveOutput {
        mapping: mapping
            .into_iter()
            .map(|(category, top)| (category.to_string(), top.to_string()))
            .collect(),
        traversals: resolver.traversals(),
    };
    render_mode(output, &payload, render_resolve_text, render_resolve_pretty)
}

fn render_resolve_text(payload: &ResolveOutput, w: &mut dyn Write) -> std::io::Result<()> {
    for (category, top) in &payload.mapping {
        writeln!(w, "{category}\t{top}")?;
    }
    Ok(())
}

fn render_resolve_pretty(payload: &ResolveOutput, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, &format!("Top-level categories ({})", payload.mapping.len()))?;
    let width = payload.mapping.keys().map(String::len).max().unwrap_or(0);
    for (category, top) in &payload.mapping {
        writeln!(w, "{category:<width$}  →  {top}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: ResolveArgs,
    }

    fn payload() -> ResolveOutput {
        ResolveOutput {
            mapping: BTreeMap::from([
                ("Novels".to_string(), "Books".to_string()),
                ("Shirts".to_string(), "Clothing".to_string()),
            ]),
            traversals: 2,
        }
    }

    #[test]
    fn resolve_args_take_positional_categories() {
        let parsed = Wrapper::parse_from(["test", "Shirts", "Novels"]);
        assert_eq!(parsed.args.names, vec!["Shirts", "Novels"]);
        assert!(parsed.args.categories.is_none());
    }

    #[test]
    fn resolve_args_accept_no_categories() {
        let parsed = Wrapper::parse_from(["test", "--categories", "tree.csv"]);
        assert!(parsed.args.names.is_empty());
        assert_eq!(parsed.args.categories, Some(PathBuf::from("tree.csv")));
    }

    #[test]
    fn text_render_is_one_pair_per_line() {
        let mut out = Vec::new();
        render_resolve_text(&payload(), &mut out).expect("render");
        assert_eq!(
            String::from_utf8(out).expect("utf8"),
            "Novels\tBooks\nShirts\tClothing\n"
        );
    }

    #[test]
    fn pretty_render_aligns_arrows() {
        let mut out = Vec::new();
        render_resolve_pretty(&payload(), &mut out).expect("render");
        let rendered = String::from_utf8(out).expect("utf8");
        assert!(rendered.starts_with("Top-level categories (2)"));
        assert!(rendered.contains("Novels  →  Books"));
    }

    #[test]
    fn json_payload_is_a_mapping() {
        let json = serde_json::to_value(payload()).expect("serialize");
        assert_eq!(json["mapping"]["Shirts"], "Clothing");
        assert_eq!(json["traversals"], 2);
    }
}
