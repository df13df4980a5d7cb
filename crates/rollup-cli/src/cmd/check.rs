//! `rollup check`: validate the categories table, listing every cycle and
//! every multi-parent conflict instead of stopping at the first.

use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use rollup_core::ErrorCode;
use rollup_core::hierarchy::{HierarchyDiagnostics, MultiParentPolicy};
use rollup_core::timing;
use serde::Serialize;
use tracing::warn;

use super::Context;
use crate::output::{CommandFailure, OutputMode, pretty_kv, pretty_section, render_mode};

/// Arguments for `rollup check`.
#[derive(Args, Debug, Default)]
pub struct CheckArgs {
    /// Categories table (overrides `input.categories`).
    #[arg(long, value_name = "FILE")]
    pub categories: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct CheckOutput {
    ok: bool,
    /// Conflicts are tolerated under `multi_parent = "keep_last"`.
    conflicts_allowed: bool,
    #[serde(flatten)]
    diagnostics: HierarchyDiagnostics,
}

impl CheckOutput {
    fn new(diagnostics: HierarchyDiagnostics, policy: MultiParentPolicy) -> Self {
        let conflicts_allowed = policy == MultiParentPolicy::KeepLast;
        let ok = diagnostics.cycles.is_empty() && (conflicts_allowed || diagnostics.conflicts.is_empty());
        Self {
            ok,
            conflicts_allowed,
            diagnostics,
        }
    }

    fn failure(&self) -> Option<CommandFailure> {
        if self.ok {
            return None;
        }
        let code = if self.diagnostics.cycles.is_empty() {
            ErrorCode::ConflictingParents
        } else {
            ErrorCode::CycleDetected
        };
        Some(CommandFailure::new(
            code,
            format!(
                "category hierarchy is invalid: {} cycle(s), {} conflicting parent assignment(s)",
                self.diagnostics.cycles.len(),
                self.diagnostics.conflicts.len()
            ),
        ))
    }
}

/// Execute `rollup check`.
pub fn run_check(args: &CheckArgs, output: OutputMode, ctx: &Context) -> anyhow::Result<()> {
    let table = ctx.load_category_table(args.categories.as_deref())?;
    let policy = ctx.config.hierarchy.multi_parent;
    let diagnostics = timing::timed("check.diagnose", || table.diagnose(policy));

    for cycle in &diagnostics.cycles {
        warn!(members = ?cycle.members, "cycle in category hierarchy");
    }
    for conflict in &diagnostics.conflicts {
        warn!(child = %conflict.child, parents = ?conflict.parents, "category has several parents");
    }

    let payload = CheckOutput::new(diagnostics, policy);
    render_mode(output, &payload, render_check_text, render_check_pretty)?;

    match payload.failure() {
        Some(failure) => Err(failure.into()),
        None => Ok(()),
    }
}

fn render_check_text(payload: &CheckOutput, w: &mut dyn Write) -> std::io::Result<()> {
    let diag = &payload.diagnostics;
    for cycle in &diag.cycles {
        writeln!(
            w,
            "cycle\t{}\tbreak={}->{}",
            cycle.members.join(","),
            cycle.suggested_break.0,
            cycle.suggested_break.1
        )?;
    }
    for conflict in &diag.conflicts {
        writeln!(w, "conflict\t{}\t{}", conflict.child, conflict.parents.join(","))?;
    }
    writeln!(
        w,
        "{}\tnodes={} edges={} cycles={} conflicts={}",
        if payload.ok { "ok" } else { "invalid" },
        diag.node_count,
        diag.edge_count,
        diag.cycles.len(),
        diag.conflicts.len()
    )
}

fn render_check_pretty(payload: &CheckOutput, w: &mut dyn Write) -> std::io::Result<()> {
    let diag = &payload.diagnostics;
    pretty_section(w, "Category hierarchy check")?;
    pretty_kv(w, "Categories", diag.node_count.to_string())?;
    pretty_kv(w, "Parent links", diag.edge_count.to_string())?;

    if diag.cycles.is_empty() {
        writeln!(w, "\nNo cycles found.")?;
    } else {
        writeln!(w, "\nCycles ({})", diag.cycles.len())?;
        for (idx, cycle) in diag.cycles.iter().enumerate() {
            writeln!(w, "  {}. {}", idx + 1, cycle.members.join(", "))?;
            writeln!(
                w,
                "     remove {} -> {} to break it",
                cycle.suggested_break.0, cycle.suggested_break.1
            )?;
        }
    }

    if diag.conflicts.is_empty() {
        writeln!(w, "No conflicting parents.")?;
    } else {
        let note = if payload.conflicts_allowed {
            " (last parent wins)"
        } else {
            ""
        };
        writeln!(w, "\nConflicting parents ({}){note}", diag.conflicts.len())?;
        for conflict in &diag.conflicts {
            writeln!(w, "  {}: {}", conflict.child, conflict.parents.join(", "))?;
        }
    }

    writeln!(w)?;
    writeln!(w, "{}", if payload.ok { "✓ hierarchy is valid" } else { "✗ hierarchy is invalid" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollup_core::hierarchy::{CycleReport, ParentConflict};

    fn broken() -> HierarchyDiagnostics {
        HierarchyDiagnostics {
            node_count: 5,
            edge_count: 4,
            cycles: vec![CycleReport {
                members: vec!["A".into(), "B".into()],
                suggested_break: ("B".into(), "A".into()),
            }],
            conflicts: vec![ParentConflict {
                child: "X".into(),
                parents: vec!["Y".into(), "Z".into()],
            }],
        }
    }

    #[test]
    fn check_args_parse_no_flags() {
        use clap::Parser;

        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            args: CheckArgs,
        }

        let parsed = Wrapper::parse_from(["test"]);
        assert!(parsed.args.categories.is_none());
    }

    #[test]
    fn clean_diagnostics_pass() {
        let payload = CheckOutput::new(HierarchyDiagnostics::default(), MultiParentPolicy::Reject);
        assert!(payload.ok);
        assert!(payload.failure().is_none());
    }

    #[test]
    fn cycles_fail_with_cycle_code() {
        let payload = CheckOutput::new(broken(), MultiParentPolicy::KeepLast);
        let failure = payload.failure().expect("invalid");
        assert_eq!(failure.code, ErrorCode::CycleDetected);
        assert!(failure.message.contains("1 cycle(s)"));
    }

    #[test]
    fn conflicts_only_fail_under_reject() {
        let mut diag = broken();
        diag.cycles.clear();

        let rejected = CheckOutput::new(diag.clone(), MultiParentPolicy::Reject);
        assert_eq!(
            rejected.failure().map(|f| f.code),
            Some(ErrorCode::ConflictingParents)
        );

        let kept = CheckOutput::new(diag, MultiParentPolicy::KeepLast);
        assert!(kept.ok);
    }

    #[test]
    fn text_render_lists_each_defect() {
        let payload = CheckOutput::new(broken(), MultiParentPolicy::Reject);
        let mut out = Vec::new();
        render_check_text(&payload, &mut out).expect("render");
        let rendered = String::from_utf8(out).expect("utf8");
        assert!(rendered.contains("cycle\tA,B\tbreak=B->A"));
        assert!(rendered.contains("conflict\tX\tY,Z"));
        assert!(rendered.lines().last().is_some_and(|l| l.starts_with("invalid\t")));
    }

    #[test]
    fn pretty_render_notes_tolerated_conflicts() {
        let mut diag = broken();
        diag.cycles.clear();
        let payload = CheckOutput::new(diag, MultiParentPolicy::KeepLast);
        let mut out = Vec::new();
        render_check_pretty(&payload, &mut out).expect("render");
        let rendered = String::from_utf8(out).expect("utf8");
        assert!(rendered.contains("No cycles found."));
        assert!(rendered.contains("(last parent wins)"));
        assert!(rendered.contains("✓ hierarchy is valid"));
    }

    #[test]
    fn json_payload_flattens_diagnostics() {
        let payload = CheckOutput::new(broken(), MultiParentPolicy::Reject);
        let json = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(json["ok"], false);
        assert_eq!(json["cycles"][0]["members"][1], "B");
        assert_eq!(json["conflicts"][0]["child"], "X");
    }
}
