//! Shared output layer for pretty/text/JSON parity across all CLI commands.
//!
//! Every command handler receives an [`OutputMode`] and formats its output
//! accordingly: pretty output for humans, compact text for scripts, or stable
//! JSON.
//!
//! # Output mode resolution
//!
//! Precedence (highest wins):
//! 1. `--format` / hidden `--json` flag
//! 2. `FORMAT` env var → `"pretty"` | `"text"` | `"json"`
//! 3. Default: [`OutputMode::Pretty`] if stdout is a TTY; [`OutputMode::Text`] if piped.
//!
//! # Errors
//!
//! Failures are rendered to stderr as a [`CliError`] carrying the stable
//! `E####` code of the first typed error found in the `anyhow` chain.

use clap::ValueEnum;
use rollup_core::ErrorCode;
use rollup_core::hierarchy::HierarchyError;
use rollup_core::load::LoadError;
use rollup_core::report::ReportError;
use serde::Serialize;
use std::io::{self, IsTerminal, Write};

/// Shared width for human pretty separators.
pub const PRETTY_RULE_WIDTH: usize = 60;

/// Write a horizontal separator used by pretty human output.
pub fn pretty_rule(w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{:-<width$}", "", width = PRETTY_RULE_WIDTH)
}

/// Write a section heading followed by a separator.
pub fn pretty_section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}")?;
    pretty_rule(w)
}

/// Render a left-aligned key/value line in human output.
pub fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    writeln!(w, "{:<22} {}", format!("{key}:"), value.as_ref())
}

/// The three output modes supported by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Human-optimized output (sections, aligned columns).
    Pretty,
    /// Plain tab-separated text for pipes and scripts.
    Text,
    /// Machine-readable JSON.
    Json,
}

impl OutputMode {
    /// Returns `true` if JSON output was requested.
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Core resolution logic, separated from I/O for testability.
fn resolve_output_mode_inner(
    format_flag: Option<OutputMode>,
    json_flag: bool,
    format_env: Option<&str>,
    is_tty: bool,
) -> OutputMode {
    if let Some(mode) = format_flag {
        return mode;
    }

    if json_flag {
        return OutputMode::Json;
    }

    if let Some(val) = format_env {
        match val.to_lowercase().as_str() {
            "json" => return OutputMode::Json,
            "text" => return OutputMode::Text,
            "pretty" => return OutputMode::Pretty,
            _ => {}
        }
    }

    if is_tty {
        OutputMode::Pretty
    } else {
        OutputMode::Text
    }
}

/// Resolve the output mode from CLI flags, environment, and TTY defaults.
pub fn resolve_output_mode(format_flag: Option<OutputMode>, json_flag: bool) -> OutputMode {
    let env_val = std::env::var("FORMAT").ok();
    let is_tty = io::stdout().is_terminal();
    resolve_output_mode_inner(format_flag, json_flag, env_val.as_deref(), is_tty)
}

/// Render a serializable value with explicit text and pretty renderers.
pub fn render_mode<T: Serialize>(
    mode: OutputMode,
    value: &T,
    text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
    pretty_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut out, value)?;
            writeln!(out)?;
        }
        OutputMode::Text => text_fn(value, &mut out)?,
        OutputMode::Pretty => pretty_fn(value, &mut out)?,
    }
    Ok(())
}

/// A failure raised by a command itself rather than by the library.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct CommandFailure {
    pub code: ErrorCode,
    pub message: String,
}

impl CommandFailure {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// A structured error with optional suggestion and error code.
#[derive(Debug, Serialize)]
pub struct CliError {
    /// Human-readable error message.
    pub message: String,
    /// Optional suggestion for how to fix the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Machine-readable error code (e.g. "E2001").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CliError {
    /// Build a [`CliError`] from a stable code and a message.
    pub fn with_code(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: code.hint().map(str::to_string),
            error_code: Some(code.code().to_string()),
        }
    }
}

impl From<&anyhow::Error> for CliError {
    fn from(err: &anyhow::Error) -> Self {
        Self::with_code(classify(err), format!("{err:#}"))
    }
}

/// Find the [`ErrorCode`] for an error by walking its source chain.
///
/// Typed library errors win. Bare TOML failures come from the config file,
/// bare CSV failures from writing output, and a missing file from input.
pub fn classify(err: &anyhow::Error) -> ErrorCode {
    for cause in err.chain() {
        if let Some(failure) = cause.downcast_ref::<CommandFailure>() {
            return failure.code;
        }
        if let Some(e) = cause.downcast_ref::<HierarchyError>() {
            return e.code();
        }
        if let Some(e) = cause.downcast_ref::<LoadError>() {
            return e.code();
        }
        if let Some(e) = cause.downcast_ref::<ReportError>() {
            return e.code();
        }
        if cause.is::<toml::de::Error>() {
            return ErrorCode::ConfigParseError;
        }
        if cause.is::<csv::Error>() {
            return ErrorCode::ReportWriteFailed;
        }
        if cause
            .downcast_ref::<io::Error>()
            .is_some_and(|io_err| io_err.kind() == io::ErrorKind::NotFound)
        {
            return ErrorCode::InputNotFound;
        }
    }
    ErrorCode::InternalUnexpected
}

/// Render an error to stderr in the requested format.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    write_error(mode, error, &mut out)?;
    Ok(())
}

fn write_error(mode: OutputMode, error: &CliError, out: &mut dyn Write) -> anyhow::Result<()> {
    match mode {
        OutputMode::Json => {
            let wrapper = serde_json::json!({
                "error": error,
            });
            serde_json::to_writer_pretty(&mut *out, &wrapper)?;
            writeln!(out)?;
        }
        OutputMode::Pretty | OutputMode::Text => {
            match error.error_code {
                Some(ref code) => writeln!(out, "error[{code}]: {}", error.message)?,
                None => writeln!(out, "error: {}", error.message)?,
            }
            if let Some(ref suggestion) = error.suggestion {
                writeln!(out, "  suggestion: {suggestion}")?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    // ── resolve_output_mode_inner ───────────────────────────────────────────

    #[test]
    fn resolve_format_flag_wins_over_json_and_env() {
        let mode = resolve_output_mode_inner(Some(OutputMode::Text), true, Some("pretty"), true);
        assert_eq!(mode, OutputMode::Text);
    }

    #[test]
    fn resolve_json_flag_wins_over_env() {
        let mode = resolve_output_mode_inner(None, true, Some("pretty"), true);
        assert_eq!(mode, OutputMode::Json);
    }

    #[test]
    fn resolve_format_env_case_insensitive() {
        let mode = resolve_output_mode_inner(None, false, Some("JSON"), true);
        assert_eq!(mode, OutputMode::Json);
    }

    #[test]
    fn resolve_format_env_unknown_falls_through_to_tty() {
        let mode_tty = resolve_output_mode_inner(None, false, Some("fancy"), true);
        assert_eq!(mode_tty, OutputMode::Pretty);
        let mode_pipe = resolve_output_mode_inner(None, false, Some("fancy"), false);
        assert_eq!(mode_pipe, OutputMode::Text);
    }

    #[test]
    fn resolve_default_no_tty_is_text() {
        let mode = resolve_output_mode_inner(None, false, None, false);
        assert_eq!(mode, OutputMode::Text);
        assert!(!mode.is_json());
    }

    // ── classify ────────────────────────────────────────────────────────────

    #[test]
    fn classify_finds_hierarchy_error_under_context() {
        let err = Err::<(), _>(HierarchyError::UnknownCategory("Hats".into()))
            .context("resolving categories")
            .expect_err("error");
        assert_eq!(classify(&err), ErrorCode::UnknownCategory);
    }

    #[test]
    fn classify_report_error_delegates_to_hierarchy_code() {
        let err = anyhow::Error::new(ReportError::Hierarchy(HierarchyError::Cycle {
            path: vec!["A".into(), "B".into(), "A".into()],
        }));
        assert_eq!(classify(&err), ErrorCode::CycleDetected);
    }

    #[test]
    fn classify_command_failure_uses_its_code() {
        let err = anyhow::Error::new(CommandFailure::new(ErrorCode::ConflictingParents, "bad"));
        assert_eq!(classify(&err), ErrorCode::ConflictingParents);
    }

    #[test]
    fn classify_toml_error_is_config_parse() {
        let toml_err = toml::from_str::<toml::Value>("not = [valid").expect_err("bad toml");
        let err = anyhow::Error::new(toml_err).context("Failed to parse rollup.toml");
        assert_eq!(classify(&err), ErrorCode::ConfigParseError);
    }

    #[test]
    fn classify_missing_file_is_input_not_found() {
        let err = anyhow::Error::new(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert_eq!(classify(&err), ErrorCode::InputNotFound);
    }

    #[test]
    fn classify_unknown_is_internal() {
        let err = anyhow::anyhow!("something odd");
        assert_eq!(classify(&err), ErrorCode::InternalUnexpected);
    }

    // ── error rendering ─────────────────────────────────────────────────────

    #[test]
    fn cli_error_carries_code_and_hint() {
        let err = CliError::with_code(ErrorCode::CycleDetected, "category cycle detected: A -> A");
        assert_eq!(err.error_code.as_deref(), Some("E2001"));
        assert!(err.suggestion.as_deref().is_some_and(|s| s.contains("rollup check")));
    }

    #[test]
    fn cli_error_json_omits_missing_fields() {
        let err = CliError::with_code(ErrorCode::UnknownCategory, "category not found: 'X'");
        let json = serde_json::to_value(&err).expect("serialize");
        assert_eq!(json["error_code"], "E2003");
        assert!(json.get("suggestion").is_none());
    }

    #[test]
    fn write_error_text_includes_code_and_suggestion() {
        let err = CliError::with_code(ErrorCode::PathTooDeep, "path too deep");
        let mut out = Vec::new();
        write_error(OutputMode::Text, &err, &mut out).expect("write");
        let rendered = String::from_utf8(out).expect("utf8");
        assert!(rendered.starts_with("error[E4001]: path too deep"));
        assert!(rendered.contains("suggestion: Raise paths.columns"));
    }

    #[test]
    fn write_error_json_wraps_in_error_key() {
        let err = CliError::with_code(ErrorCode::MalformedInput, "bad cell");
        let mut out = Vec::new();
        write_error(OutputMode::Json, &err, &mut out).expect("write");
        let json: serde_json::Value = serde_json::from_slice(&out).expect("json");
        assert_eq!(json["error"]["error_code"], "E1003");
        assert_eq!(json["error"]["message"], "bad cell");
    }

    #[test]
    fn pretty_helpers_align_keys() {
        let mut out = Vec::new();
        pretty_section(&mut out, "Report").expect("section");
        pretty_kv(&mut out, "rows", "3").expect("kv");
        let rendered = String::from_utf8(out).expect("utf8");
        assert!(rendered.starts_with("Report\n---"));
        assert!(rendered.contains("rows:                  3"));
    }
}
