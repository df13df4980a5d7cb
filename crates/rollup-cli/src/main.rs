#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::{CliError, OutputMode, render_error, resolve_output_mode};
use rollup_core::timing;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "rollup: roll product sales up a category hierarchy",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit command timing report to stderr.
    #[arg(long, global = true)]
    timing: bool,

    /// Config file (defaults to ./rollup.toml when present).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output format (default: pretty on a terminal, text when piped).
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Alias for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Derive the output mode from flags and environment.
    fn output_mode(&self) -> OutputMode {
        resolve_output_mode(self.format, self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Write the per-category sales report",
        long_about = "Resolve every product to the top-level ancestor of its category and write \
                      average price, product count and total transaction value per ancestor, \
                      followed by a summary row.",
        after_help = "EXAMPLES:\n    # Use inputs named in rollup.toml (or the defaults)\n    rollup report\n\n    # Explicit inputs and destination\n    rollup report --categories tree.csv --products items.csv --transactions sales.csv -o results.csv\n\n    # Emit machine-readable output\n    rollup report --json"
    )]
    Report(cmd::report::ReportArgs),

    #[command(
        about = "Print the top-level ancestor of categories",
        long_about = "Map categories to their top-level ancestor. Every category in the \
                      hierarchy is resolved when none are named.",
        after_help = "EXAMPLES:\n    # Resolve everything\n    rollup resolve\n\n    # Resolve two categories\n    rollup resolve Shirts Novels\n\n    # Emit machine-readable output\n    rollup resolve --json"
    )]
    Resolve(cmd::resolve::ResolveArgs),

    #[command(
        about = "Export leaf-to-root category paths",
        long_about = "Write one row per leaf category holding its path up to the root, most \
                      specific category first, padded to a fixed width.",
        after_help = "EXAMPLES:\n    # Print the path table as CSV\n    rollup paths\n\n    # Four columns, written to a file\n    rollup paths --columns 4 -o paths.csv"
    )]
    Paths(cmd::paths::PathsArgs),

    #[command(
        about = "Validate the category hierarchy",
        long_about = "List every cycle and every category with conflicting parents. Exits \
                      non-zero when the hierarchy cannot be built.",
        after_help = "EXAMPLES:\n    # Check the configured categories table\n    rollup check\n\n    # Check another file\n    rollup check --categories tree.csv --json"
    )]
    Check(cmd::check::CheckArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("ROLLUP_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "rollup=debug,info"
        } else {
            "rollup=info,warn"
        })
    });

    let format = env::var("ROLLUP_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: &Cli, output: OutputMode) -> anyhow::Result<()> {
    let working_dir = env::current_dir()?;
    let ctx = cmd::Context::load(cli.config.as_deref(), &working_dir)?;

    match cli.command {
        Commands::Report(ref args) => {
            timing::timed("cmd.report", || cmd::report::run_report(args, output, &ctx))
        }
        Commands::Resolve(ref args) => {
            timing::timed("cmd.resolve", || cmd::resolve::run_resolve(args, output, &ctx))
        }
        Commands::Paths(ref args) => {
            timing::timed("cmd.paths", || cmd::paths::run_paths(args, output, &ctx))
        }
        Commands::Check(ref args) => {
            timing::timed("cmd.check", || cmd::check::run_check(args, output, &ctx))
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let timing_enabled = cli.timing || timing::timing_enabled_from_env();
    timing::set_timing_enabled(timing_enabled);
    timing::clear_timings();

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let output = cli.output_mode();
    let command_result = run(&cli, output);

    if timing_enabled {
        let report = timing::collect_report();
        if report.is_empty() {
            eprintln!("timing report: no samples recorded");
        } else {
            eprintln!("timing report:");
            eprintln!("{}", report.display_table());
            eprintln!("timing report (json):");
            eprintln!("{}", report.to_json());
        }
    }

    match command_result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let cli_error = CliError::from(&err);
            if render_error(output, &cli_error).is_err() {
                eprintln!("error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_flag_parses_before_subcommand() {
        let cli = Cli::parse_from(["rollup", "--timing", "check"]);
        assert!(cli.timing);
        assert!(matches!(cli.command, Commands::Check(_)));
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::parse_from(["rollup", "report", "--timing", "--verbose", "--config", "x.toml"]);
        assert!(cli.timing);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
    }

    #[test]
    fn json_flag_sets_output_mode() {
        let cli = Cli::parse_from(["rollup", "resolve", "--json"]);
        assert!(cli.json);
        assert!(cli.output_mode().is_json());
    }

    #[test]
    fn format_flag_parses_value_enum() {
        let cli = Cli::parse_from(["rollup", "--format", "text", "paths"]);
        assert_eq!(cli.format, Some(OutputMode::Text));
        assert_eq!(cli.output_mode(), OutputMode::Text);
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!(Cli::try_parse_from(["rollup", "--format", "yaml", "check"]).is_err());
    }

    #[test]
    fn resolve_subcommand_collects_categories() {
        let cli = Cli::parse_from(["rollup", "resolve", "Shirts", "Novels"]);
        match cli.command {
            Commands::Resolve(args) => assert_eq!(args.names, vec!["Shirts", "Novels"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["rollup"]).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
