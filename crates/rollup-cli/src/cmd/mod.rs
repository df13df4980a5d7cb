//! Subcommand handlers and the input plumbing they share.

pub mod check;
pub mod paths;
pub mod report;
pub mod resolve;

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use rollup_core::ErrorCode;
use rollup_core::config::{RollupConfig, resolve_config};
use rollup_core::hierarchy::CategoryGraph;
use rollup_core::load::{CategoryTable, load_categories};
use rollup_core::timing;
use tracing::debug;

use crate::output::CommandFailure;

/// Effective configuration plus the directory relative paths resolve from.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: RollupConfig,
    pub working_dir: PathBuf,
}

impl Context {
    /// Load the configuration for `working_dir`, honoring an explicit
    /// `--config` path.
    pub fn load(config_path: Option<&Path>, working_dir: &Path) -> anyhow::Result<Self> {
        let config = timing::timed("config.load", || resolve_config(config_path, working_dir))?;
        debug!(?config, "effective configuration");
        Ok(Self {
            config,
            working_dir: working_dir.to_path_buf(),
        })
    }

    /// Resolve a possibly relative path against the working directory.
    pub fn path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_dir.join(path)
        }
    }

    /// Categories table path: the override if given, else `[input]`.
    pub fn categories_path(&self, override_path: Option<&Path>) -> PathBuf {
        self.path(override_path.unwrap_or(&self.config.input.categories))
    }

    /// Read the categories table without validating it.
    pub fn load_category_table(&self, override_path: Option<&Path>) -> anyhow::Result<CategoryTable> {
        let path = self.categories_path(override_path);
        timing::timed("load.categories", || {
            load_categories(&path, &self.config.columns)
        })
        .with_context(|| format!("loading categories from {}", path.display()))
    }

    /// Read the categories table and build the validated hierarchy.
    pub fn load_graph(&self, override_path: Option<&Path>) -> anyhow::Result<CategoryGraph> {
        let table = self.load_category_table(override_path)?;
        let graph = timing::timed("graph.build", || {
            table.builder(self.config.hierarchy.multi_parent).build()
        })?;
        Ok(graph)
    }
}

/// Create an output file, reporting failure as [`ErrorCode::ReportWriteFailed`].
pub fn create_output(path: &Path) -> anyhow::Result<BufWriter<File>> {
    let file = File::create(path).map_err(|e| {
        CommandFailure::new(
            ErrorCode::ReportWriteFailed,
            format!("failed to create {}: {e}", path.display()),
        )
    })?;
    Ok(BufWriter::new(file))
}
