use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::hierarchy::{MultiParentPolicy, PathPadding};

/// File looked up in the working directory when no `--config` is given.
pub const CONFIG_FILE_NAME: &str = "rollup.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RollupConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub columns: ColumnConfig,
    #[serde(default)]
    pub hierarchy: HierarchyConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_categories_path")]
    pub categories: PathBuf,
    #[serde(default = "default_products_path")]
    pub products: PathBuf,
    #[serde(default = "default_transactions_path")]
    pub transactions: PathBuf,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            categories: default_categories_path(),
            products: default_products_path(),
            transactions: default_transactions_path(),
        }
    }
}

/// Header names of the input tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnConfig {
    #[serde(default = "default_category_column")]
    pub category: String,
    #[serde(default = "default_parent_column")]
    pub parent: String,
    #[serde(default = "default_product_id_column")]
    pub product_id: String,
    #[serde(default = "default_price_column")]
    pub price: String,
    #[serde(default = "default_quantity_column")]
    pub quantity: String,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            category: default_category_column(),
            parent: default_parent_column(),
            product_id: default_product_id_column(),
            price: default_price_column(),
            quantity: default_quantity_column(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyConfig {
    #[serde(default)]
    pub multi_parent: MultiParentPolicy,
}

/// What to do with a record that cannot be joined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordPolicy {
    /// Leave the record out and count it.
    #[default]
    Skip,
    /// Abort the run.
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_output_path")]
    pub output: PathBuf,
    #[serde(default)]
    pub missing_category: RecordPolicy,
    #[serde(default)]
    pub unknown_product: RecordPolicy,
    #[serde(default = "default_summary_label")]
    pub summary_label: String,
    #[serde(default = "default_true")]
    pub include_categories_without_transactions: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output: default_output_path(),
            missing_category: RecordPolicy::default(),
            unknown_product: RecordPolicy::default(),
            summary_label: default_summary_label(),
            include_categories_without_transactions: default_true(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Fixed column count; `None` sizes the table to the deepest path.
    #[serde(default)]
    pub columns: Option<usize>,
    #[serde(default)]
    pub padding: PathPadding,
    #[serde(default = "default_column_prefix")]
    pub column_prefix: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            columns: None,
            padding: PathPadding::default(),
            column_prefix: default_column_prefix(),
        }
    }
}

/// Read and parse a config file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid TOML for
/// [`RollupConfig`].
pub fn load_config(path: &Path) -> Result<RollupConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<RollupConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Resolve the effective configuration.
///
/// An explicit path must exist. Otherwise `rollup.toml` in `working_dir` is
/// used when present, and defaults when not.
///
/// # Errors
///
/// Returns an error if the chosen file cannot be read or parsed.
pub fn resolve_config(explicit: Option<&Path>, working_dir: &Path) -> Result<RollupConfig> {
    if let Some(path) = explicit {
        return load_config(path);
    }

    let path = working_dir.join(CONFIG_FILE_NAME);
    if !path.exists() {
        return Ok(RollupConfig::default());
    }
    load_config(&path)
}

const fn default_true() -> bool {
    true
}

fn default_categories_path() -> PathBuf {
    PathBuf::from("categories.csv")
}

fn default_products_path() -> PathBuf {
    PathBuf::from("products.csv")
}

fn default_transactions_path() -> PathBuf {
    PathBuf::from("transactions.csv")
}

fn default_output_path() -> PathBuf {
    PathBuf::from("results.csv")
}

fn default_category_column() -> String {
    "Category".to_string()
}

fn default_parent_column() -> String {
    "Parent Category".to_string()
}

fn default_product_id_column() -> String {
    "Product ID".to_string()
}

fn default_price_column() -> String {
    "Price".to_string()
}

fn default_quantity_column() -> String {
    "Quantity".to_string()
}

fn default_summary_label() -> String {
    "All categories".to_string()
}

fn default_column_prefix() -> String {
    "Category".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_config_uses_defaults() {
        let dir = TempDir::new().expect("temp dir");
        let cfg = resolve_config(None, dir.path()).expect("load should succeed");
        assert_eq!(cfg, RollupConfig::default());
        assert_eq!(cfg.columns.parent, "Parent Category");
        assert_eq!(cfg.hierarchy.multi_parent, MultiParentPolicy::Reject);
        assert_eq!(cfg.report.missing_category, RecordPolicy::Skip);
        assert_eq!(cfg.report.summary_label, "All categories");
        assert!(cfg.report.include_categories_without_transactions);
        assert_eq!(cfg.paths.columns, None);
    }

    #[test]
    fn working_dir_config_is_discovered() {
        let dir = TempDir::new().expect("temp dir");
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[hierarchy]\nmulti_parent = \"keep_last\"\n",
        )
        .expect("write config");

        let cfg = resolve_config(None, dir.path()).expect("load");
        assert_eq!(cfg.hierarchy.multi_parent, MultiParentPolicy::KeepLast);
        assert_eq!(cfg.input, InputConfig::default());
    }

    #[test]
    fn partial_sections_keep_field_defaults() {
        let cfg: RollupConfig = toml::from_str(
            r#"
[report]
missing_category = "fail"
summary_label = "Total"

[paths]
columns = 4
padding = "left"

[columns]
price = "Unit Price"
"#,
        )
        .expect("parse");

        assert_eq!(cfg.report.missing_category, RecordPolicy::Fail);
        assert_eq!(cfg.report.unknown_product, RecordPolicy::Skip);
        assert_eq!(cfg.report.summary_label, "Total");
        assert_eq!(cfg.report.output, PathBuf::from("results.csv"));
        assert_eq!(cfg.paths.columns, Some(4));
        assert_eq!(cfg.paths.padding, PathPadding::Left);
        assert_eq!(cfg.paths.column_prefix, "Category");
        assert_eq!(cfg.columns.price, "Unit Price");
        assert_eq!(cfg.columns.quantity, "Quantity");
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = TempDir::new().expect("temp dir");
        let err = resolve_config(Some(&dir.path().join("nope.toml")), dir.path())
            .expect_err("missing explicit config");
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn invalid_policy_is_a_parse_error() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[hierarchy]\nmulti_parent = \"merge\"\n").expect("write");
        let err = load_config(&path).expect_err("bad policy");
        assert!(err.to_string().contains("Failed to parse"));
    }
}
