//! Run configuration.
//!
//! Defaults are built in; `from_env` overlays environment variables (a `.env`
//! file is loaded first if present) and the CLI overlays its own flags on top.
//!
//! | Variable                  | Meaning                              | Default       |
//! |---------------------------|--------------------------------------|---------------|
//! | `STARLOAD_WAREHOUSE_DIR`  | Root directory of the local warehouse | `./warehouse` |
//! | `STARLOAD_DATASET_ID`     | Dataset the four tables load into    | `etl_output`  |
//! | `STARLOAD_OUTPUT_FORMAT`  | `csv` or `json`                      | `csv`         |

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::parser::OutputFormat;

pub const DEFAULT_WAREHOUSE_DIR: &str = "./warehouse";
pub const DEFAULT_DATASET_ID: &str = "etl_output";

/// Where and how output tables are loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseConfig {
    pub root: PathBuf,
    pub dataset_id: String,
    pub format: OutputFormat,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_WAREHOUSE_DIR),
            dataset_id: DEFAULT_DATASET_ID.to_string(),
            format: OutputFormat::Csv,
        }
    }
}

impl WarehouseConfig {
    /// Defaults overlaid with `STARLOAD_*` environment variables.
    ///
    /// This is the only place `.env` is loaded.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::default().overlay(|key| env::var(key).ok())
    }

    /// Apply values from a variable lookup; unset or unrecognised values keep the current setting.
    pub fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup("STARLOAD_WAREHOUSE_DIR").filter(|v| !v.trim().is_empty()) {
            self.root = PathBuf::from(dir);
        }
        if let Some(id) = lookup("STARLOAD_DATASET_ID").filter(|v| !v.trim().is_empty()) {
            self.dataset_id = id.trim().to_string();
        }
        let format = lookup("STARLOAD_OUTPUT_FORMAT").and_then(|v| OutputFormat::from_name(&v));
        if let Some(format) = format {
            self.format = format;
        }
        self
    }

    /// Fully qualified name of a table, `<dataset>.<table>`.
    pub fn table_id(&self, table_name: &str) -> String {
        format!("{}.{}", self.dataset_id, table_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = WarehouseConfig::default();
        assert_eq!(config.root, PathBuf::from("./warehouse"));
        assert_eq!(config.dataset_id, "etl_output");
        assert_eq!(config.format, OutputFormat::Csv);
        assert_eq!(config.table_id("sales_fact"), "etl_output.sales_fact");
    }

    #[test]
    fn test_overlay() {
        let vars: HashMap<&str, &str> = [
            ("STARLOAD_WAREHOUSE_DIR", "/data/warehouse"),
            ("STARLOAD_DATASET_ID", " retail "),
            ("STARLOAD_OUTPUT_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let config = WarehouseConfig::default().overlay(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.root, PathBuf::from("/data/warehouse"));
        assert_eq!(config.dataset_id, "retail");
        assert_eq!(config.format, OutputFormat::Json);
    }

    #[test]
    fn test_from_env_reads_process_environment() {
        env::set_var("STARLOAD_DATASET_ID", "from_process_env");
        let config = WarehouseConfig::from_env();
        env::remove_var("STARLOAD_DATASET_ID");

        assert_eq!(config.dataset_id, "from_process_env");
    }

    #[test]
    fn test_overlay_ignores_bad_values() {
        let config = WarehouseConfig::default().overlay(|k| match k {
            "STARLOAD_OUTPUT_FORMAT" => Some("parquet".to_string()),
            "STARLOAD_DATASET_ID" => Some("   ".to_string()),
            _ => None,
        });
        assert_eq!(config, WarehouseConfig::default());
    }
}
