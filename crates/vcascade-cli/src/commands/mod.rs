//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function.

pub mod bump;
pub mod graph;
pub mod history;
pub mod keys;
pub mod recover;
pub mod validate;
pub mod verify;

use std::path::Path;

use anyhow::Context;
use vcascade_engine::{BumpOrchestrator, EngineConfig};

use crate::error::Result;

/// Global options shared by every command
#[derive(Debug, Clone, Copy)]
pub struct GlobalOptions<'a> {
    pub config: Option<&'a Path>,
    pub workspace: Option<&'a Path>,
}

/// Load the configuration the command runs with
pub fn load_config(opts: GlobalOptions<'_>) -> Result<EngineConfig> {
    let mut config = EngineConfig::load(opts.config).context("Failed to load configuration")?;
    if let Some(root) = opts.workspace {
        config.workspace_root = root.to_path_buf();
    }
    Ok(config)
}

/// Open the engine on the configured workspace
pub async fn open_engine(opts: GlobalOptions<'_>) -> Result<BumpOrchestrator> {
    let config = load_config(opts)?;
    Ok(BumpOrchestrator::open(config).await?)
}

/// `2024-05-01 12:00:00` in UTC, or `-`
pub fn format_millis(millis: Option<i64>) -> String {
    millis
        .and_then(chrono::DateTime::from_timestamp_millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub(crate) fn table() -> comfy_table::Table {
    use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).apply_modifier(UTF8_ROUND_CORNERS);
    table
}
