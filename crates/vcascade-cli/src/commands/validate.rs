//! `vcascade validate` command implementation

use colored::Colorize;

use super::{load_config, GlobalOptions};
use crate::error::{CliError, Result};
use vcascade_engine::graph::GraphValidator;
use vcascade_engine::RegistryStore;

/// Validate the registry without opening signing keys
pub async fn run(opts: GlobalOptions<'_>, json: bool) -> Result<()> {
    let config = load_config(opts)?;
    let registry = RegistryStore::new(config.registry_file()).load()?;
    let report = GraphValidator::new(config.max_graph_depth).validate(&registry);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for error in &report.errors {
            println!("{} {error}", "error:".red().bold());
        }
        for warning in &report.warnings {
            println!("{} {warning}", "warning:".yellow().bold());
        }
        for chain in &report.info {
            println!(
                "{} {} -> {} (depth {})",
                "ok:".green(),
                chain.entity_id,
                chain.root_id,
                chain.depth
            );
        }
        println!();
        println!(
            "{} entities, {} error(s), {} warning(s)",
            registry.len(),
            report.errors.len(),
            report.warnings.len()
        );
    }

    if report.is_valid() {
        Ok(())
    } else {
        Err(CliError::Integrity {
            issues: report.errors,
        })
    }
}
