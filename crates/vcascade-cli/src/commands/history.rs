//! `vcascade history` command implementation

use colored::Colorize;
use vcascade_engine::ManifestStatus;

use super::{format_millis, load_config, table, GlobalOptions};
use crate::error::Result;
use vcascade_engine::ManifestStore;

pub async fn run(opts: GlobalOptions<'_>, limit: usize) -> Result<()> {
    let config = load_config(opts)?;
    let manifests = ManifestStore::new(config.manifests_dir()).list()?;

    if manifests.is_empty() {
        println!("No transactions recorded yet.");
        return Ok(());
    }

    let mut rows = table();
    rows.set_header(vec!["Created", "Transaction", "Scope", "Target", "Status", "Entities", "Key"]);
    for (_, manifest) in manifests.iter().rev().take(limit) {
        let status = match manifest.status {
            ManifestStatus::Committed => manifest.status.to_string().green(),
            ManifestStatus::RolledBack => manifest.status.to_string().red(),
        };
        rows.add_row(vec![
            format_millis(Some(manifest.created_at)),
            manifest.transaction_id.clone(),
            manifest.scope.to_string(),
            manifest.target_entity_id.clone().unwrap_or_else(|| "-".to_string()),
            status.to_string(),
            manifest.affected_entities.len().to_string(),
            manifest
                .key_version
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    println!("{rows}");
    println!("{} of {} transaction(s)", limit.min(manifests.len()), manifests.len());
    Ok(())
}
