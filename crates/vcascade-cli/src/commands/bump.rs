//! `vcascade bump` command implementation

use colored::Colorize;
use serde_json::json;
use vcascade_engine::{BumpKind, BumpOutcome, BumpRequest, BumpScope};

use super::{open_engine, table, GlobalOptions};
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct BumpArgs {
    pub scope: BumpScope,
    pub entity: Option<String>,
    pub increment: BumpKind,
    pub dry_run: bool,
    pub json: bool,
}

pub async fn run(opts: GlobalOptions<'_>, args: BumpArgs) -> Result<()> {
    let engine = open_engine(opts).await?;

    let request = BumpRequest {
        scope: args.scope,
        target_entity_id: args.entity,
        global_increment: args.increment,
        dry_run: args.dry_run,
    };
    let outcome = engine.bump(request).await?;

    if args.json {
        print_json(&outcome)?;
    } else {
        print_human(&outcome);
    }
    Ok(())
}

fn print_json(outcome: &BumpOutcome) -> Result<()> {
    let value = json!({
        "transactionId": outcome.transaction_id,
        "status": outcome.status,
        "dryRun": outcome.dry_run,
        "affectedEntities": outcome.affected,
        "fileChanges": outcome.file_changes,
        "warnings": outcome.warnings,
        "manifestPath": outcome.manifest_path,
    });
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn print_human(outcome: &BumpOutcome) {
    if outcome.dry_run {
        println!("{} nothing was written", "Dry run:".yellow().bold());
    } else {
        println!(
            "{} transaction {}",
            "Committed".green().bold(),
            outcome.transaction_id
        );
    }
    println!();

    if outcome.affected.is_empty() {
        println!("No entities affected.");
        return;
    }

    let mut entities = table();
    entities.set_header(vec!["Entity", "Old", "New"]);
    for entity in &outcome.affected {
        entities.add_row(vec![
            entity.entity_id.as_str(),
            entity.old_version.as_str(),
            entity.new_version.as_str(),
        ]);
    }
    println!("{entities}");

    if !outcome.file_changes.is_empty() {
        let mut files = table();
        files.set_header(vec!["File", "Matches"]);
        for change in &outcome.file_changes {
            files.add_row(vec![change.file_path.clone(), change.match_count.to_string()]);
        }
        println!("{files}");
    }

    for warning in &outcome.warnings {
        println!("{} {warning}", "warning:".yellow().bold());
    }

    if let Some(path) = &outcome.manifest_path {
        println!();
        println!("Manifest: {}", path.display().to_string().cyan());
    }
}
