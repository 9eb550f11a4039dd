//! `vcascade recover` command implementation

use colored::Colorize;
use vcascade_engine::transaction::RecoveryAction;

use super::{open_engine, GlobalOptions};
use crate::error::Result;

pub async fn run(opts: GlobalOptions<'_>) -> Result<()> {
    let engine = open_engine(opts).await?;
    let report = engine.recover().await?;

    if report.is_empty() {
        println!("Nothing to recover.");
        return Ok(());
    }

    for tx in &report.transactions {
        let action = match tx.action {
            RecoveryAction::Restored => format!("restored {} file(s)", tx.files).green(),
            RecoveryAction::AlreadyCommitted => "already committed, removed leftover backup".normal(),
            RecoveryAction::Incomplete => "interrupted before any write, removed".normal(),
        };
        println!("{} {action}", tx.transaction_id);
    }
    Ok(())
}
