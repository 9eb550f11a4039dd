//! `vcascade keys` command implementation

use colored::Colorize;
use vcascade_engine::KeyVersion;

use super::{format_millis, open_engine, table, GlobalOptions};
use crate::error::Result;
use crate::KeysCommand;

pub async fn run(opts: GlobalOptions<'_>, command: &KeysCommand) -> Result<()> {
    match command {
        KeysCommand::Status => status(opts).await,
        KeysCommand::Rotate { to } => rotate(opts, *to).await,
    }
}

async fn status(opts: GlobalOptions<'_>) -> Result<()> {
    let engine = open_engine(opts).await?;

    let mut rows = table();
    rows.set_header(vec!["Key", "Loaded", "Source", "Fingerprint", "Signs new manifests"]);
    for key in engine.key_status() {
        rows.add_row(vec![
            key.version.to_string(),
            if key.is_loaded() { "yes".green().to_string() } else { "no".red().to_string() },
            key.source.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string()),
            key.fingerprint.clone().unwrap_or_else(|| "-".to_string()),
            if key.current { "*".to_string() } else { String::new() },
        ]);
    }
    println!("{rows}");
    Ok(())
}

async fn rotate(opts: GlobalOptions<'_>, to: KeyVersion) -> Result<()> {
    let engine = open_engine(opts).await?;
    let state = engine.rotate_signing_key(to).await?;

    println!(
        "{} new manifests are signed with the {} key (was {}, rotated at {})",
        "Rotated:".green().bold(),
        state.current_key_version,
        state
            .previous_key_version
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".to_string()),
        format_millis(state.rotated_at)
    );
    println!("Manifests signed with either key keep verifying while both keys are configured.");
    Ok(())
}
