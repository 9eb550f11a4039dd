//! `vcascade verify` command implementation

use std::path::PathBuf;

use colored::Colorize;
use vcascade_engine::ManifestVerifier;

use super::{load_config, GlobalOptions};
use crate::error::{CliError, Result};

/// Verify manifests with whatever keys exist; writes nothing
pub async fn run(opts: GlobalOptions<'_>, manifests: Vec<PathBuf>) -> Result<()> {
    let config = load_config(opts)?;
    let verifier = ManifestVerifier::open(&config).await?;

    let paths = if manifests.is_empty() {
        verifier.manifest_paths()?
    } else {
        manifests
    };
    if paths.is_empty() {
        println!("No manifests to verify.");
        return Ok(());
    }

    let mut failed = 0;
    for path in &paths {
        match verifier.verify_file(path) {
            Ok((manifest, true)) => println!(
                "{} {} ({}, {})",
                "✓".green(),
                path.display(),
                manifest.status,
                manifest
                    .key_version
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "unsigned".to_string())
            ),
            Ok((_, false)) => {
                failed += 1;
                println!("{} {} signature mismatch", "✗".red(), path.display());
            },
            Err(e) => {
                failed += 1;
                println!("{} {} {e}", "✗".red(), path.display());
            },
        }
    }

    if failed > 0 {
        return Err(CliError::Verification {
            failed,
            total: paths.len(),
        });
    }
    Ok(())
}
