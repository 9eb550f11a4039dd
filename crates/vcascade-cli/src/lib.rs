//! vcascade CLI Library
//!
//! Command-line interface for the vcascade engine.
//!
//! # Overview
//!
//! - **Bumps**: cascade a version bump through the registry (`vcascade bump`)
//! - **Validation**: check the registry graph (`vcascade validate`, `vcascade graph`)
//! - **Manifests**: verify signatures and list history (`vcascade verify`, `vcascade history`)
//! - **Keys**: inspect and rotate signing keys (`vcascade keys`)
//! - **Recovery**: restore interrupted transactions (`vcascade recover`)

pub mod commands;
pub mod error;

// Re-export commonly used types
pub use error::{CliError, Result};

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use vcascade_engine::{BumpKind, BumpScope, KeyVersion};

/// vcascade - version dependency graph and atomic cascade bumps
#[derive(Parser, Debug)]
#[command(name = "vcascade")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./vcascade.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Workspace root, overriding the configuration
    #[arg(short = 'C', long, global = true)]
    pub workspace: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bump versions and cascade to linked entities
    Bump {
        /// global, major, minor or patch
        scope: BumpScope,

        /// Entity to bump (required for major/minor/patch)
        #[arg(short, long)]
        entity: Option<String>,

        /// Increment applied to every root by a global bump
        #[arg(short, long, default_value = "patch")]
        increment: BumpKind,

        /// Report what would change without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate the registry graph
    Validate {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Verify manifest signatures (all manifests when none are given)
    Verify {
        manifests: Vec<PathBuf>,
    },

    /// List committed and rolled-back transactions
    History {
        /// Show at most this many, newest first
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Print the registry as a tree
    Graph,

    /// Signing key management
    Keys {
        #[command(subcommand)]
        command: KeysCommand,
    },

    /// Restore transactions interrupted before commit
    Recover,
}

#[derive(Subcommand, Debug)]
pub enum KeysCommand {
    /// Show which keys are loaded and which one signs
    Status,

    /// Switch the signing key for new manifests
    Rotate {
        /// primary or secondary
        #[arg(long)]
        to: KeyVersion,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_bump() {
        let cli = Cli::try_parse_from(["vcascade", "bump", "minor", "--entity=component:foo", "--dry-run"]).unwrap();
        let Commands::Bump {
            scope,
            entity,
            increment,
            dry_run,
            json,
        } = cli.command
        else {
            panic!("expected bump");
        };
        assert_eq!(scope, BumpScope::Minor);
        assert_eq!(entity.as_deref(), Some("component:foo"));
        assert_eq!(increment, BumpKind::Patch);
        assert!(dry_run);
        assert!(!json);
    }

    #[test]
    fn test_rejects_unknown_scope() {
        assert!(Cli::try_parse_from(["vcascade", "bump", "huge"]).is_err());
        assert!(Cli::try_parse_from(["vcascade", "keys", "rotate", "--to", "tertiary"]).is_err());
    }
}
