//! vcascade CLI - Main entry point

use std::process;

use clap::Parser;
use colored::Colorize;
use tracing::error;
use vcascade_cli::commands::{self, bump::BumpArgs, GlobalOptions};
use vcascade_cli::{Cli, Commands};
use vcascade_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Verbose: debug to console. Otherwise warnings only; env vars override.
    let log_config = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Warn })
        .output(LogOutput::Console)
        .log_file_prefix("vcascade")
        .build();
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    // The CLI works without logging
    let _guard = init_logging(&log_config).ok();

    if let Err(e) = execute_command(&cli).await {
        error!(error = %e, "Command failed");
        eprintln!("{} {e}", "Error:".red().bold());
        process::exit(e.exit_code());
    }
}

async fn execute_command(cli: &Cli) -> vcascade_cli::Result<()> {
    let opts = GlobalOptions {
        config: cli.config.as_deref(),
        workspace: cli.workspace.as_deref(),
    };

    match &cli.command {
        Commands::Bump {
            scope,
            entity,
            increment,
            dry_run,
            json,
        } => {
            commands::bump::run(
                opts,
                BumpArgs {
                    scope: *scope,
                    entity: entity.clone(),
                    increment: *increment,
                    dry_run: *dry_run,
                    json: *json,
                },
            )
            .await
        },
        Commands::Validate { json } => commands::validate::run(opts, *json).await,
        Commands::Verify { manifests } => commands::verify::run(opts, manifests.clone()).await,
        Commands::History { limit } => commands::history::run(opts, *limit).await,
        Commands::Graph => commands::graph::run(opts).await,
        Commands::Keys { command } => commands::keys::run(opts, command).await,
        Commands::Recover => commands::recover::run(opts).await,
    }
}
