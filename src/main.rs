//! Binary entry point for manifesto-votes.
//!
//! This binary provides the CLI interface for the manifesto voting backend.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use manifesto_votes::ItemId;
use manifesto_votes::cli::{self, VoteMode};
use manifesto_votes::config::{CONFIG_PATH_ENV, VotesConfig};
use manifesto_votes::observability::{self, InitOptions};
use std::process::ExitCode;

/// Manifesto votes - vote de-duplication, counting and ranking.
#[derive(Parser)]
#[command(name = "manifesto-votes")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP vote API.
    Serve {
        /// Host to bind (overrides config).
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides config).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print current vote counts in display order.
    Counts,

    /// Vote for an item.
    Vote {
        /// Item id to vote for.
        item: String,

        /// Count the vote in local client storage instead of the API.
        #[arg(long)]
        local: bool,

        /// Base URL of the vote API (overrides config).
        #[arg(long, env = "MANIFESTO_VOTES_API_URL")]
        api_url: Option<String>,
    },

    /// Manage configuration.
    Config {
        /// Show the effective configuration.
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let expose_metrics = matches!(cli.command, Commands::Serve { .. });
    let observability = match observability::init_from_config(
        &config,
        InitOptions {
            verbose: cli.verbose,
            metrics_expose: expose_metrics,
        },
    ) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to initialize observability: {e}");
            return ExitCode::FAILURE;
        },
    };

    let result = run_command(cli.command, config).await;

    // Only `serve` exposes a scrape listener
    if let Some(metrics) = observability.metrics() {
        tracing::debug!(metrics = %metrics.render(), "Final metrics snapshot");
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
async fn run_command(
    command: Commands,
    mut config: VotesConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout().lock();

    match command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            cli::run_serve(&config).await?;
        },
        Commands::Counts => cli::run_counts(&config, &mut stdout)?,
        Commands::Vote {
            item,
            local,
            api_url,
        } => {
            if let Some(url) = api_url {
                config.client.api_base_url = url;
            }
            let mode = if local {
                VoteMode::Local
            } else {
                VoteMode::Server
            };
            cli::run_vote(&config, ItemId::new(item), mode, &mut stdout).await?;
        },
        Commands::Config { show } => {
            if show {
                cli::run_config(&config, &mut stdout)?;
            } else {
                eprintln!("Use --show to display the effective configuration");
            }
        },
    }

    Ok(())
}

/// Loads configuration, then applies environment overrides.
fn load_config(path: Option<&str>) -> Result<VotesConfig, Box<dyn std::error::Error>> {
    // If a path is provided, load from that file
    if let Some(config_path) = path {
        return Ok(VotesConfig::load_from_file(std::path::Path::new(config_path))?
            .with_env_overrides());
    }

    // Environment override for config path
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        if !config_path.trim().is_empty() {
            return Ok(
                VotesConfig::load_from_file(std::path::Path::new(&config_path))?
                    .with_env_overrides(),
            );
        }
    }

    // Otherwise, load from default location
    Ok(VotesConfig::load_default().with_env_overrides())
}
