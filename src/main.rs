//! Wallet Credit Scorer - batch reliability scores for lending-protocol wallets
//!
//! Reads a transaction dump, aggregates per-wallet behaviour, normalizes it
//! across the batch and writes a 0-1000 score for every wallet.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;

// Use the library crate
use wallet_credit_scorer::cli::commands;
use wallet_credit_scorer::config::Config;

/// Wallet Credit Scorer - deterministic wallet reliability scoring
#[derive(Parser)]
#[command(name = "wallet-score")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "scorer.toml")]
    config: String,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score every wallet in a transaction dump
    Score {
        /// Transaction dump (overrides input.path)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output directory (overrides output.directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Overwrite existing outputs without asking
        #[arg(long)]
        force: bool,
    },

    /// Show how a single wallet's score is built
    Inspect {
        /// Wallet address
        wallet: String,

        /// Transaction dump (overrides input.path)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Show current configuration
    Config,

    /// Show the active weight table
    Weights,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("wallet_credit_scorer=info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.json);

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Score {
            input,
            output_dir,
            force,
        } => commands::score(&config, input, output_dir, force).await,
        Commands::Inspect { wallet, input } => commands::inspect(&config, &wallet, input).await,
        Commands::Config => commands::show_config(&config),
        Commands::Weights => commands::show_weights(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(commands::exit_code(&e));
    }

    Ok(())
}
