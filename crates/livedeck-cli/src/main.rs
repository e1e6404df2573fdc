//! Livedeck CLI - Headless Live TV Front End
//!
//! Features:
//! - Channel list browsing and search
//! - Category listing
//! - Channel inspection (DRM, request filter, ad plan)
//! - Headless playback with pre-roll and mid-roll ads

use clap::{Parser, Subcommand};
use livedeck_core::AppConfig;
use std::path::PathBuf;

mod commands;
mod headless;
mod output;

/// Livedeck CLI - Live TV toolkit
#[derive(Parser)]
#[command(name = "livedeck")]
#[command(author = "Purple Squirrel Media")]
#[command(version)]
#[command(about = "Browse live TV channels and run headless playback sessions", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json, table)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// JSON config file overriding the defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List channels
    Channels {
        /// Filter by title, category or tag
        #[arg(short, long)]
        search: Option<String>,

        /// Only show one category
        #[arg(short, long)]
        category: Option<String>,
    },

    /// List channel categories
    Categories,

    /// Show how a channel would be played
    Inspect {
        /// Channel id
        id: String,
    },

    /// Play a channel headlessly
    Play {
        /// Channel id
        id: String,

        /// Seconds to run (0 = until Ctrl-C)
        #[arg(short, long, default_value = "60")]
        duration: u64,

        /// Disable all ads
        #[arg(long)]
        no_ads: bool,

        /// Skip ads as soon as they allow it
        #[arg(long)]
        skip_ads: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Channels { search, category } => {
            commands::channels(&config, search.as_deref(), category.as_deref(), &cli.format).await?;
        }
        Commands::Categories => {
            commands::categories(&config, &cli.format).await?;
        }
        Commands::Inspect { id } => {
            commands::inspect(&config, &id, &cli.format).await?;
        }
        Commands::Play { id, duration, no_ads, skip_ads } => {
            if no_ads {
                config.ads.enabled = false;
            }
            commands::play(config, &id, duration, skip_ads, &cli.format).await?;
        }
    }

    Ok(())
}
