use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod config;
mod domain;
mod error;
mod infrastructure;
mod services;
mod tools;
mod ui;

use cli::{Cli, Commands};
use commands::{destroy, outputs, preview, up};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging with LOGGING env var support
    // LOGGING=debug,info,warn,error or just LOGGING=debug
    let log_level = std::env::var("LOGGING")
        .or_else(|_| std::env::var("LOG_LEVEL"))
        .unwrap_or_else(|_| {
            if cli.verbose {
                "debug".to_string()
            } else {
                "info".to_string()
            }
        });

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_ansi(false) // Disable ANSI escape codes for cleaner output
        .init();

    let result = match cli.command {
        Commands::Up {
            image_tag,
            region,
            profile,
        } => up::execute(cli.config, cli.state_dir, image_tag, region, profile).await,
        Commands::Preview { image_tag } => {
            preview::execute(cli.config, cli.state_dir, image_tag).await
        }
        Commands::Outputs { json } => outputs::execute(cli.config, cli.state_dir, json).await,
        Commands::Destroy {
            yes,
            region,
            profile,
        } => destroy::execute(cli.config, cli.state_dir, yes, region, profile).await,
    };

    if let Err(ref e) = result {
        tracing::error!("registry-mirror failed: {:#}", e);
    }

    result
}
