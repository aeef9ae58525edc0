//! NavView CLI - headless driver for the navview view core
//!
//! `navview replay` feeds a scripted sequence of props, layouts, commands and
//! platform callbacks into a headless view and prints what the view emits.
//! `navview config` manages `~/.navview/config.ini`.

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use navview::config::config_file_path;
use navview::logging::init_logging;
use navview::NavViewConfig;

use commands::config::ConfigCommands;
use commands::replay::ReplayArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "navview", version = navview::VERSION, about = "Drive a headless map/navigation view")]
struct Cli {
    /// Configuration file (defaults to ~/.navview/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level or filter directive; overrides `logging.level`
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Replay a JSON script against a headless view
    Replay(ReplayArgs),

    /// View or modify configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.unwrap_or_else(config_file_path);

    match cli.command {
        Commands::Config { command } => commands::config::run(command, &config_path),
        Commands::Replay(args) => {
            let mut config = NavViewConfig::load_from(&config_path)?;
            if let Some(level) = cli.log_level {
                config.logging.level = level;
            }
            let _guard = init_logging(&config.logging)?;
            commands::replay::run(args, config).await
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
