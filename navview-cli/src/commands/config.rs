//! Configuration management CLI commands.
//!
//! Provides `config get`, `config set`, `config list` (alias `show`), `config init` and
//! `config path` for viewing and modifying `config.ini` from the command line.

use std::path::Path;

use clap::Subcommand;
use navview::config::ConfigKey;
use navview::NavViewConfig;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Get a configuration value
    Get {
        /// Configuration key in format section.key (e.g., camera.default_zoom)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key in format section.key (e.g., camera.default_zoom)
        key: String,

        /// Value to set
        value: String,
    },

    /// List all configuration settings
    #[command(alias = "show")]
    List,

    /// Write a configuration file with every default value
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand against the file at `path`.
pub fn run(command: ConfigCommands, path: &Path) -> Result<(), CliError> {
    match command {
        ConfigCommands::Get { key } => run_get(path, &key),
        ConfigCommands::Set { key, value } => run_set(path, &key, &value).map(|line| {
            println!("{}", line);
        }),
        ConfigCommands::List => run_list(path),
        ConfigCommands::Init { force } => run_init(path, force),
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn parse_key(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        CliError::Config(format!(
            "Unknown configuration key '{}'. Use 'navview config list' to see available keys.",
            key
        ))
    })
}

fn run_get(path: &Path, key: &str) -> Result<(), CliError> {
    let config_key = parse_key(key)?;
    let config = NavViewConfig::load_from(path)?;
    let value = config_key.get(&config);

    if value.is_empty() {
        println!("(not set)");
    } else {
        println!("{}", value);
    }
    Ok(())
}

/// Validate and persist one value. Returns the confirmation line.
fn run_set(path: &Path, key: &str, value: &str) -> Result<String, CliError> {
    let config_key = parse_key(key)?;
    let mut config = NavViewConfig::load_from(path)?;
    config_key
        .set(&mut config, value)
        .map_err(|e| CliError::Config(e.to_string()))?;
    config
        .validate()
        .map_err(|e| CliError::Config(e.to_string()))?;
    config.save_to(path)?;

    Ok(format!("Set {} = {}", config_key.name(), config_key.get(&config)))
}

fn run_list(path: &Path) -> Result<(), CliError> {
    let config = NavViewConfig::load_from(path)?;

    println!("Configuration Settings");
    println!("======================");
    println!();

    let mut current_section = "";
    for key in ConfigKey::all() {
        let section = key.section();
        if section != current_section {
            if !current_section.is_empty() {
                println!();
            }
            println!("[{}]", section);
            current_section = section;
        }

        let value = key.get(&config);
        if value.is_empty() {
            println!("  {} = (not set)", key.key_name());
        } else {
            println!("  {} = {}", key.key_name(), value);
        }
    }
    Ok(())
}

fn run_init(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        )));
    }
    NavViewConfig::default().save_to(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
