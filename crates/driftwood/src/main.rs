// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Driftwood - a conversational agent with tools and messages in bottles.
//!
//! This is the binary entry point.

mod serve;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use driftwood_config::DriftwoodConfig;

/// Driftwood - a conversational agent with tools and messages in bottles.
#[derive(Parser, Debug)]
#[command(name = "driftwood", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP gateway, scheduler and agent.
    Serve,
    /// Inspect configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show,
    /// Validate configuration and exit.
    Validate,
}

fn load(path: Option<&PathBuf>) -> Result<DriftwoodConfig, ExitCode> {
    let result = match path {
        Some(path) => driftwood_config::load_and_validate_path(path),
        None => driftwood_config::load_and_validate(),
    };
    result.map_err(|errors| {
        driftwood_config::render_errors(&errors);
        ExitCode::FAILURE
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(code) => return code,
    };

    match cli.command {
        Some(Commands::Serve) => match serve::run_serve(config).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("error: {e}");
                ExitCode::FAILURE
            }
        },
        Some(Commands::Config { action }) => config_command(&config, action),
        None => {
            println!("driftwood: use --help for available commands");
            ExitCode::SUCCESS
        }
    }
}

fn config_command(config: &DriftwoodConfig, action: ConfigAction) -> ExitCode {
    match action {
        ConfigAction::Show => match render_config(config) {
            Ok(text) => {
                print!("{text}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: failed to render configuration: {e}");
                ExitCode::FAILURE
            }
        },
        ConfigAction::Validate => {
            println!("driftwood: configuration is valid");
            ExitCode::SUCCESS
        }
    }
}

/// Effective configuration as TOML, with the API key masked.
fn render_config(config: &DriftwoodConfig) -> Result<String, toml::ser::Error> {
    let mut shown = config.clone();
    if shown.anthropic.api_key.is_some() {
        shown.anthropic.api_key = Some("[redacted]".to_string());
    }
    toml::to_string_pretty(&shown)
}
