use anyhow::Result;
use clap::Parser;
use velocity_config::domains::VelocityConfig;
use velocity_logging::init_logging_from_config;

mod cli;
mod commands;

use cli::{Cli, Commands, ConfigCommands};
use commands::{handle_config_generate, handle_config_validate, history_command, load_config, run_command};

/// Load configuration, apply global overrides and start logging
fn setup(cli: &Cli) -> Result<VelocityConfig> {
    let mut config = load_config(cli.config.as_ref())?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    init_logging_from_config(&config.logging)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Run(args) => run_command(setup(&cli)?, args).await,
        Commands::History { clear } => history_command(&setup(&cli)?, *clear),
        Commands::Config { config_cmd } => match config_cmd {
            ConfigCommands::Validate { config_file } => handle_config_validate(config_file),
            ConfigCommands::Generate { output, force } => {
                handle_config_generate(output.as_deref(), *force)
            }
        },
    }
}
