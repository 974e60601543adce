//! vhid - drive the LGHUB virtual keyboard and mouse from the command line
//!
//! Every device command opens the bus, creates (or adopts) the devices, runs,
//! and tears everything down again before exiting.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use cli::{Cli, Commands};
use logi_vhid::{Session, VhidConfig};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(VhidConfig::default_path);
    info!("Loading config from {:?}", config_path);
    let config = VhidConfig::load(&config_path)?;

    let (transport, recorder) = commands::open_transport(cli.dry_run);

    match &cli.command {
        Commands::Probe => commands::probe(&config, &transport),
        Commands::Config { write } => commands::show_config(&config, &config_path, *write)?,
        Commands::Destroy { all } => {
            let mut session = Session::new(transport, &config);
            let result = commands::destroy_leftovers(&mut session, *all);
            if let Some(recorder) = &recorder {
                commands::print_traffic(recorder);
            }
            result?;
        }
        command => {
            let mut session = Session::new(transport, &config);
            let result = commands::run_device_command(&mut session, command);
            if let Some(recorder) = &recorder {
                commands::print_traffic(recorder);
            }
            result?;
        }
    }
    Ok(())
}
