use std::env::consts::{ARCH, FAMILY, OS};

use anyhow::Result;
use clap::Parser;
use tracing::{debug, trace};

use crate::gallery::{ConfigManager, Logger};
use crate::program::{Cli, Program};

mod gallery;
mod program;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The configured logger depends on the config, so loading reports to the terminal
    let config = tracing::subscriber::with_default(Logger::bootstrap_subscriber(), || {
        ConfigManager::new(&cli.config_dir)
    })?;
    let logger = Logger::init(&config.app_config().logging)?;
    if let Some(dir) = logger.log_dir() {
        debug!("Writing logs to {}", dir.display());
    }
    log_system_information();

    let program = Program::new(config);
    program.run(cli.command).await
}

/// Logs important information about the system being used.
fn log_system_information() {
    trace!("Printing system information out into log for debug purposes...");
    trace!("ARCH:           \"{}\"", ARCH);
    trace!("FAMILY:         \"{}\"", FAMILY);
    trace!("OS:             \"{}\"", OS);
}
