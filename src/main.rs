use std::sync::Arc;

use clap::Parser;
use color_eyre::Result;
use serial_shell::{
    cli, commands,
    config::Config,
    logging,
    shell::{Shell, ShellExit, ShellOptions},
    transport::{mock::MockConnector, serial::SerialConnector, Connector},
};
use tokio::io::BufReader;
use tracing::{debug, info, Level};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = cli::Cli::parse();

    if let Some(command) = cli.command {
        cli::handle_command(command)?;

        return Ok(());
    }

    logging::init(cli.log_level, cli.log_dir.map(|dir| (Level::DEBUG, dir))).await;

    let config = if let Some(config_path) = cli.config {
        debug!(?config_path, "Config from path");
        Config::new_from_path(config_path)?
    } else {
        debug!("Default config");
        Config::default()
    };

    let connector: Arc<dyn Connector> = if cli.mock {
        info!("Using mock transports");
        Arc::new(MockConnector::default())
    } else {
        Arc::new(SerialConnector::new(
            config.flow_control.into(),
            config.line_codec(),
        ))
    };

    let registry = commands::registry(connector, config.baud_rate)?;

    let mut startup = config.startup.clone();
    if let Some(device) = cli.device {
        startup.insert(0, format!("set {device}"));
    }

    let shell =
        Shell::new(registry, ShellOptions::from_config(&config, cli.json)).with_startup(startup);

    let exit = shell
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await?;

    match exit {
        ShellExit::Quit => info!("Quit"),
        ShellExit::EndOfInput => info!("End of input"),
    }

    logging::shutdown();

    Ok(())
}
