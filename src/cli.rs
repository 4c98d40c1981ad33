use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::Level;

use crate::{config::Config, response::CommandResponse};

/// The command line interface for serial shell.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to a configuration file
    pub config: Option<PathBuf>,

    /// Device to `set` before anything else, e.g. /dev/ttyACM0 or COM3
    #[arg(short, long)]
    pub device: Option<String>,

    /// Use in-memory loopback transports instead of serial ports
    #[arg(long)]
    pub mock: bool,

    /// Print each response as a line of JSON
    #[arg(long)]
    pub json: bool,

    /// Level of logs written to stderr
    #[arg(long, default_value_t = Level::WARN)]
    pub log_level: Level,

    /// Also write logs (at debug level) to a daily rolling file in this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Commands available in the command line interface.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Examples for user convenience.
    #[clap(subcommand)]
    Examples(Examples),
}

/// Helpful examples for users.
#[derive(Subcommand, Debug, Clone)]
pub enum Examples {
    /// Show an example of a configuration file's contents.
    Config,

    /// Show an example JSON response, as printed with `--json`.
    Response,
}

/// The text printed for an example.
pub fn example(example: Examples) -> Result<String, crate::error::Error> {
    match example {
        Examples::Config => Config::example().serialize_pretty(),
        Examples::Response => Ok(serde_json::to_string_pretty(&CommandResponse::example())
            .map_err(std::io::Error::from)?),
    }
}

/// Handle a subcommand by printing to stdout.
pub fn handle_command(command: Commands) -> Result<(), crate::error::Error> {
    match command {
        Commands::Examples(e) => println!("{}", example(e)?),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_flags() {
        let cli = Cli::try_parse_from([
            "serial-shell",
            "shell.ron",
            "--device",
            "/dev/ttyUSB0",
            "--json",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("shell.ron")));
        assert_eq!(cli.device.as_deref(), Some("/dev/ttyUSB0"));
        assert!(cli.json);
        assert!(!cli.mock);
        assert_eq!(cli.log_level, Level::DEBUG);
    }

    #[test]
    fn example_response_is_json() {
        let text = example(Examples::Response).unwrap();
        let response: CommandResponse = serde_json::from_str(&text).unwrap();

        assert_eq!(response, CommandResponse::example());
    }

    #[test]
    fn example_config_parses() {
        let text = example(Examples::Config).unwrap();

        assert_eq!(Config::deserialize(&text).unwrap(), Config::example());
    }
}
