//! Command-line interface for ensign.
//!
//! This module provides the CLI structure for the `ensign` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::logging::Verbosity;

pub use commands::{
    ConfigCommand, CreateCommand, ListCommand, ServeCommand, ShowCommand, StatusCommand,
    ToggleCommand,
};

/// ensign - Feature flags with usage tracking
///
/// Stores named on/off switches in a shared database, records when each one
/// was last read and serves them over HTTP.
#[derive(Debug, Parser)]
#[command(name = "ensign")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP flag API
    Serve(ServeCommand),

    /// Create a new flag
    Create(CreateCommand),

    /// List every flag
    List(ListCommand),

    /// Show one flag (counts as a use)
    Show(ShowCommand),

    /// Turn a flag on
    Set(ToggleCommand),

    /// Turn a flag off
    Unset(ToggleCommand),

    /// Show database status
    Status(StatusCommand),

    /// View configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::Trace,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn status_cli(verbose: u8, quiet: bool) -> Cli {
        Cli {
            config: None,
            verbose,
            quiet,
            command: Command::Status(StatusCommand { json: false }),
        }
    }

    #[test]
    fn test_cli_name() {
        assert_eq!(Cli::command().get_name(), "ensign");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity() {
        assert_eq!(status_cli(0, true).verbosity(), Verbosity::Quiet);
        assert_eq!(status_cli(0, false).verbosity(), Verbosity::Normal);
        assert_eq!(status_cli(1, false).verbosity(), Verbosity::Verbose);
        assert_eq!(status_cli(3, false).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_quiet_wins_over_verbose() {
        assert_eq!(status_cli(2, true).verbosity(), Verbosity::Quiet);
    }

    #[test]
    fn test_parse_serve() {
        let cli = Cli::try_parse_from(["ensign", "serve", "--port", "8080"]).unwrap();
        match cli.command {
            Command::Serve(cmd) => {
                assert_eq!(cmd.port, Some(8080));
                assert!(cmd.bind.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_create() {
        let cli = Cli::try_parse_from([
            "ensign",
            "create",
            "new_checkout",
            "--label",
            "New checkout",
            "-t",
            "checkout,beta",
        ])
        .unwrap();
        match cli.command {
            Command::Create(cmd) => {
                assert_eq!(cmd.name, "new_checkout");
                assert_eq!(cmd.label.as_deref(), Some("New checkout"));
                assert!(cmd.description.is_none());
                assert_eq!(cmd.tags.as_deref(), Some("checkout,beta"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_create_requires_name() {
        assert!(Cli::try_parse_from(["ensign", "create"]).is_err());
    }

    #[test]
    fn test_parse_show_json() {
        let cli = Cli::try_parse_from(["ensign", "show", "flag0", "--json"]).unwrap();
        match cli.command {
            Command::Show(cmd) => {
                assert_eq!(cmd.name, "flag0");
                assert!(cmd.json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_set_and_unset() {
        let cli = Cli::try_parse_from(["ensign", "set", "flag0"]).unwrap();
        assert!(matches!(cli.command, Command::Set(ref cmd) if cmd.name == "flag0"));

        let cli = Cli::try_parse_from(["ensign", "unset", "flag0"]).unwrap();
        assert!(matches!(cli.command, Command::Unset(ref cmd) if cmd.name == "flag0"));
    }

    #[test]
    fn test_parse_config_validate() {
        let cli =
            Cli::try_parse_from(["ensign", "config", "validate", "--file", "/tmp/c.toml"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Config(ConfigCommand::Validate { file: Some(_) })
        ));
    }

    #[test]
    fn test_parse_with_config() {
        let cli = Cli::try_parse_from(["ensign", "-c", "/custom/config.toml", "list"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["ensign", "list", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }
}
