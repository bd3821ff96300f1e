//! Command-line arguments of the `form-validator` binary.

use crate::config::DEFAULT_CONFIG_PATH;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Validate data access form responses against the identity directory.
#[derive(Parser, Debug)]
#[command(name = "form-validator", version, about)]
pub struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        global = true,
        default_value = DEFAULT_CONFIG_PATH,
        env = "FORM_VALIDATOR_CONFIG"
    )]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Validate every unprocessed response once (default)
    Run {
        /// Compute statuses without writing them or contacting submitters
        #[arg(long)]
        dry_run: bool,

        /// Print the run summary as JSON on stdout
        #[arg(long)]
        json: bool,
    },
    /// Count the sheet's rows per status, without contacting the directory
    Report,
    /// Load and validate the configuration, then print it
    CheckConfig,
}

impl Args {
    /// The subcommand to execute; a bare invocation is a normal run.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run {
            dry_run: false,
            json: false,
        })
    }
}
