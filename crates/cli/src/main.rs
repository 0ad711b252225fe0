//! fwlinkctl - fwlink plugin control CLI
//!
//! Checks whether the built-in plugins would be allowed to start on this
//! machine and manages their configuration file.

#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod commands;
mod completion;
mod error;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::ConfigCommands;
use crate::error::CliError;

/// Default configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/fwlink/fwlink.json";

#[derive(Parser)]
#[command(name = "fwlinkctl")]
#[command(about = "fwlink plugin control CLI - kernel safety checks and plugin configuration")]
#[command(version)]
#[command(long_about = "
fwlinkctl inspects the fwlink firmware-update plugins without starting them.

check-kernel runs every built-in plugin's kernel safety check against the
running system and exits with code 3 if any plugin would refuse to start.
Use --json for machine-readable output suitable for scripting.
")]
struct Cli {
    /// Output format (human-readable or JSON)
    #[arg(
        long,
        global = true,
        help = "Output in JSON format for machine parsing"
    )]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Plugin configuration file
    #[arg(
        long,
        global = true,
        env = "FWLINK_CONFIG",
        default_value = DEFAULT_CONFIG_PATH
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every built-in plugin's kernel safety check
    CheckKernel {
        /// Root of the proc filesystem to inspect
        #[arg(long, default_value = "/proc", hide = true)]
        proc_root: PathBuf,
    },

    /// Configuration file commands
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completion for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("fwlinkctl={log_level},fwlink_kernel={log_level},fwlink_plugin={log_level}")
                    .into()
            }),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match execute_command(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                output::print_error_json(&e);
            } else {
                output::print_error_human(&e);
            }

            let exit_code = e
                .downcast_ref::<CliError>()
                .map_or(1, CliError::exit_code);
            ExitCode::from(exit_code)
        }
    }
}

async fn execute_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::CheckKernel { proc_root } => {
            commands::kernel::execute(&cli.config, proc_root, cli.json).await
        }
        Commands::Config(cmd) => commands::config::execute(cmd, &cli.config, cli.json).await,
        Commands::Completion { shell } => {
            completion::generate_completion(*shell);
            Ok(())
        }
    }
}
