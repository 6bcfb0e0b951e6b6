//! rtlog: red team session logger.
//!
//! Records an interactive zsh session (transcript, timing, per-command
//! metadata) and converts the metadata into an evidence-import document.
//!
//! ## Subcommands
//!
//! - `start`: Launch a logged zsh session (blocks until the shell exits)
//! - `stop` / `status`: Inspect or end the active session from another terminal
//! - `import`: Convert `commands.jsonl` into a VECTR JSON document
//! - `help`: Topic guides
//! - `record`: Called by the session shell's precmd hook (hidden)

mod help;
mod import;
mod logging;
mod record;
mod start;
mod stop;

use clap::{Parser, Subcommand};
use rtlog_core::{RtlogError, StorageConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rtlog")]
#[command(about = "Red team session logger")]
#[command(version)]
#[command(disable_help_subcommand = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch a logged zsh session
    Start {
        /// Base directory for session logs (default: ~/.rt_command_logger)
        #[arg(short = 'o', long, value_name = "DIR")]
        outdir: Option<PathBuf>,

        /// Session tag, e.g. a MITRE ATT&CK technique like T1190_Exploit
        #[arg(short = 'n', long, value_name = "NAME")]
        name: Option<String>,

        /// Show session details and informational logs
        #[arg(short = 'v', long)]
        verbose: bool,

        /// Disable ANSI colors in commands.log
        #[arg(long)]
        no_color: bool,
    },

    /// Stop the active session
    Stop {
        /// Also clear a corrupt session record
        #[arg(long)]
        force: bool,
    },

    /// Display active session status
    Status,

    /// Convert commands.jsonl to VECTR JSON
    Import {
        /// Path to commands.jsonl
        #[arg(short = 'i', long, value_name = "FILE")]
        input: PathBuf,

        /// Output path for the VECTR JSON document
        #[arg(short = 'O', long, value_name = "FILE")]
        output: PathBuf,

        /// Custom VECTR template (reserved)
        #[arg(short = 't', long, value_name = "FILE")]
        template: Option<PathBuf>,
    },

    /// Show detailed help for a topic
    Help {
        #[arg(long, value_enum, default_value_t = help::Topic::All)]
        topic: help::Topic,
    },

    /// Record one finished command (called by the session shell's precmd hook)
    #[command(hide = true)]
    Record(record::RecordArgs),
}

fn main() {
    let cli = Cli::parse();

    let storage = StorageConfig::from_env();
    let verbose = matches!(cli.command, Commands::Start { verbose: true, .. });
    let _logging_guard = logging::init(
        storage.as_ref().ok().map(|s| s.debug_log_file()).as_deref(),
        verbose,
    );

    match cli.command {
        Commands::Start {
            outdir,
            name,
            verbose,
            no_color,
        } => {
            let storage = require_storage(storage);
            let args = start::StartArgs {
                outdir,
                name,
                verbose,
                color: !no_color,
            };
            if let Err(e) = start::run(&storage, args) {
                fail("start", e);
            }
        }
        Commands::Stop { force } => {
            if let Err(e) = stop::run_stop(&require_storage(storage), force) {
                fail("stop", e);
            }
        }
        Commands::Status => {
            if let Err(e) = stop::run_status(&require_storage(storage)) {
                fail("status", e);
            }
        }
        Commands::Import {
            input,
            output,
            template,
        } => {
            if let Err(e) = import::run(&input, &output, template.as_deref()) {
                fail("import", e);
            }
        }
        Commands::Help { topic } => help::run(topic),
        Commands::Record(args) => {
            // Recording is best effort: a failure must never break the operator's shell.
            if let Err(e) = record::run(&args) {
                tracing::warn!(error = %e, "rtlog record failed");
            }
        }
    }
}

/// Only the session commands need the storage root; `record`, `import` and
/// `help` run without it.
fn require_storage(storage: Result<StorageConfig, RtlogError>) -> StorageConfig {
    match storage {
        Ok(storage) => storage,
        Err(e) => fail("rtlog", e),
    }
}

fn fail(command: &str, error: RtlogError) -> ! {
    tracing::error!(error = %error, "rtlog {} failed", command);
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_parses_negative_values() {
        let cli = Cli::try_parse_from([
            "rtlog",
            "record",
            "--command=nmap -sV 10.0.0.5",
            "--exit-status",
            "-1",
            "--duration",
            "0.5",
            "--index",
            "3",
        ])
        .unwrap();
        match cli.command {
            Commands::Record(args) => {
                assert_eq!(args.exit_status, -1);
                assert_eq!(args.command, "nmap -sV 10.0.0.5");
            }
            _ => panic!("expected record"),
        }
    }
}
