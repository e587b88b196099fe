//! fido-audit CLI - verify WebAuthn/FIDO2 ceremonies from the command line.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use fido_audit_core::{CeremonyKind, RfuPolicy, Validator, VerifierConfig};
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod utils;

use commands::verify::OutputOptions;
use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Ceremony verified and audit complete
  64  Expectations violate the caller contract
  65  Ceremony rejected
  66  Ceremony file missing or unreadable";

#[derive(Parser)]
#[command(name = "fido-audit")]
#[command(author, version, about = "Audited WebAuthn/FIDO2 ceremony verification", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    options: GlobalOptions,
}

#[derive(Args)]
struct GlobalOptions {
    /// Print a JSON report instead of the summary
    #[arg(long, global = true)]
    json: bool,

    /// Suppress stdout; rely on the exit code
    #[arg(short, long, global = true, conflicts_with = "json")]
    quiet: bool,

    /// Reject authenticator data with reserved flag bits set
    #[arg(long, global = true)]
    reject_rfu: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a registration (attestation) ceremony
    Registration {
        /// Ceremony file with `request` and `expectations` (JSON or CBOR)
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Verify an authentication (assertion) ceremony
    Assertion {
        /// Ceremony file with `request` and `expectations` (JSON or CBOR)
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

fn init_tracing() {
    // Logs go to stderr so --json output stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = VerifierConfig::from_env();
    if cli.options.reject_rfu {
        config = config.with_rfu_policy(RfuPolicy::Reject);
    }
    let validator = Validator::new(config);
    let output = OutputOptions {
        json: cli.options.json,
        quiet: cli.options.quiet,
    };

    match cli.command {
        Commands::Registration { file } => {
            commands::verify::execute(&validator, CeremonyKind::Registration, file, output).await
        }
        Commands::Assertion { file } => {
            commands::verify::execute(&validator, CeremonyKind::Assertion, file, output).await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();

    let code = match run(cli).await {
        Ok(()) => exit_codes::SUCCESS,
        Err(err) => {
            let exit = ExitCode::from_anyhow(&err);
            if let Some(message) = exit.message {
                eprintln!("{} {}", "Error:".red().bold(), message);
            }
            exit.code
        }
    };
    std::process::exit(code);
}
