// Tally CLI - headless two-source reconciliation

mod exit_codes;
mod recon;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use exit_codes::{EXIT_RECON_INVALID_CONFIG, EXIT_RECON_RUNTIME, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Reconcile two datasets field by field")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Log engine progress to stderr (overrides RUST_LOG)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a reconciliation from a TOML config file (exit 0 = all matching, exit 1 = breaks)
    #[command(after_help = "\
Examples:
  tally run invoices.recon.toml
  tally run invoices.recon.toml --json
  tally run invoices.recon.toml --output result.json
  RUST_LOG=tally_recon=debug tally run invoices.recon.toml")]
    Run {
        /// Path to the .recon.toml config file
        config: PathBuf,

        /// Output JSON report to stdout
        #[arg(long)]
        json: bool,

        /// Write JSON report to file
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Propose field mappings between two data files
    #[command(after_help = "\
Examples:
  tally map invoices.csv ledger.json
  tally map invoices.csv ledger.json >> invoices.recon.toml
  tally map invoices.csv ledger.json --json")]
    Map {
        /// Principal data file (.csv, .tsv or .json)
        principal: PathBuf,

        /// Counterparty data file (.csv, .tsv or .json)
        counterparty: PathBuf,

        /// Output JSON instead of TOML [[mappings]] blocks
        #[arg(long)]
        json: bool,
    },

    /// Validate a recon config without running
    #[command(after_help = "\
Examples:
  tally validate invoices.recon.toml")]
    Validate {
        /// Path to the .recon.toml config file
        config: PathBuf,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (",
        env!("GIT_COMMIT_HASH"),
        ")",
        "\nengine:  tally-recon ",
        env!("CARGO_PKG_VERSION"),
    )
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into())
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run { config, json, output } => recon::cmd_run(config, json, output),
        Commands::Map { principal, counterparty, json } => {
            recon::cmd_map(principal, counterparty, json)
        }
        Commands::Validate { config } => recon::cmd_validate(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_RECON_RUNTIME, message: msg.into(), hint: None }
    }

    /// Map an engine error to its exit code.
    pub fn recon(err: tally_recon::ReconError) -> Self {
        use tally_recon::ReconError;

        let code = if err.is_configuration() {
            EXIT_RECON_INVALID_CONFIG
        } else {
            EXIT_RECON_RUNTIME
        };
        let hint = match &err {
            ReconError::NoMappings => {
                Some("add [[mappings]] to the config or check that the sources share field names".to_string())
            }
            ReconError::EmptyData(_) => Some("check that the source file contains data rows".to_string()),
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
