use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use timesheet_reconciler::{config, pipeline, EngineConfig, Mode, Period};

/// Reconciles employee timesheet workbooks against the master client/project
/// registry and renders summary, validation or invoice-annex reports.
#[derive(Parser)]
#[command(name = "timesheet-reconciler", version)]
struct Cli {
    /// Directory holding the source workbooks and the registry
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Registry workbook path; defaults to the standard file inside --dir
    #[arg(long)]
    registry: Option<PathBuf>,

    /// Destination directory for artifacts; defaults to --dir
    #[arg(long)]
    out: Option<PathBuf>,

    /// Optional JSON configuration overlay
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Aggregated hour summary (month token or "teljes-ev")
    Summary {
        /// Period; defaults to the full year
        period: Option<String>,
    },
    /// Client/project pair validation report
    Validate {
        /// Period; defaults to the current month
        period: Option<String>,
    },
    /// Per-client invoice annex
    Invoice {
        /// Period; defaults to the current month
        period: Option<String>,
        /// Client codes to include, in order; defaults to the configured list
        codes: Vec<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("cannot load config overlay {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if cli.out.is_some() {
        config.output_dir = cli.out.clone();
    }

    let (mode, period) = match &cli.command {
        Command::Summary { period } => (Mode::Summary, parse_period(period, Period::FullYear)?),
        Command::Validate { period } => (Mode::Validation, parse_period(period, Period::current())?),
        Command::Invoice { period, codes } => {
            if !codes.is_empty() {
                config.invoice_client_codes = codes.clone();
            }
            (Mode::Invoice, parse_period(period, Period::current())?)
        }
    };

    let registry_path = cli
        .registry
        .clone()
        .unwrap_or_else(|| cli.dir.join(config::DEFAULT_REGISTRY_FILE));

    match pipeline::run(mode, period, &cli.dir, &registry_path, &config) {
        Ok(outcome) => {
            if let Some(artifact) = &outcome.artifact {
                println!("✅ Kész: {}", artifact.display());
            }
            if outcome.issue_count > 0 {
                println!("⚠ Hibás sorok: {}", outcome.issue_count);
            }
            for error in &outcome.errors {
                eprintln!("⚠ {error}");
            }
            Ok(())
        }
        Err(err) => {
            // Fatal path: registry unusable or artifact not writable,
            // nothing was reconciled
            bail!("a futás megszakadt: {err}");
        }
    }
}

fn parse_period(raw: &Option<String>, default: Period) -> Result<Period> {
    match raw {
        None => Ok(default),
        Some(raw) => match Period::parse(raw) {
            Some(period) => Ok(period),
            None => bail!("ismeretlen időszak: '{raw}' (érvényes: januar..december, teljes-ev)"),
        },
    }
}
