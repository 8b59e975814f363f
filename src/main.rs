//! arps-decline - batch Arps decline fitting from the command line
//!
//! Reads a JSON array of well series, fits every well in parallel and prints
//! the batch report as JSON on stdout. Logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Fit with decline_config.toml (or built-in defaults)
//! arps-decline --input wells.json
//!
//! # Strict validation, 5-year forecast, aggregate type curves
//! arps-decline --input wells.json --strict --forecast-periods 60 --type-curves
//!
//! # Write the default configuration for editing
//! arps-decline init-config --path decline_config.toml
//! ```
//!
//! # Input format
//!
//! ```json
//! [{"well_id": "W-1", "product": "oil", "series": [{"t": 0, "rate": 612.0}, {"t": 1, "rate": 590.4}]}]
//! ```
//!
//! # Environment Variables
//!
//! - `DECLINE_CONFIG`: Path to the TOML configuration
//! - `RUST_LOG`: Logging level (default: info)

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};

use arps_decline::pipeline::TypeCurve;
use arps_decline::{BatchReport, DeclineConfig, DeclinePipeline, Product, StrategyKind, WellSeries};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "arps-decline")]
#[command(about = "Arps decline-curve fitting and fit validation")]
#[command(version)]
struct CliArgs {
    /// Configuration file (default: $DECLINE_CONFIG, then ./decline_config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON array of well series ("-" reads stdin)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Override the fitting strategy
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Treat validation failures as errors
    #[arg(long)]
    strict: bool,

    /// Forecast every fitted well this many periods past its last point
    #[arg(long, value_name = "PERIODS")]
    forecast_periods: Option<f64>,

    /// Forecast step in periods
    #[arg(long, default_value = "1")]
    forecast_step: f64,

    /// Also fit one aggregate type curve per product
    #[arg(long)]
    type_curves: bool,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Write the default configuration as TOML
    InitConfig {
        #[arg(long, default_value = "decline_config.toml")]
        path: PathBuf,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum StrategyArg {
    LeastSquares,
    MonteCarlo,
    DifferentialEvolution,
}

impl From<StrategyArg> for StrategyKind {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::LeastSquares => StrategyKind::LeastSquares,
            StrategyArg::MonteCarlo => StrategyKind::MonteCarlo,
            StrategyArg::DifferentialEvolution => StrategyKind::DifferentialEvolution,
        }
    }
}

// ============================================================================
// Output
// ============================================================================

#[derive(Serialize)]
struct CliReport<'a> {
    #[serde(flatten)]
    batch: &'a BatchReport,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    type_curves: Vec<TypeCurve>,
}

// ============================================================================
// Helpers
// ============================================================================

fn load_config(args: &CliArgs) -> Result<DeclineConfig> {
    let mut config = match &args.config {
        Some(path) => DeclineConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => DeclineConfig::load(),
    };

    if let Some(strategy) = args.strategy {
        config.fitting.strategy = strategy.into();
    }
    if args.strict {
        config.validation.strict = true;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn read_wells(path: &Path) -> Result<Vec<WellSeries>> {
    let mut raw = String::new();
    if path == Path::new("-") {
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("Failed to read wells from stdin")?;
    } else {
        raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
    }
    serde_json::from_str(&raw).context("Invalid well series JSON")
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();

    if let Some(SubCommand::InitConfig { path }) = &args.command {
        DeclineConfig::default().save_to_file(path)?;
        info!(path = %path.display(), "Default configuration written");
        return Ok(());
    }

    let Some(input) = &args.input else {
        bail!("--input is required (use \"-\" for stdin)");
    };

    let config = load_config(&args)?;
    let wells = read_wells(input)?;
    info!(
        wells = wells.len(),
        strategy = %config.fitting.strategy,
        strict = config.validation.strict,
        "Loaded well series"
    );

    let mut pipeline = DeclinePipeline::new(&config);
    if let Some(horizon) = args.forecast_periods {
        pipeline = pipeline.with_forecast(horizon, args.forecast_step);
    }

    let batch = pipeline.run_batch(&wells);
    info!("{}", batch.summary);

    let mut type_curves = Vec::new();
    if args.type_curves {
        for product in Product::ALL {
            if !wells.iter().any(|w| w.product == product) {
                continue;
            }
            match pipeline.fit_type_curve(&wells, product) {
                Ok(curve) => type_curves.push(curve),
                Err(e) => warn!(product = %product, error = %e, "Type curve not fitted"),
            }
        }
    }

    let report = CliReport {
        batch: &batch,
        type_curves,
    };
    let json = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };

    match &args.output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}
