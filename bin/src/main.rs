//! Cadiz CLI binary.
//!
//! Runs the factor strategy backtest on a CSV panel.

mod cmd;
mod data;

use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::backtest::{BacktestArgs, OutputFormat, run_backtest};
use cmd::params::show_params;

#[derive(Parser)]
#[command(name = "cadiz")]
#[command(about = "Factor-driven portfolio rebalancing and backtests", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest the strategy on a panel
    Backtest {
        /// Panel CSV (trade_date, code, industry_code, closePrice, weight, factors)
        #[arg(short, long)]
        data: PathBuf,

        /// Factor columns to read
        #[arg(short, long, value_delimiter = ',', required = true)]
        factors: Vec<String>,

        /// Parameter overrides (JSON)
        #[arg(short, long)]
        params: Option<PathBuf>,

        /// First trade date to rebalance on (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,

        /// Specific volatility of every code, for the risk-aware methods
        #[arg(long)]
        specific_vol: Option<f64>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the resolved strategy parameters
    Params {
        /// Parameter overrides (JSON)
        #[arg(short, long)]
        params: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cadiz=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Backtest {
            data,
            factors,
            params,
            start,
            specific_vol,
            format,
        } => {
            run_backtest(&BacktestArgs {
                data: &data,
                factors: &factors,
                params: params.as_deref(),
                start: start.as_deref(),
                specific_vol,
                format,
            })?;
        }
        Commands::Params { params } => {
            show_params(params.as_deref())?;
        }
    }

    Ok(())
}
