//! Backtest command implementation.

use std::path::Path;

use anyhow::{Result, bail};
use cadiz::portfolio::RiskSchedule;
use cadiz::traits::types::parse_date;
use cadiz::{AlphaModel, BacktestOutcome, ConstLinearModel, ModelSchedule, Strategy};
use clap::ValueEnum;
use ndarray::array;
use tracing::info;

use crate::data;

/// Output format of the backtest command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Human-readable tables.
    Text,
    /// Reports and IC summary as JSON.
    Json,
}

/// Options of the backtest command.
#[derive(Debug)]
pub(crate) struct BacktestArgs<'a> {
    pub(crate) data: &'a Path,
    pub(crate) factors: &'a [String],
    pub(crate) params: Option<&'a Path>,
    pub(crate) start: Option<&'a str>,
    pub(crate) specific_vol: Option<f64>,
    pub(crate) format: OutputFormat,
}

/// Run the full strategy on a CSV panel and print the attribution.
pub(crate) fn run_backtest(args: &BacktestArgs<'_>) -> Result<()> {
    let mut params = data::resolve_params(args.params)?;
    if let Some(start) = args.start {
        params.start_date = Some(parse_date(start)?);
    }

    let panel = data::load_panel(args.data, args.factors)?;
    info!(
        dates = panel.len(),
        rows = panel.n_rows(),
        factors = ?panel.factor_names(),
        "loaded panel"
    );

    let risk_models: Option<RiskSchedule> = match args.specific_vol {
        Some(vol) => Some(ModelSchedule::constant(data::specific_risk_model(&panel, vol)?)),
        None if params.rebalance_method.needs_risk() => bail!(
            "rebalance method '{}' needs a risk model, pass --specific-vol",
            params.rebalance_method
        ),
        None => None,
    };

    let alpha = ConstLinearModel::new(vec!["factor".to_string()], array![1.0])?;
    let alpha_models = ModelSchedule::constant(Box::new(alpha) as Box<dyn AlphaModel>);

    let outcome = Strategy::new(params).run(panel, &alpha_models, risk_models.as_ref())?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome.summary())?),
        OutputFormat::Text => print_text(&outcome),
    }
    Ok(())
}

fn print_text(outcome: &BacktestOutcome) {
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("BACKTEST RESULTS");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");

    println!(
        "{:<20} {:>10} {:>10} {:>8} {:>10} {:>10} {:>8}",
        "Series", "Annual", "Vol", "Sharpe", "Downside", "Max DD", "Calmar"
    );
    for report in &outcome.reports {
        println!(
            "{:<20} {:>9.2}% {:>9.2}% {:>8.2} {:>9.2}% {:>9.2}% {:>8.2}",
            report.name,
            report.annual_return * 100.0,
            report.annual_volatility * 100.0,
            report.sharpe_ratio,
            report.downside_risk * 100.0,
            report.max_drawdown * 100.0,
            report.calmar_ratio,
        );
    }
    println!();

    if let Some(turn_over) = outcome.reports.first().and_then(|r| r.turn_over) {
        println!("Trading Metrics:");
        println!("  Avg Turnover:      {:>10.2}%", turn_over * 100.0);
        println!("  Trade Dates:       {:>10}", outcome.returns.len());
        println!();
    }

    let ic = &outcome.composite_ic;
    println!("Composite Factor:");
    println!("  Average IC:        {:>10.4}", ic.mean);
    println!("  IC Std Dev:        {:>10.4}", ic.std);
    println!("  IC Info Ratio:     {:>10.4}", ic.ir);
    println!();

    let fallbacks = outcome.positions.fallback_dates();
    if !fallbacks.is_empty() {
        println!("Solve fallbacks on {} dates:", fallbacks.len());
        for date in fallbacks {
            println!("  {date}");
        }
    }
}
