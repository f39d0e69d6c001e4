//! Date-by-date backtest of a position history.
//!
//! Every position is executed by a [`NaiveExecutor`], held over the next
//! period and charged a flat per-asset cost proportional to turnover. The
//! benchmark is charged the same cost so that the excess return isolates
//! the alpha.

use std::collections::HashMap;

use cadiz_portfolio::PositionHistory;
use cadiz_traits::panel::TRADE_DATE;
use cadiz_traits::types::DATE_FORMAT;
use cadiz_traits::{CadizError, Date, FactorPanel, Result};
use ndarray::Array1;
use polars::prelude::*;
use tracing::{debug, info};

use crate::executor::NaiveExecutor;

/// Log return of holding `weights` over one period, net of costs.
///
/// Computes `ln(1 + w·(e^{r} − 1) − n_codes × rate × turn_over)` where `r`
/// is the log forward return. Assets whose forward return is not finite
/// contribute nothing; if no asset has a finite forward return the result
/// is `NaN`.
pub fn position_return(weights: &Array1<f64>, nxt1_ret: &Array1<f64>, rate: f64, turn_over: f64) -> f64 {
    let mut gross = 0.0;
    let mut any = false;
    for (w, r) in weights.iter().zip(nxt1_ret.iter()) {
        if r.is_finite() {
            gross += w * r.exp_m1();
            any = true;
        }
    }
    if !any {
        return f64::NAN;
    }
    let cost = weights.len() as f64 * rate * turn_over;
    (gross - cost).ln_1p()
}

/// Per-date aggregates of a backtest, in chronological order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReturnSeries {
    /// Trade dates.
    pub dates: Vec<Date>,
    /// Strategy log returns.
    pub returns: Vec<f64>,
    /// Benchmark log returns.
    pub benchmark_returns: Vec<f64>,
    /// Turnover paid on each date.
    pub turn_over: Vec<f64>,
    /// Gross exposure of the executed position.
    pub leverage: Vec<f64>,
    /// `returns − benchmark_returns × leverage`.
    pub excess_return: Vec<f64>,
}

impl ReturnSeries {
    /// Number of dates.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Returns whether the series has no dates.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Mean turnover over the dates.
    pub fn mean_turn_over(&self) -> f64 {
        if self.turn_over.is_empty() {
            return f64::NAN;
        }
        self.turn_over.iter().sum::<f64>() / self.turn_over.len() as f64
    }

    /// `DataFrame` with one row per trade date.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let dates: Vec<String> = self
            .dates
            .iter()
            .map(|d| d.format(DATE_FORMAT).to_string())
            .collect();
        Ok(DataFrame::new(vec![
            Column::new(TRADE_DATE.into(), dates),
            Column::new("returns".into(), self.returns.clone()),
            Column::new("benchmark_returns".into(), self.benchmark_returns.clone()),
            Column::new("turn_over".into(), self.turn_over.clone()),
            Column::new("leverage".into(), self.leverage.clone()),
            Column::new("excess_return".into(), self.excess_return.clone()),
        ])?)
    }

    fn push(&mut self, date: Date, returns: f64, benchmark: f64, turn_over: f64, leverage: f64) {
        self.dates.push(date);
        self.returns.push(returns);
        self.benchmark_returns.push(benchmark);
        self.turn_over.push(turn_over);
        self.leverage.push(leverage);
    }

    fn finish(mut self) -> Self {
        self.excess_return = self
            .returns
            .iter()
            .zip(&self.benchmark_returns)
            .zip(&self.leverage)
            .map(|((r, b), l)| r - b * l)
            .collect();
        self
    }
}

/// Runs positions against the forward returns of a panel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backtester {
    rate: f64,
}

impl Backtester {
    /// Creates a backtester charging `transaction_rate` per asset and unit
    /// of turnover.
    pub const fn new(transaction_rate: f64) -> Self {
        Self {
            rate: transaction_rate,
        }
    }

    /// Transaction rate.
    pub const fn rate(&self) -> f64 {
        self.rate
    }

    /// Executes every position in order and records its returns.
    ///
    /// # Errors
    ///
    /// Returns [`CadizError::InvalidData`] if a position's trade date has no
    /// cross-section in `panel`.
    pub fn run(&self, positions: &PositionHistory, panel: &FactorPanel) -> Result<ReturnSeries> {
        let mut executor = NaiveExecutor::new();
        let mut series = ReturnSeries::default();

        for position in positions {
            let date = position.trade_date;
            let section = panel.section(date).ok_or_else(|| {
                CadizError::InvalidData(format!("no cross-section for position on {date}"))
            })?;
            let forward: HashMap<&str, f64> = section
                .codes
                .iter()
                .map(String::as_str)
                .zip(section.nxt1_ret.iter().copied())
                .collect();
            let nxt1_ret: Array1<f64> = position
                .codes
                .iter()
                .map(|c| forward.get(c.as_str()).copied().unwrap_or(f64::NAN))
                .collect();

            let (turn_over, executed) = executor.execute(position);
            let leverage = executed.iter().map(|w| w.abs()).sum::<f64>();
            let ret = position_return(&executed, &nxt1_ret, self.rate, turn_over);
            let b_ret = position_return(&position.benchmark, &nxt1_ret, self.rate, turn_over);
            executor.set_current(&position.codes, &executed);

            debug!(trade_date = %date, ret, b_ret, turn_over, leverage, "executed");
            series.push(date, ret, b_ret, turn_over, leverage);
        }

        let series = series.finish();
        info!(
            dates = series.len(),
            mean_turn_over = series.mean_turn_over(),
            "backtest finished"
        );
        Ok(series)
    }
}
