//! End-to-end strategy run.

use cadiz_combine::combine;
use cadiz_eval::{Backtester, IcSummary, PerformanceReport, ReturnSeries, attribute, ic_summary};
use cadiz_portfolio::{AlphaSchedule, PositionHistory, Rebalancer, RiskSchedule, StrategyParams};
use cadiz_process::{PreprocessConfig, Preprocessor};
use cadiz_traits::{FactorPanel, Result};
use serde::Serialize;
use tracing::info;

/// Everything a backtest produces.
#[derive(Debug, Clone)]
pub struct BacktestOutcome {
    /// Reports for `returns`, `benchmark_returns` and `excess_return`.
    pub reports: Vec<PerformanceReport>,
    /// Per-date returns, turnover and leverage.
    pub returns: ReturnSeries,
    /// Target positions, one per trade date.
    pub positions: PositionHistory,
    /// Rank IC of the composite factor.
    pub composite_ic: IcSummary,
}

/// Serializable view of a [`BacktestOutcome`] without the position table.
#[derive(Debug, Serialize)]
pub struct OutcomeSummary<'a> {
    /// Performance reports.
    pub reports: &'a [PerformanceReport],
    /// Composite IC statistics.
    pub composite_ic: &'a IcSummary,
    /// Trade dates whose solve fell back.
    pub fallback_dates: Vec<String>,
}

impl BacktestOutcome {
    /// Summary suitable for JSON output.
    pub fn summary(&self) -> OutcomeSummary<'_> {
        OutcomeSummary {
            reports: &self.reports,
            composite_ic: &self.composite_ic,
            fallback_dates: self
                .positions
                .fallback_dates()
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

/// A configured strategy: preprocessing, synthesis, rebalancing and
/// backtesting under one set of parameters.
#[derive(Debug, Clone)]
pub struct Strategy {
    params: StrategyParams,
}

impl Strategy {
    /// Creates a strategy from validated parameters.
    pub const fn new(params: StrategyParams) -> Self {
        Self { params }
    }

    /// Parameters of this strategy.
    pub const fn params(&self) -> &StrategyParams {
        &self.params
    }

    /// Preprocessing settings derived from the parameters.
    pub fn preprocess_config(&self) -> PreprocessConfig {
        let styles = &self.params.neutralized_styles;
        PreprocessConfig {
            factors: self.params.synthetize.factors.clone(),
            neutralize_industry: !styles.is_empty(),
            neutralized_styles: styles.clone(),
            ..Default::default()
        }
    }

    /// Runs the whole pipeline on `panel`.
    ///
    /// `panel` must carry forward returns (see
    /// [`FactorPanel::with_forward_returns`]). The composite factor is added
    /// to the panel as the column `factor`, which the alpha models may use as
    /// a feature.
    ///
    /// # Errors
    ///
    /// Propagates preprocessing, synthesis, rebalancing and backtest errors.
    /// Failed solves on single dates are not errors.
    pub fn run(
        &self,
        panel: FactorPanel,
        alpha_models: &AlphaSchedule,
        risk_models: Option<&RiskSchedule>,
    ) -> Result<BacktestOutcome> {
        let params = &self.params;
        let processed = Preprocessor::new(self.preprocess_config()).process(panel)?;
        let composite = combine(&processed, &params.synthetize)?;
        let panel = composite.attach(processed)?;

        let positions = Rebalancer::new(params).run(&panel, alpha_models, risk_models)?;
        let returns = Backtester::new(params.transaction_rate).run(&positions, &panel)?;
        let reports = attribute(&returns, params.period);
        let composite_ic = ic_summary(composite.sections());

        if let Some(report) = reports.first() {
            info!(
                annual_return = report.annual_return,
                sharpe = report.sharpe_ratio,
                max_drawdown = report.max_drawdown,
                ic = composite_ic.mean,
                "strategy finished"
            );
        }
        Ok(BacktestOutcome {
            reports,
            returns,
            positions,
            composite_ic,
        })
    }
}
