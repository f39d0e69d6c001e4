#![doc(issue_tracker_base_url = "https://github.com/factordynamics/cadiz/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Backtesting and performance attribution for cadiz.
//!
//! This crate executes a position history with a naive executor, computes
//! turnover-adjusted log returns for the strategy and its benchmark and
//! summarizes them as performance reports:
//! - [`Backtester`] and [`ReturnSeries`] for the per-date loop
//! - [`PerformanceReport`] and [`attribute`] for the statistics
//! - [`ic_summary`] for the information coefficient of the composite factor
//!
//! # Example
//!
//! ```rust,no_run
//! use cadiz_eval::{Backtester, attribute};
//! use cadiz_traits::Period;
//! # fn run(
//! #     positions: &cadiz_portfolio::PositionHistory,
//! #     panel: &cadiz_traits::FactorPanel,
//! # ) -> cadiz_traits::Result<()> {
//! let series = Backtester::new(0.0003).run(positions, panel)?;
//! for report in attribute(&series, Period::Daily) {
//!     println!("{}: sharpe {:.2}", report.name, report.sharpe_ratio);
//! }
//! # Ok(())
//! # }
//! ```

mod backtest;
mod executor;
mod ic;
mod metrics;

// Re-export main types
pub use backtest::{Backtester, ReturnSeries, position_return};
pub use executor::NaiveExecutor;
pub use ic::{IcSummary, ic_summary};
pub use metrics::{
    PerformanceReport, annual_return, annual_volatility, attribute, calmar_ratio, downside_risk,
    max_drawdown, sharpe_ratio,
};
