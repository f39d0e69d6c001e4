//! Performance attribution.
//!
//! The statistics follow the `empyrical` conventions: returns are compounded
//! as simple returns, volatility uses the sample standard deviation and the
//! maximum drawdown is reported as a non-positive number. Non-finite
//! observations are skipped.

use cadiz_traits::Period;
use serde::{Deserialize, Serialize};

use crate::backtest::ReturnSeries;

fn finite(returns: &[f64]) -> Vec<f64> {
    returns.iter().copied().filter(|r| r.is_finite()).collect()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Compound annual growth rate `(Π(1 + r))^{1/years} − 1`.
pub fn annual_return(returns: &[f64], period: Period) -> f64 {
    let r = finite(returns);
    if r.is_empty() {
        return f64::NAN;
    }
    let years = r.len() as f64 / period.annualization();
    let ending: f64 = r.iter().map(|x| 1.0 + x).product();
    ending.powf(1.0 / years) - 1.0
}

/// Annualized sample standard deviation.
pub fn annual_volatility(returns: &[f64], period: Period) -> f64 {
    sample_std(&finite(returns)) * period.annualization().sqrt()
}

/// Annualized Sharpe ratio with a zero risk-free rate.
pub fn sharpe_ratio(returns: &[f64], period: Period) -> f64 {
    let r = finite(returns);
    mean(&r) / sample_std(&r) * period.annualization().sqrt()
}

/// Annualized root mean square of the negative returns.
pub fn downside_risk(returns: &[f64], period: Period) -> f64 {
    let r = finite(returns);
    if r.is_empty() {
        return f64::NAN;
    }
    let below: Vec<f64> = r.iter().map(|x| x.min(0.0).powi(2)).collect();
    mean(&below).sqrt() * period.annualization().sqrt()
}

/// Largest peak-to-trough loss of the compounded wealth, `≤ 0`.
///
/// The starting wealth counts as a peak, so a first-period loss is a
/// drawdown.
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let r = finite(returns);
    if r.is_empty() {
        return f64::NAN;
    }
    let mut wealth = 1.0;
    let mut peak = 1.0_f64;
    let mut worst = 0.0_f64;
    for x in r {
        wealth *= 1.0 + x;
        peak = peak.max(wealth);
        worst = worst.min(wealth / peak - 1.0);
    }
    worst
}

/// `−annual_return / max_drawdown`.
///
/// Not guarded: a series without drawdown gives an infinite or `NaN` ratio.
pub fn calmar_ratio(returns: &[f64], period: Period) -> f64 {
    -annual_return(returns, period) / max_drawdown(returns)
}

/// Summary statistics of one return stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    /// Stream name.
    pub name: String,
    /// Annualized return.
    pub annual_return: f64,
    /// Annualized volatility.
    pub annual_volatility: f64,
    /// Compound annual growth rate.
    pub cagr: f64,
    /// Sharpe ratio.
    pub sharpe_ratio: f64,
    /// Downside risk.
    pub downside_risk: f64,
    /// Maximum drawdown (non-positive).
    pub max_drawdown: f64,
    /// Calmar ratio.
    pub calmar_ratio: f64,
    /// Mean turnover, reported for the strategy stream only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_over: Option<f64>,
}

impl PerformanceReport {
    /// Computes every statistic of `returns`.
    pub fn from_returns(name: impl Into<String>, returns: &[f64], period: Period) -> Self {
        let annual = annual_return(returns, period);
        Self {
            name: name.into(),
            annual_return: annual,
            annual_volatility: annual_volatility(returns, period),
            cagr: annual,
            sharpe_ratio: sharpe_ratio(returns, period),
            downside_risk: downside_risk(returns, period),
            max_drawdown: max_drawdown(returns),
            calmar_ratio: calmar_ratio(returns, period),
            turn_over: None,
        }
    }

    /// Attaches the mean turnover.
    pub const fn with_turn_over(mut self, turn_over: f64) -> Self {
        self.turn_over = Some(turn_over);
        self
    }
}

/// Reports for the strategy, the benchmark and the excess return.
pub fn attribute(series: &ReturnSeries, period: Period) -> Vec<PerformanceReport> {
    vec![
        PerformanceReport::from_returns("returns", &series.returns, period)
            .with_turn_over(series.mean_turn_over()),
        PerformanceReport::from_returns("benchmark_returns", &series.benchmark_returns, period),
        PerformanceReport::from_returns("excess_return", &series.excess_return, period),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_annual_return_compounds() {
        let returns = vec![0.01; 252];
        assert_relative_eq!(
            annual_return(&returns, Period::Daily),
            1.01f64.powi(252) - 1.0,
            epsilon = 1e-9
        );
        assert_relative_eq!(annual_return(&[0.1, 0.1], Period::Yearly), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_volatility_and_sharpe() {
        let returns = [0.01, -0.01, 0.02, 0.0];
        let std = sample_std(&returns);
        assert_relative_eq!(annual_volatility(&returns, Period::Monthly), std * 12f64.sqrt());
        assert_relative_eq!(
            sharpe_ratio(&returns, Period::Monthly),
            0.005 / std * 12f64.sqrt(),
            epsilon = 1e-12
        );
        assert!(sharpe_ratio(&[0.01], Period::Daily).is_nan());
    }

    #[test]
    fn test_downside_risk_ignores_gains() {
        let risk = downside_risk(&[0.02, -0.02, 0.03, -0.04], Period::Yearly);
        assert_relative_eq!(risk, ((0.0004 + 0.0016) / 4.0f64).sqrt(), epsilon = 1e-12);
        assert_eq!(downside_risk(&[0.01, 0.02], Period::Daily), 0.0);
    }

    #[test]
    fn test_max_drawdown_is_not_positive() {
        let dd = max_drawdown(&[0.1, -0.5, 0.2]);
        assert_relative_eq!(dd, -0.5, epsilon = 1e-12);
        assert_relative_eq!(max_drawdown(&[-0.1, 0.05]), -0.1, epsilon = 1e-12);
        assert_eq!(max_drawdown(&[0.01, 0.02]), 0.0);
    }

    #[test]
    fn test_calmar_sign_convention() {
        let returns = [0.05, -0.02, 0.03, -0.01, 0.04];
        let dd = max_drawdown(&returns);
        assert!(dd < 0.0);
        let calmar = calmar_ratio(&returns, Period::Yearly);
        assert!(calmar > 0.0);
        assert_relative_eq!(calmar, annual_return(&returns, Period::Yearly) / dd.abs());

        // No drawdown leaves the ratio unguarded.
        assert!(calmar_ratio(&[0.01, 0.02], Period::Daily).is_infinite());
    }

    #[test]
    fn test_non_finite_observations_are_skipped() {
        let with_nan = [0.01, f64::NAN, -0.02, 0.03];
        let clean = [0.01, -0.02, 0.03];
        let a = PerformanceReport::from_returns("returns", &with_nan, Period::Daily);
        let b = PerformanceReport::from_returns("returns", &clean, Period::Daily);
        assert_eq!(a, b);
    }

    #[test]
    fn test_turn_over_only_on_strategy_report() {
        let series = ReturnSeries {
            dates: Vec::new(),
            returns: vec![0.01, -0.01, 0.02],
            benchmark_returns: vec![0.0, 0.01, 0.01],
            turn_over: vec![1.0, 0.2, 0.0],
            leverage: vec![1.0; 3],
            excess_return: vec![0.01, -0.02, 0.01],
        };
        let reports = attribute(&series, Period::Daily);
        assert_eq!(reports.len(), 3);
        assert_relative_eq!(reports[0].turn_over.unwrap(), 0.4, epsilon = 1e-12);
        assert!(reports[1].turn_over.is_none());
        assert!(reports[2].turn_over.is_none());

        let json = serde_json::to_value(&reports[1]).unwrap();
        assert!(json.get("turn_over").is_none());
        assert_eq!(json["name"], "benchmark_returns");
    }
}
