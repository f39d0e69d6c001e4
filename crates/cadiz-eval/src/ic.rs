//! Information coefficient of the composite factor.

use cadiz_combine::CompositeSection;
use cadiz_traits::Date;
use cadiz_traits::stats::rank_ic;
use serde::{Deserialize, Serialize};

/// Per-date rank IC of a factor with its information ratio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IcSummary {
    /// Trade dates.
    pub dates: Vec<Date>,
    /// Rank IC per date, `NaN` where fewer than two pairs are finite.
    pub ic: Vec<f64>,
    /// Mean of the finite ICs.
    pub mean: f64,
    /// Sample standard deviation of the finite ICs.
    pub std: f64,
    /// `mean / std`.
    pub ir: f64,
    /// Number of finite ICs.
    pub n_obs: usize,
}

/// Rank IC of the composite factor against the next-period return.
pub fn ic_summary(sections: &[CompositeSection]) -> IcSummary {
    let dates = sections.iter().map(|s| s.trade_date).collect();
    let ic: Vec<f64> = sections
        .iter()
        .map(|s| rank_ic(s.factor.view(), s.nxt1_ret.view()))
        .collect();

    let valid: Vec<f64> = ic.iter().copied().filter(|x| x.is_finite()).collect();
    let n_obs = valid.len();
    let (mean, std) = if n_obs == 0 {
        (f64::NAN, f64::NAN)
    } else {
        let mean = valid.iter().sum::<f64>() / n_obs as f64;
        let std = if n_obs < 2 {
            f64::NAN
        } else {
            (valid.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n_obs - 1) as f64).sqrt()
        };
        (mean, std)
    };
    let ir = if std > 0.0 { mean / std } else { f64::NAN };

    IcSummary {
        dates,
        ic,
        mean,
        std,
        ir,
        n_obs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{Array1, array};

    fn section(day: u32, factor: Array1<f64>, nxt1_ret: Array1<f64>) -> CompositeSection {
        let n = factor.len();
        CompositeSection {
            trade_date: Date::from_ymd_opt(2020, 1, day).unwrap(),
            codes: (0..n).map(|i| format!("C{i}")).collect(),
            factor,
            nxt1_ret,
            weights: array![1.0],
        }
    }

    #[test]
    fn test_summary_of_perfect_and_inverse_days() {
        let sections = vec![
            section(2, array![1.0, 2.0, 3.0], array![0.01, 0.02, 0.03]),
            section(3, array![1.0, 2.0, 3.0], array![0.03, 0.02, 0.01]),
            section(6, array![1.0, 2.0, 3.0], array![0.01, 0.03, 0.02]),
            section(7, array![1.0, 2.0, 3.0], ndarray::Array1::from_elem(3, f64::NAN)),
        ];
        let summary = ic_summary(&sections);

        assert_eq!(summary.dates.len(), 4);
        assert_relative_eq!(summary.ic[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(summary.ic[1], -1.0, epsilon = 1e-12);
        assert_relative_eq!(summary.ic[2], 0.5, epsilon = 1e-12);
        assert!(summary.ic[3].is_nan());
        assert_eq!(summary.n_obs, 3);
        assert_relative_eq!(summary.mean, 0.5 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(summary.ir, summary.mean / summary.std, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_summary() {
        let summary = ic_summary(&[]);
        assert_eq!(summary.n_obs, 0);
        assert!(summary.mean.is_nan());
        assert!(summary.ir.is_nan());
    }
}
