//! Per-date factor statistics used to weight factors.

use cadiz_traits::stats::rank_ic;
use cadiz_traits::Date;
use derive_more::Display;
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Per-date statistic tracked for every factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Statistic {
    /// Rank information coefficient against the forward return.
    #[display("ic")]
    Ic,
    /// Return of the single-factor portfolio `f·r / f·f`.
    #[display("ret")]
    Return,
}

/// Return of the portfolio holding `factor` as weights, scaled by its norm.
///
/// Only rows where both sides are finite are used. `NaN` when the factor is
/// zero on every such row.
pub fn factor_return(factor: ArrayView1<'_, f64>, forward: ArrayView1<'_, f64>) -> f64 {
    let (mut fr, mut ff) = (0.0, 0.0);
    for (&f, &r) in factor.iter().zip(forward.iter()) {
        if f.is_finite() && r.is_finite() {
            fr += f * r;
            ff += f * f;
        }
    }
    if ff == 0.0 { f64::NAN } else { fr / ff }
}

/// IC and factor return of every factor on every trade date.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorHistory {
    dates: Vec<Date>,
    factor_names: Vec<String>,
    ic: Array2<f64>,
    ret: Array2<f64>,
}

impl FactorHistory {
    /// Computes the history from per-date exposures and forward returns.
    ///
    /// `exposures[t]` has one row per code and one column per factor and
    /// `forwards[t]` the matching forward returns.
    pub fn compute(
        factor_names: Vec<String>,
        dates: Vec<Date>,
        exposures: &[Array2<f64>],
        forwards: &[Array1<f64>],
    ) -> Self {
        let k = factor_names.len();
        let mut ic = Array2::from_elem((dates.len(), k), f64::NAN);
        let mut ret = Array2::from_elem((dates.len(), k), f64::NAN);
        for (t, (x, r)) in exposures.iter().zip(forwards).enumerate() {
            for j in 0..k.min(x.ncols()) {
                ic[[t, j]] = rank_ic(x.column(j), r.view());
                ret[[t, j]] = factor_return(x.column(j), r.view());
            }
        }
        Self {
            dates,
            factor_names,
            ic,
            ret,
        }
    }

    /// Trade dates, one row of the statistic matrices each.
    pub fn dates(&self) -> &[Date] {
        &self.dates
    }

    /// Factor names, one column of the statistic matrices each.
    pub fn factor_names(&self) -> &[String] {
        &self.factor_names
    }

    /// Matrix of the given statistic, dates × factors.
    pub const fn values(&self, statistic: Statistic) -> &Array2<f64> {
        match statistic {
            Statistic::Ic => &self.ic,
            Statistic::Return => &self.ret,
        }
    }

    /// Trailing mean of `statistic` over the `span` dates strictly before
    /// `date_index`.
    ///
    /// With `half_life`, an observation `a` dates older than the most recent
    /// one is weighted by `0.5^(a / half_life)`. Non-finite observations are
    /// skipped; a factor without any observation gets 0.0. Returns `None` when
    /// no factor has an observation in the window.
    pub fn trailing_mean(
        &self,
        statistic: Statistic,
        date_index: usize,
        span: usize,
        half_life: Option<f64>,
    ) -> Option<Array1<f64>> {
        let values = self.values(statistic);
        let end = date_index.min(values.nrows());
        let start = end.saturating_sub(span);
        let mut any = false;

        let means = (0..values.ncols())
            .map(|j| {
                let mut total_weight = 0.0;
                let mut weighted_sum = 0.0;
                for t in start..end {
                    let v = values[[t, j]];
                    if !v.is_finite() {
                        continue;
                    }
                    let age = (end - 1 - t) as f64;
                    let weight = half_life.map_or(1.0, |h| 0.5_f64.powf(age / h));
                    weighted_sum += v * weight;
                    total_weight += weight;
                }
                if total_weight > 0.0 {
                    any = true;
                    weighted_sum / total_weight
                } else {
                    0.0
                }
            })
            .collect();
        any.then_some(means)
    }
}
