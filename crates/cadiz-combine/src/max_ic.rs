//! Maximum-IC factor combination.
//!
//! Weights maximize the IC ratio `wᵀμ / √(wᵀVw)`, where `μ` is the trailing
//! mean IC of every factor and `V` the covariance of the factors on the
//! current cross-section. The unconstrained optimum is `V⁻¹μ`; with a weight
//! limit, weights are kept non-negative.

use cadiz_traits::stats::{ledoit_wolf, sample_covariance, to_dmatrix};
use cadiz_traits::Result;
use nalgebra::DVector;
use ndarray::{Array1, Array2, Axis};
use tracing::warn;

use crate::combiner::{CombineContext, Combiner, equal_weights};
use crate::history::Statistic;

const MAX_SWEEPS: usize = 1_000;
const TOLERANCE: f64 = 1e-12;

/// Combiner solving for the IC-ratio-maximizing weights.
#[derive(Debug, Clone)]
pub struct MaxIcCombiner {
    span: usize,
    shrunk: bool,
    weight_limit: bool,
}

impl MaxIcCombiner {
    /// Creates a max-IC combiner.
    ///
    /// `shrunk` selects the Ledoit-Wolf covariance over the raw sample one.
    pub const fn new(span: usize, shrunk: bool, weight_limit: bool) -> Self {
        Self {
            span,
            shrunk,
            weight_limit,
        }
    }

    fn covariance(&self, exposures: &Array2<f64>) -> Array2<f64> {
        let complete: Vec<usize> = exposures
            .axis_iter(Axis(0))
            .enumerate()
            .filter(|(_, row)| row.iter().all(|v| v.is_finite()))
            .map(|(i, _)| i)
            .collect();
        let x = exposures.select(Axis(0), &complete);
        if self.shrunk {
            ledoit_wolf(&x).0
        } else {
            sample_covariance(&x)
        }
    }
}

/// Solves `V w = μ`, `None` if `V` is singular.
pub fn solve_unconstrained(cov: &Array2<f64>, mu: &Array1<f64>) -> Option<Array1<f64>> {
    let v = to_dmatrix(cov);
    let b = DVector::from_iterator(mu.len(), mu.iter().copied());
    let w = match v.clone().cholesky() {
        Some(chol) => chol.solve(&b),
        None => v.lu().solve(&b)?,
    };
    w.iter().all(|x| x.is_finite()).then(|| w.iter().copied().collect())
}

/// Minimizes `½ wᵀVw − μᵀw` subject to `w ≥ 0` by cyclic coordinate descent.
pub fn nonnegative_quadratic(cov: &Array2<f64>, mu: &Array1<f64>) -> Array1<f64> {
    let k = mu.len();
    let mut w = Array1::<f64>::zeros(k);
    for _ in 0..MAX_SWEEPS {
        let mut max_change: f64 = 0.0;
        for i in 0..k {
            let vii = cov[[i, i]];
            let updated = if vii > TOLERANCE {
                let cross: f64 = (0..k).filter(|&j| j != i).map(|j| cov[[i, j]] * w[j]).sum();
                ((mu[i] - cross) / vii).max(0.0)
            } else {
                0.0
            };
            max_change = max_change.max((updated - w[i]).abs());
            w[i] = updated;
        }
        if max_change < TOLERANCE {
            break;
        }
    }
    w
}

impl Combiner for MaxIcCombiner {
    fn weights(&self, ctx: &CombineContext<'_>) -> Result<Array1<f64>> {
        let k = ctx.n_factors();
        let Some(mu) = ctx
            .history
            .trailing_mean(Statistic::Ic, ctx.date_index, self.span, None)
        else {
            return Ok(equal_weights(k));
        };
        let cov = self.covariance(ctx.exposures);

        if self.weight_limit {
            return Ok(nonnegative_quadratic(&cov, &mu));
        }
        Ok(solve_unconstrained(&cov, &mu).unwrap_or_else(|| {
            warn!(
                date_index = ctx.date_index,
                "singular factor covariance, using equal weights"
            );
            equal_weights(k)
        }))
    }

    fn name(&self) -> &str {
        if self.shrunk { "max_ic_shrunk" } else { "max_ic_sample" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_unconstrained_solution() {
        let cov = array![[2.0, 0.0], [0.0, 4.0]];
        let w = solve_unconstrained(&cov, &array![0.1, 0.2]).unwrap();
        assert_relative_eq!(w[0], 0.05, epsilon = 1e-12);
        assert_relative_eq!(w[1], 0.05, epsilon = 1e-12);
    }

    #[test]
    fn test_singular_covariance() {
        let cov = array![[1.0, 1.0], [1.0, 1.0]];
        assert!(solve_unconstrained(&cov, &array![0.1, 0.2]).is_none());
    }

    #[test]
    fn test_nonnegative_clips_negative_ic() {
        let cov = array![[1.0, 0.0], [0.0, 1.0]];
        let w = nonnegative_quadratic(&cov, &array![0.3, -0.2]);
        assert_relative_eq!(w[0], 0.3, epsilon = 1e-12);
        assert_eq!(w[1], 0.0);
    }

    #[test]
    fn test_nonnegative_matches_unconstrained_when_inactive() {
        let cov = array![[2.0, 0.5], [0.5, 1.0]];
        let mu = array![0.2, 0.1];
        let free = solve_unconstrained(&cov, &mu).unwrap();
        assert!(free.iter().all(|&x| x > 0.0));

        let limited = nonnegative_quadratic(&cov, &mu);
        assert_relative_eq!(limited[0], free[0], epsilon = 1e-9);
        assert_relative_eq!(limited[1], free[1], epsilon = 1e-9);
    }

    #[test]
    fn test_names() {
        assert_eq!(MaxIcCombiner::new(20, false, true).name(), "max_ic_sample");
        assert_eq!(MaxIcCombiner::new(20, true, true).name(), "max_ic_shrunk");
    }
}
