//! Core trait definition for factor combiners.

use std::fmt::Debug;

use cadiz_traits::{CadizError, Result};
use ndarray::{Array1, Array2};

use crate::history::FactorHistory;

/// Everything a combiner may look at on one trade date.
#[derive(Debug, Clone, Copy)]
pub struct CombineContext<'a> {
    /// Current exposures, one row per code and one column per factor.
    pub exposures: &'a Array2<f64>,
    /// Statistics of every factor on every trade date of the run.
    pub history: &'a FactorHistory,
    /// Row of the current trade date in `history`. Only earlier rows may be
    /// used.
    pub date_index: usize,
}

impl CombineContext<'_> {
    /// Number of factors being combined.
    pub fn n_factors(&self) -> usize {
        self.exposures.ncols()
    }
}

/// Produces per-date factor weights for the composite alpha.
///
/// Implementors only choose the weights; [`apply_weights`] forms the
/// composite. All implementations must be thread-safe (Send + Sync).
///
/// # Examples
///
/// ```rust,no_run
/// use cadiz_combine::{CombineContext, Combiner};
/// use ndarray::Array1;
///
/// #[derive(Debug)]
/// struct FirstOnly;
///
/// impl Combiner for FirstOnly {
///     fn weights(&self, ctx: &CombineContext<'_>) -> cadiz_traits::Result<Array1<f64>> {
///         let mut w = Array1::zeros(ctx.n_factors());
///         w[0] = 1.0;
///         Ok(w)
///     }
///
///     fn name(&self) -> &str {
///         "first_only"
///     }
/// }
/// ```
pub trait Combiner: Send + Sync + Debug {
    /// Factor weights for the date in `ctx`, one per exposure column.
    ///
    /// # Errors
    ///
    /// Returns an error if the weights cannot be computed.
    fn weights(&self, ctx: &CombineContext<'_>) -> Result<Array1<f64>>;

    /// Name of this combination strategy.
    fn name(&self) -> &str;
}

/// `k` equal weights.
pub fn equal_weights(k: usize) -> Array1<f64> {
    if k == 0 {
        return Array1::zeros(0);
    }
    Array1::from_elem(k, 1.0 / k as f64)
}

/// Composite `x · w / Σ|w|`.
///
/// Weights summing to zero in absolute value fall back to equal weights.
///
/// # Errors
///
/// Returns an error if there are no factors or the weight count differs from
/// the exposure width.
pub fn apply_weights(exposures: &Array2<f64>, weights: &Array1<f64>) -> Result<Array1<f64>> {
    if exposures.ncols() == 0 {
        return Err("cannot combine zero factors".into());
    }
    if weights.len() != exposures.ncols() {
        return Err(CadizError::InvalidData(format!(
            "{} weights for {} factors",
            weights.len(),
            exposures.ncols()
        )));
    }
    let gross: f64 = weights.iter().map(|w| w.abs()).sum();
    let normalized = if gross.is_finite() && gross > 0.0 {
        weights / gross
    } else {
        equal_weights(weights.len())
    };
    Ok(exposures.dot(&normalized))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_apply_weights_normalizes_by_gross() {
        let x = array![[1.0, 2.0], [3.0, -1.0]];
        let out = apply_weights(&x, &array![2.0, -2.0]).unwrap();
        assert_eq!(out.to_vec(), vec![-0.5, 2.0]);
    }

    #[test]
    fn test_apply_weights_zero_falls_back_to_equal() {
        let x = array![[1.0, 3.0]];
        let out = apply_weights(&x, &array![0.0, 0.0]).unwrap();
        assert_eq!(out.to_vec(), vec![2.0]);
    }

    #[test]
    fn test_apply_weights_shape_errors() {
        assert!(apply_weights(&Array2::zeros((2, 0)), &Array1::zeros(0)).is_err());
        assert!(apply_weights(&array![[1.0, 2.0]], &array![1.0]).is_err());
    }
}
