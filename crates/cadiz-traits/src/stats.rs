//! Numeric primitives shared by the preprocessing and synthesis stages.
//!
//! Everything here works on a single cross-section: z-score standardization,
//! normal winsorization, OLS neutralization, rank correlation and factor
//! covariance estimation (sample and Ledoit-Wolf shrinkage).

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2, ArrayView1, Axis};

use crate::error::{CadizError, Result};

/// Minimum threshold for standard deviation to avoid division by zero.
/// Values below this threshold are treated as zero variance.
pub const MIN_STD_THRESHOLD: f64 = 1e-10;

/// Statistics computed while standardizing a column.
#[derive(Debug, Clone, Copy)]
pub struct StandardizeResult {
    /// Mean of the finite input values.
    pub mean: f64,
    /// Sample standard deviation (N-1 denominator) of the finite input values.
    pub std: f64,
    /// Whether the standardization was applied (false if variance was too low).
    pub applied: bool,
}

/// Mean and sample standard deviation of the finite values in a column.
///
/// Returns `(NaN, NaN)` when there are no finite values and a zero standard
/// deviation for a single value.
pub fn finite_mean_std(values: ArrayView1<'_, f64>) -> (f64, f64) {
    let finite: Vec<f64> = values.iter().copied().filter(|x| x.is_finite()).collect();
    if finite.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = finite.len() as f64;
    let mean = finite.iter().sum::<f64>() / n;
    let std = if finite.len() > 1 {
        (finite.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
    } else {
        0.0
    };
    (mean, std)
}

/// Standardize a column to z-scores (mean=0, std=1).
///
/// Non-finite entries stay `NaN` in the output. A column whose standard
/// deviation is below [`MIN_STD_THRESHOLD`] (constant or single-valued)
/// becomes all zeros and is reported with `applied == false`.
pub fn standardize(values: ArrayView1<'_, f64>) -> (Array1<f64>, StandardizeResult) {
    let (mean, std) = finite_mean_std(values);
    let applied = std > MIN_STD_THRESHOLD;

    let out = if applied {
        values.mapv(|x| (x - mean) / std)
    } else {
        values.mapv(|x| if x.is_finite() || mean.is_nan() { 0.0 } else { x })
    };
    (out, StandardizeResult { mean, std, applied })
}

/// Cap every value at `mean ± num_stds × std`.
///
/// Non-finite entries are left untouched; a degenerate column is returned
/// unchanged.
pub fn winsorize_normal(values: ArrayView1<'_, f64>, num_stds: f64) -> Array1<f64> {
    let (mean, std) = finite_mean_std(values);
    if std.is_nan() || std <= MIN_STD_THRESHOLD {
        return values.to_owned();
    }
    let lower = mean - num_stds * std;
    let upper = mean + num_stds * std;
    values.mapv(|x| if x.is_finite() { x.clamp(lower, upper) } else { x })
}

/// Median of the finite values, `None` if there are none.
pub fn median<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let mut finite: Vec<f64> = values.into_iter().filter(|x| x.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    finite.sort_by(f64::total_cmp);
    let mid = finite.len() / 2;
    Some(if finite.len() % 2 == 0 {
        (finite[mid - 1] + finite[mid]) / 2.0
    } else {
        finite[mid]
    })
}

/// Residuals of an OLS regression of each column of `y` on `risk`.
///
/// Solved through an SVD so that rank-deficient exposure matrices (for example
/// one-hot industries plus a constant) still give the minimum-norm fit.
pub fn ols_residuals(y: &Array2<f64>, risk: &Array2<f64>) -> Result<Array2<f64>> {
    if y.nrows() != risk.nrows() {
        return Err(CadizError::InvalidData(format!(
            "neutralization needs matching rows, got {} and {}",
            y.nrows(),
            risk.nrows()
        )));
    }
    if risk.ncols() == 0 || y.nrows() == 0 {
        return Ok(y.clone());
    }

    let x = to_dmatrix(risk);
    let svd = x.clone().svd(true, true);
    let mut residuals = y.clone();
    for (j, mut column) in residuals.axis_iter_mut(Axis(1)).enumerate() {
        let target = DVector::from_iterator(y.nrows(), y.column(j).iter().copied());
        let beta = svd
            .solve(&target, 1e-12)
            .map_err(|e| CadizError::Other(format!("least squares failed: {e}")))?;
        let fitted = &x * beta;
        for (i, value) in column.iter_mut().enumerate() {
            *value -= fitted[i];
        }
    }
    Ok(residuals)
}

/// Average ranks (0-based) with ties sharing their mean rank.
pub fn rank(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut indexed: Vec<(usize, f64)> = values.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j < n && indexed[j].1 == indexed[i].1 {
            j += 1;
        }
        let avg_rank = (i + j - 1) as f64 / 2.0;
        for item in &indexed[i..j] {
            ranks[item.0] = avg_rank;
        }
        i = j;
    }
    ranks
}

/// Pearson correlation; `NaN` when either side has no variance.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return f64::NAN;
    }
    let mean_x = x[..n].iter().sum::<f64>() / n as f64;
    let mean_y = y[..n].iter().sum::<f64>() / n as f64;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (a, b) in x[..n].iter().zip(&y[..n]) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return f64::NAN;
    }
    cov / (var_x.sqrt() * var_y.sqrt())
}

/// Information coefficient: Spearman rank correlation between factor values
/// and forward returns over the pairs where both are finite.
pub fn rank_ic(factor: ArrayView1<'_, f64>, forward: ArrayView1<'_, f64>) -> f64 {
    let (xs, ys): (Vec<f64>, Vec<f64>) = factor
        .iter()
        .zip(forward.iter())
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(&a, &b)| (a, b))
        .unzip();
    if xs.len() < 2 {
        return f64::NAN;
    }
    pearson(&rank(&xs), &rank(&ys))
}

/// Sample covariance (N-1 denominator) of the columns of `x`.
pub fn sample_covariance(x: &Array2<f64>) -> Array2<f64> {
    let n = x.nrows();
    if n < 2 {
        return Array2::zeros((x.ncols(), x.ncols()));
    }
    let mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
    let centered = x - &mean;
    centered.t().dot(&centered) / (n as f64 - 1.0)
}

/// Ledoit-Wolf shrinkage of the sample covariance toward a scaled identity.
///
/// Returns the shrunk matrix and the shrinkage intensity in `[0, 1]`.
pub fn ledoit_wolf(x: &Array2<f64>) -> (Array2<f64>, f64) {
    let (n, p) = x.dim();
    if n < 2 || p == 0 {
        return (sample_covariance(x), 0.0);
    }
    let mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(p));
    let centered = x - &mean;
    // Biased (1/n) estimator, as in the original Ledoit-Wolf derivation.
    let s = centered.t().dot(&centered) / n as f64;
    let mu = s.diag().sum() / p as f64;

    let mut target = Array2::<f64>::zeros((p, p));
    target.diag_mut().fill(mu);
    let d2 = (&s - &target).mapv(|v| v * v).sum() / p as f64;

    let mut b2 = 0.0;
    for row in centered.axis_iter(Axis(0)) {
        let outer = row
            .view()
            .insert_axis(Axis(1))
            .dot(&row.view().insert_axis(Axis(0)));
        b2 += (&outer - &s).mapv(|v| v * v).sum() / p as f64;
    }
    b2 /= (n * n) as f64;

    let shrinkage = if d2 > 0.0 { (b2.min(d2)) / d2 } else { 0.0 };
    let shrunk = &target * shrinkage + &s * (1.0 - shrinkage);
    (shrunk, shrinkage)
}

/// Copy an ndarray matrix into a nalgebra one.
pub fn to_dmatrix(a: &Array2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

/// Copy a nalgebra matrix into an ndarray one.
pub fn from_dmatrix(m: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}
