//! Orthogonalization of a cross-section's factor exposures.

use cadiz_traits::stats::{from_dmatrix, to_dmatrix};
use cadiz_traits::{CadizError, Result};
use derive_more::Display;
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// How factors are made mutually orthogonal before combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrthMethod {
    /// Sequential Gram-Schmidt: the first factor is kept, each later one is
    /// replaced by its residual on the earlier ones.
    #[display("schmidt")]
    Schmidt,
    /// Principal-axis orthogonalization `X U Λ^{-1/2}`.
    #[display("canonical")]
    Canonical,
    /// Löwdin orthogonalization `X U Λ^{-1/2} Uᵀ`, the orthogonal basis
    /// closest to the original factors.
    #[display("symmetric")]
    Symmetric,
}

/// Orthogonalizes the columns of `x` (rows are codes).
///
/// The canonical and symmetric methods rescale the result so that
/// `outᵀ out = (n − 1) I`.
///
/// # Errors
///
/// Returns [`CadizError::InvalidData`] when the canonical or symmetric method
/// meets linearly dependent factors.
pub fn orthogonalize(x: &Array2<f64>, method: OrthMethod) -> Result<Array2<f64>> {
    if x.ncols() < 2 {
        return Ok(x.clone());
    }
    match method {
        OrthMethod::Schmidt => Ok(gram_schmidt(x)),
        OrthMethod::Canonical | OrthMethod::Symmetric => lowdin(x, method),
    }
}

fn gram_schmidt(x: &Array2<f64>) -> Array2<f64> {
    let mut out = x.clone();
    for j in 1..x.ncols() {
        let mut v = out.column(j).to_owned();
        for i in 0..j {
            let q = out.column(i);
            let qq = q.dot(&q);
            if qq > f64::EPSILON {
                v.scaled_add(-v.dot(&q) / qq, &q);
            }
        }
        out.column_mut(j).assign(&v);
    }
    out
}

fn lowdin(x: &Array2<f64>, method: OrthMethod) -> Result<Array2<f64>> {
    let m = to_dmatrix(&x.t().dot(x));
    let eigen = SymmetricEigen::new(m);
    let largest = eigen.eigenvalues.iter().copied().fold(0.0_f64, f64::max);
    if eigen
        .eigenvalues
        .iter()
        .any(|&l| !l.is_finite() || l <= largest * 1e-12)
    {
        return Err(CadizError::InvalidData(
            "factors are linearly dependent and cannot be orthogonalized".to_string(),
        ));
    }

    let inv_sqrt = DMatrix::from_diagonal(&eigen.eigenvalues.map(|l| 1.0 / l.sqrt()));
    let u = &eigen.eigenvectors;
    let s = match method {
        OrthMethod::Symmetric => u * inv_sqrt * u.transpose(),
        _ => u * inv_sqrt,
    };
    let scale = ((x.len_of(Axis(0)) as f64) - 1.0).max(1.0).sqrt();
    Ok(x.dot(&from_dmatrix(&s)) * scale)
}
