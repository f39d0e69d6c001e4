//! Operator-splitting (ADMM) solver for box- and linearly-constrained
//! quadratic programs.
//!
//! Solves
//!
//! ```text
//! minimize    ½ xᵀ P x + qᵀ x
//! subject to  l ≤ C x ≤ u
//! ```
//!
//! with the OSQP iteration: the linear system `P + σI + ρCᵀC` is factorized
//! once by Cholesky and reused, the `z` update is a projection on `[l, u]`.

use nalgebra::{DMatrix, DVector};

use crate::solver::SolveError;

/// Iteration settings of [`solve_qp`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdmmSettings {
    /// Penalty parameter `ρ`.
    pub rho: f64,
    /// Proximal regularization `σ`.
    pub sigma: f64,
    /// Over-relaxation parameter `α` in `(0, 2)`.
    pub alpha: f64,
    /// Iteration cap.
    pub max_iter: usize,
    /// Absolute tolerance on the residuals.
    pub eps_abs: f64,
    /// Relative tolerance on the residuals.
    pub eps_rel: f64,
}

impl Default for AdmmSettings {
    fn default() -> Self {
        Self {
            rho: 0.1,
            sigma: 1e-6,
            alpha: 1.6,
            max_iter: 50_000,
            eps_abs: 1e-7,
            eps_rel: 1e-7,
        }
    }
}

/// Solution of [`solve_qp`].
#[derive(Debug, Clone)]
pub struct QpSolution {
    /// Primal solution.
    pub x: DVector<f64>,
    /// Iterations used.
    pub iterations: usize,
}

fn inf_norm(v: &DVector<f64>) -> f64 {
    v.iter().fold(0.0, |acc, x| acc.max(x.abs()))
}

/// Solves the quadratic program from the starting point `x0`.
///
/// # Errors
///
/// [`SolveError::DimensionMismatch`] for inconsistent shapes,
/// [`SolveError::NonFinite`] if the system cannot be factorized and
/// [`SolveError::NotConverged`] if the residuals stay above tolerance.
pub fn solve_qp(
    p: &DMatrix<f64>,
    q: &DVector<f64>,
    c: &DMatrix<f64>,
    l: &DVector<f64>,
    u: &DVector<f64>,
    x0: &DVector<f64>,
    settings: &AdmmSettings,
) -> Result<QpSolution, SolveError> {
    let n = q.len();
    let m = l.len();
    if p.shape() != (n, n) || c.shape() != (m, n) || u.len() != m || x0.len() != n {
        return Err(SolveError::DimensionMismatch(format!(
            "P {:?}, q {n}, C {:?}, l {m}, u {}, x0 {}",
            p.shape(),
            c.shape(),
            u.len(),
            x0.len()
        )));
    }

    // Cost scaling keeps strongly penalized problems well conditioned.
    let scale = 1.0 / p.amax().max(q.amax()).max(1.0);
    let p = &(p * scale);
    let q = &(q * scale);

    let rho = settings.rho;
    let sigma = settings.sigma;
    let alpha = settings.alpha;

    let ct = c.transpose();
    let k = p + DMatrix::identity(n, n) * sigma + &ct * c * rho;
    let chol = k.cholesky().ok_or(SolveError::NonFinite {
        what: "quadratic term",
    })?;

    let mut x = x0.clone();
    let mut z = (c * &x).zip_zip_map(l, u, |v, lo, hi| v.max(lo).min(hi));
    let mut y = DVector::zeros(m);
    let mut primal = f64::INFINITY;
    let mut dual = f64::INFINITY;

    for iteration in 1..=settings.max_iter {
        let rhs = &x * sigma - q + &ct * (&z * rho - &y);
        let x_tilde = chol.solve(&rhs);
        let z_tilde = c * &x_tilde;

        x = &x_tilde * alpha + &x * (1.0 - alpha);
        let z_relaxed = &z_tilde * alpha + &z * (1.0 - alpha);
        let z_next = (&z_relaxed + &y / rho).zip_zip_map(l, u, |v, lo, hi| v.max(lo).min(hi));
        y += (&z_relaxed - &z_next) * rho;
        z = z_next;

        if iteration % 10 == 0 || iteration == settings.max_iter {
            let cx = c * &x;
            let px = p * &x;
            let cty = &ct * &y;
            primal = inf_norm(&(&cx - &z));
            dual = inf_norm(&(&px + q + &cty));
            if !(primal.is_finite() && dual.is_finite()) {
                return Err(SolveError::NonFinite { what: "iterate" });
            }
            let eps_primal = settings.eps_abs + settings.eps_rel * inf_norm(&cx).max(inf_norm(&z));
            let eps_dual = settings.eps_abs
                + settings.eps_rel * inf_norm(&px).max(inf_norm(&cty)).max(inf_norm(q));
            if primal <= eps_primal && dual <= eps_dual {
                return Ok(QpSolution {
                    x,
                    iterations: iteration,
                });
            }
        }
    }

    Err(SolveError::NotConverged {
        iterations: settings.max_iter,
        primal,
        dual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn box_rows(n: usize) -> DMatrix<f64> {
        DMatrix::identity(n, n)
    }

    #[test]
    fn test_unconstrained_minimum_inside_box() {
        let p = DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 2.0]);
        let q = DVector::from_vec(vec![-1.0, -1.0]);
        let l = DVector::from_vec(vec![-10.0, -10.0]);
        let u = DVector::from_vec(vec![10.0, 10.0]);
        let sol = solve_qp(&p, &q, &box_rows(2), &l, &u, &DVector::zeros(2), &AdmmSettings::default())
            .unwrap();
        assert_relative_eq!(sol.x[0], 0.5, epsilon = 1e-5);
        assert_relative_eq!(sol.x[1], 0.5, epsilon = 1e-5);
    }

    #[test]
    fn test_linear_program_with_budget() {
        // maximize 2 x0 + x1 with x in [0, 0.6]² and x0 + x1 = 1.
        let p = DMatrix::zeros(2, 2);
        let q = DVector::from_vec(vec![-2.0, -1.0]);
        let c = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
        let l = DVector::from_vec(vec![0.0, 0.0, 1.0]);
        let u = DVector::from_vec(vec![0.6, 0.6, 1.0]);
        let sol = solve_qp(&p, &q, &c, &l, &u, &DVector::zeros(2), &AdmmSettings::default()).unwrap();
        assert_relative_eq!(sol.x[0], 0.6, epsilon = 1e-4);
        assert_relative_eq!(sol.x[1], 0.4, epsilon = 1e-4);
    }

    #[test]
    fn test_dimension_mismatch() {
        let result = solve_qp(
            &DMatrix::zeros(2, 2),
            &DVector::zeros(3),
            &box_rows(2),
            &DVector::zeros(2),
            &DVector::zeros(2),
            &DVector::zeros(2),
            &AdmmSettings::default(),
        );
        assert!(matches!(result, Err(SolveError::DimensionMismatch(_))));
    }

    #[test]
    fn test_iteration_cap() {
        let settings = AdmmSettings {
            max_iter: 1,
            ..Default::default()
        };
        let p = DMatrix::zeros(2, 2);
        let q = DVector::from_vec(vec![-2.0, -1.0]);
        let c = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
        let l = DVector::from_vec(vec![0.0, 0.0, 1.0]);
        let u = DVector::from_vec(vec![0.6, 0.6, 1.0]);
        let result = solve_qp(&p, &q, &c, &l, &u, &DVector::zeros(2), &settings);
        assert!(matches!(result, Err(SolveError::NotConverged { .. })));
    }
}
