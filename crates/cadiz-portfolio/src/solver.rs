//! Per-date portfolio optimization.
//!
//! [`Solver::solve`] turns expected returns, bounds, linear constraints and an
//! optional covariance into target weights, then applies turnover control
//! relative to the current position. Every failure is a [`SolveError`] that
//! the rebalancer recovers from.

use std::str::FromStr;

use cadiz_traits::stats::to_dmatrix;
use cadiz_traits::CadizError;
use derive_more::Display;
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::admm::{AdmmSettings, solve_qp};
use crate::bounds::BoxBounds;
use crate::constraints::LinearConstraints;
use crate::settings::StrategyParams;

/// Optimization used to build the target portfolio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
pub enum RebalanceMethod {
    /// Maximize expected return (risk neutral).
    #[serde(rename = "linear", alias = "risk_neutral")]
    #[display("linear")]
    Linear,
    /// Mean-variance with the full asset covariance.
    #[serde(rename = "mv")]
    #[display("mv")]
    Mv,
    /// Mean-variance with the factor-model covariance.
    #[default]
    #[serde(rename = "fmv")]
    #[display("fmv")]
    Fmv,
    /// Maximize expected return at a target active volatility.
    #[serde(rename = "tv")]
    #[display("tv")]
    Tv,
}

impl RebalanceMethod {
    /// Returns whether the method needs a covariance.
    pub const fn needs_risk(self) -> bool {
        !matches!(self, Self::Linear)
    }
}

impl FromStr for RebalanceMethod {
    type Err = CadizError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linear" | "risk_neutral" => Ok(Self::Linear),
            "mv" => Ok(Self::Mv),
            "fmv" => Ok(Self::Fmv),
            "tv" => Ok(Self::Tv),
            other => Err(CadizError::InvalidConfig(format!(
                "unknown rebalance method '{other}'"
            ))),
        }
    }
}

/// Reasons a per-date optimization fails.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveError {
    /// An asset's lower bound exceeds its upper bound.
    #[error("asset {code} has lower bound {lower} above upper bound {upper}")]
    InfeasibleBounds {
        /// Offending code.
        code: String,
        /// Lower bound.
        lower: f64,
        /// Upper bound.
        upper: f64,
    },

    /// A linear constraint cannot be met inside the per-asset bounds.
    #[error("constraint '{0}' cannot be satisfied")]
    InfeasibleConstraint(String),

    /// The method needs a covariance the risk model cannot provide.
    #[error("no usable risk model: {0}")]
    MissingRiskModel(String),

    /// An input or iterate is NaN or infinite.
    #[error("non-finite {what}")]
    NonFinite {
        /// What was not finite.
        what: &'static str,
    },

    /// The iteration cap was hit.
    #[error(
        "optimizer did not converge in {iterations} iterations (primal {primal:.3e}, dual {dual:.3e})"
    )]
    NotConverged {
        /// Iterations performed.
        iterations: usize,
        /// Final primal residual.
        primal: f64,
        /// Final dual residual.
        dual: f64,
    },

    /// Inputs have inconsistent shapes.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),
}

/// Inputs of one optimization.
#[derive(Debug, Clone, Copy)]
pub struct RebalanceProblem<'a> {
    /// Codes, in row order.
    pub codes: &'a [String],
    /// Expected returns.
    pub er: &'a Array1<f64>,
    /// Benchmark weights.
    pub benchmark: &'a Array1<f64>,
    /// Weights held before rebalancing.
    pub current: &'a Array1<f64>,
    /// Per-asset bounds.
    pub bounds: &'a BoxBounds,
    /// Linear constraints.
    pub constraints: &'a LinearConstraints,
    /// Asset covariance, required by every method but `linear`.
    pub covariance: Option<&'a Array2<f64>>,
}

const TARGET_VOL_STEPS: usize = 60;
const FEASIBILITY_TOL: f64 = 1e-9;
const CONSTRAINT_TOL: f64 = 1e-6;

/// Optimizer configured from the strategy parameters.
#[derive(Debug, Clone)]
pub struct Solver {
    method: RebalanceMethod,
    risk_aversion: f64,
    target_vol: f64,
    turn_over_target: f64,
    settings: AdmmSettings,
}

impl Solver {
    /// Creates a solver for the given method.
    pub fn new(method: RebalanceMethod) -> Self {
        Self {
            method,
            risk_aversion: 1.0,
            target_vol: 0.1,
            turn_over_target: f64::INFINITY,
            settings: AdmmSettings::default(),
        }
    }

    /// Creates the solver described by `params`.
    pub fn from_params(params: &StrategyParams) -> Self {
        Self {
            method: params.rebalance_method,
            risk_aversion: params.risk_aversion,
            target_vol: params.target_vol,
            turn_over_target: params.turn_over_target,
            settings: AdmmSettings::default(),
        }
    }

    /// Sets the mean-variance risk aversion.
    pub const fn with_risk_aversion(mut self, value: f64) -> Self {
        self.risk_aversion = value;
        self
    }

    /// Sets the active volatility target of the `tv` method.
    pub const fn with_target_vol(mut self, value: f64) -> Self {
        self.target_vol = value;
        self
    }

    /// Sets the turnover target.
    pub const fn with_turn_over_target(mut self, value: f64) -> Self {
        self.turn_over_target = value;
        self
    }

    /// Replaces the ADMM settings.
    pub const fn with_settings(mut self, settings: AdmmSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Configured method.
    pub const fn method(&self) -> RebalanceMethod {
        self.method
    }

    /// Target weights for `problem`, inside the per-asset box and the linear
    /// constraints. Turnover-controlled weights that leave the constraint set
    /// are projected back onto it.
    ///
    /// # Errors
    ///
    /// Returns a [`SolveError`] for inverted or infeasible limits, a missing
    /// covariance, non-finite inputs or when the optimizer does not converge.
    pub fn solve(&self, problem: &RebalanceProblem<'_>) -> Result<Array1<f64>, SolveError> {
        self.check(problem)?;

        let raw = match self.method {
            RebalanceMethod::Linear => self.solve_centered(problem, 0.0, None, None)?,
            RebalanceMethod::Mv | RebalanceMethod::Fmv => {
                let cov = covariance(problem, self.method)?;
                self.solve_centered(problem, self.risk_aversion, Some(&cov), None)?
            }
            RebalanceMethod::Tv => self.solve_target_vol(problem)?,
        };

        let controlled = problem
            .bounds
            .clip(&turnover_control(&raw, problem.current, self.turn_over_target));
        if problem.constraints.is_satisfied(&controlled, CONSTRAINT_TOL) {
            return Ok(controlled);
        }
        // The current position may sit outside the linear bands, so the blend can too.
        let projected = self.project(problem, &controlled)?;
        if !problem.constraints.is_satisfied(&projected, CONSTRAINT_TOL) {
            return Err(SolveError::InfeasibleConstraint("turnover control".to_string()));
        }
        Ok(projected)
    }

    /// Nearest point to `point` inside the box and the linear constraints.
    fn project(
        &self,
        problem: &RebalanceProblem<'_>,
        point: &Array1<f64>,
    ) -> Result<Array1<f64>, SolveError> {
        let n = point.len();
        let (c, l, u) = stacked_constraints(problem);
        let p = DMatrix::identity(n, n);
        let q = DVector::from_iterator(n, point.iter().map(|v| -v));
        let x0 = DVector::from_iterator(n, point.iter().copied());
        let solution = solve_qp(&p, &q, &c, &l, &u, &x0, &self.settings)?;
        Ok(problem.bounds.clip(&solution.x.iter().copied().collect()))
    }

    fn check(&self, problem: &RebalanceProblem<'_>) -> Result<(), SolveError> {
        let n = problem.codes.len();
        let lens = [
            problem.er.len(),
            problem.benchmark.len(),
            problem.current.len(),
            problem.bounds.lower.len(),
            problem.bounds.upper.len(),
            problem.constraints.matrix().nrows(),
        ];
        if lens.iter().any(|&len| len != n) {
            return Err(SolveError::DimensionMismatch(format!(
                "{n} codes but input lengths {lens:?}"
            )));
        }
        if let Some(cov) = problem.covariance
            && cov.dim() != (n, n)
        {
            return Err(SolveError::DimensionMismatch(format!(
                "covariance is {:?} for {n} codes",
                cov.dim()
            )));
        }

        let finite = |v: &Array1<f64>| v.iter().all(|x| x.is_finite());
        if !finite(problem.er) {
            return Err(SolveError::NonFinite {
                what: "expected returns",
            });
        }
        if !finite(problem.current) {
            return Err(SolveError::NonFinite {
                what: "current position",
            });
        }
        if !finite(&problem.bounds.lower) || !finite(&problem.bounds.upper) {
            return Err(SolveError::NonFinite { what: "bounds" });
        }
        if let Some(i) = problem.bounds.first_inverted() {
            return Err(SolveError::InfeasibleBounds {
                code: problem.codes[i].clone(),
                lower: problem.bounds.lower[i],
                upper: problem.bounds.upper[i],
            });
        }
        if let Some(name) = problem.constraints.first_inverted() {
            return Err(SolveError::InfeasibleConstraint(name.to_string()));
        }

        // Range of every constraint over the box.
        let a = problem.constraints.matrix();
        for (j, name) in problem.constraints.names().iter().enumerate() {
            let (mut lo, mut hi) = (0.0, 0.0);
            for i in 0..n {
                let coef = a[[i, j]];
                let (l, u) = (problem.bounds.lower[i], problem.bounds.upper[i]);
                if coef >= 0.0 {
                    lo += coef * l;
                    hi += coef * u;
                } else {
                    lo += coef * u;
                    hi += coef * l;
                }
            }
            if lo > problem.constraints.upper()[j] + FEASIBILITY_TOL
                || hi < problem.constraints.lower()[j] - FEASIBILITY_TOL
            {
                return Err(SolveError::InfeasibleConstraint(name.clone()));
            }
        }
        Ok(())
    }

    /// Minimizes `½ λ wᵀΣw − (er + λΣc)ᵀw` over the feasible set, where
    /// `c` is `center` (zero when absent).
    fn solve_centered(
        &self,
        problem: &RebalanceProblem<'_>,
        lambda: f64,
        cov: Option<&Array2<f64>>,
        center: Option<&Array1<f64>>,
    ) -> Result<Array1<f64>, SolveError> {
        let n = problem.codes.len();
        let (p, q) = match cov {
            Some(sigma) if lambda > 0.0 => {
                let mut q = problem.er.mapv(|e| -e);
                if let Some(c) = center {
                    q = q - sigma.dot(c) * lambda;
                }
                (to_dmatrix(sigma) * lambda, q)
            }
            _ => (DMatrix::zeros(n, n), problem.er.mapv(|e| -e)),
        };
        if p.iter().any(|v| !v.is_finite()) {
            return Err(SolveError::NonFinite { what: "covariance" });
        }

        let (c, l, u) = stacked_constraints(problem);

        let q = DVector::from_iterator(n, q.iter().copied());
        let x0 = DVector::from_iterator(n, problem.current.iter().copied());
        let solution = solve_qp(&p, &q, &c, &l, &u, &x0, &self.settings)?;
        Ok(solution.x.iter().copied().collect())
    }

    /// Bisection on the risk aversion until the active volatility
    /// `√((w − b)ᵀΣ(w − b))` matches the target.
    fn solve_target_vol(&self, problem: &RebalanceProblem<'_>) -> Result<Array1<f64>, SolveError> {
        let cov = covariance(problem, RebalanceMethod::Tv)?;
        let active_vol = |w: &Array1<f64>| {
            let d = w - problem.benchmark;
            d.dot(&cov.dot(&d)).max(0.0).sqrt()
        };
        let solve = |lambda: f64| {
            self.solve_centered(problem, lambda, Some(&cov), Some(problem.benchmark))
        };

        let (mut lo, mut hi) = (-6.0_f64, 6.0_f64);
        let aggressive = solve(10f64.powf(lo))?;
        if active_vol(&aggressive) <= self.target_vol {
            return Ok(aggressive);
        }
        let mut best = solve(10f64.powf(hi))?;
        if active_vol(&best) > self.target_vol {
            return Ok(best);
        }
        for _ in 0..TARGET_VOL_STEPS {
            let mid = 0.5 * (lo + hi);
            let w = solve(10f64.powf(mid))?;
            let vol = active_vol(&w);
            if vol > self.target_vol {
                lo = mid;
            } else {
                hi = mid;
                best = w;
            }
            if (vol - self.target_vol).abs() <= 1e-6 * self.target_vol.max(1e-12) {
                break;
            }
        }
        Ok(best)
    }
}

/// Box rows followed by the linear constraint rows, as `l ≤ C w ≤ u`.
fn stacked_constraints(problem: &RebalanceProblem<'_>) -> (DMatrix<f64>, DVector<f64>, DVector<f64>) {
    let n = problem.codes.len();
    let a = problem.constraints.matrix();
    let m = n + a.ncols();
    let mut c = DMatrix::zeros(m, n);
    let mut l = DVector::zeros(m);
    let mut u = DVector::zeros(m);
    for i in 0..n {
        c[(i, i)] = 1.0;
        l[i] = problem.bounds.lower[i];
        u[i] = problem.bounds.upper[i];
    }
    for j in 0..a.ncols() {
        for i in 0..n {
            c[(n + j, i)] = a[[i, j]];
        }
        l[n + j] = problem.constraints.lower()[j];
        u[n + j] = problem.constraints.upper()[j];
    }
    (c, l, u)
}

fn covariance(problem: &RebalanceProblem<'_>, method: RebalanceMethod) -> Result<Array2<f64>, SolveError> {
    let cov = problem
        .covariance
        .ok_or_else(|| SolveError::MissingRiskModel(format!("{method} needs a covariance")))?;
    if cov.iter().any(|v| !v.is_finite()) {
        return Err(SolveError::NonFinite { what: "covariance" });
    }
    Ok(cov.clone())
}

/// One-way turnover `Σ|target − current|`.
pub fn turnover(target: &Array1<f64>, current: &Array1<f64>) -> f64 {
    target
        .iter()
        .zip(current.iter())
        .map(|(t, c)| (t - c).abs())
        .sum()
}

/// Moves `target` toward `current` so that turnover does not exceed
/// `turn_over_target`.
pub fn turnover_control(target: &Array1<f64>, current: &Array1<f64>, turn_over_target: f64) -> Array1<f64> {
    let traded = turnover(target, current);
    if traded <= turn_over_target || traded == 0.0 {
        return target.clone();
    }
    let fraction = turn_over_target / traded;
    current + &((target - current) * fraction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{BoundaryType, ParameterBuilder};
    use approx::assert_relative_eq;
    use ndarray::array;

    struct Fixture {
        codes: Vec<String>,
        er: Array1<f64>,
        benchmark: Array1<f64>,
        current: Array1<f64>,
        bounds: BoxBounds,
        constraints: LinearConstraints,
    }

    fn fixture() -> Fixture {
        let params = ParameterBuilder::new()
            .benchmark_band(-1.0, 0.0, BoundaryType::Absolute)
            .total_band(0.0, 0.0, BoundaryType::Absolute)
            .effective_industry_band(-1.0, 1.0, BoundaryType::Absolute)
            .build()
            .unwrap();
        let industries = vec!["x".to_string(); 3];
        let benchmark = array![0.3, 0.3, 0.4];
        Fixture {
            codes: vec!["A".into(), "B".into(), "C".into()],
            er: array![0.03, 0.01, 0.02],
            constraints: LinearConstraints::build(&industries, &benchmark, &params),
            current: benchmark.clone(),
            benchmark,
            bounds: BoxBounds {
                lower: array![0.0, 0.0, 0.0],
                upper: array![0.5, 0.5, 0.5],
            },
        }
    }

    fn problem<'a>(f: &'a Fixture, cov: Option<&'a Array2<f64>>) -> RebalanceProblem<'a> {
        RebalanceProblem {
            codes: &f.codes,
            er: &f.er,
            benchmark: &f.benchmark,
            current: &f.current,
            bounds: &f.bounds,
            constraints: &f.constraints,
            covariance: cov,
        }
    }

    #[test]
    fn test_linear_fills_best_assets() {
        let f = fixture();
        let w = Solver::new(RebalanceMethod::Linear).solve(&problem(&f, None)).unwrap();
        assert_relative_eq!(w[0], 0.5, epsilon = 1e-4);
        assert_relative_eq!(w[1], 0.0, epsilon = 1e-4);
        assert_relative_eq!(w[2], 0.5, epsilon = 1e-4);
        assert!(f.bounds.contains(&w, 1e-12));
        assert!(f.constraints.is_satisfied(&w, 1e-4));
    }

    #[test]
    fn test_mean_variance_diversifies() {
        let f = fixture();
        let cov = Array2::from_diag(&array![0.04, 0.04, 0.04]);
        let w = Solver::new(RebalanceMethod::Mv)
            .with_risk_aversion(10.0)
            .solve(&problem(&f, Some(&cov)))
            .unwrap();
        assert!(w[0] < 0.5 && w[0] > w[2] && w[2] > w[1]);
        assert_relative_eq!(w.sum(), 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_missing_covariance() {
        let f = fixture();
        let result = Solver::new(RebalanceMethod::Fmv).solve(&problem(&f, None));
        assert!(matches!(result, Err(SolveError::MissingRiskModel(_))));
    }

    #[test]
    fn test_inverted_box_is_rejected() {
        let mut f = fixture();
        f.bounds.lower[1] = 0.6;
        let result = Solver::new(RebalanceMethod::Linear).solve(&problem(&f, None));
        assert!(matches!(result, Err(SolveError::InfeasibleBounds { ref code, .. }) if code == "B"));
    }

    #[test]
    fn test_unreachable_constraint_is_rejected() {
        let mut f = fixture();
        f.bounds.upper = array![0.2, 0.2, 0.2];
        let result = Solver::new(RebalanceMethod::Linear).solve(&problem(&f, None));
        assert!(matches!(result, Err(SolveError::InfeasibleConstraint(_))));
    }

    #[test]
    fn test_non_finite_er() {
        let mut f = fixture();
        f.er[0] = f64::NAN;
        let result = Solver::new(RebalanceMethod::Linear).solve(&problem(&f, None));
        assert!(matches!(result, Err(SolveError::NonFinite { .. })));
    }

    #[test]
    fn test_turnover_control() {
        let current = array![0.5, 0.5, 0.0];
        let target = array![0.0, 0.5, 0.5];
        let controlled = turnover_control(&target, &current, 0.5);
        assert_relative_eq!(turnover(&controlled, &current), 0.5, epsilon = 1e-12);
        assert_relative_eq!(controlled[0], 0.25, epsilon = 1e-12);
        assert_eq!(turnover_control(&target, &current, 2.0), target);
    }

    #[test]
    fn test_turnover_control_stays_inside_constraints() {
        let mut f = fixture();
        f.current = array![0.2, 0.0, 0.0];
        let w = Solver::new(RebalanceMethod::Linear)
            .with_turn_over_target(0.4)
            .solve(&problem(&f, None))
            .unwrap();
        assert!(f.bounds.contains(&w, 1e-12));
        assert!(f.constraints.is_satisfied(&w, 1e-4));
        assert_relative_eq!(w.sum(), 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_target_vol_hits_target() {
        let f = fixture();
        let cov = Array2::from_diag(&array![0.04, 0.09, 0.0625]);
        let target = 0.05;
        let w = Solver::new(RebalanceMethod::Tv)
            .with_target_vol(target)
            .solve(&problem(&f, Some(&cov)))
            .unwrap();
        let d = &w - &f.benchmark;
        let vol = d.dot(&cov.dot(&d)).sqrt();
        assert!((vol - target).abs() < 1e-3, "active vol {vol}");
    }

    #[test]
    fn test_method_tags() {
        assert_eq!("risk_neutral".parse::<RebalanceMethod>().unwrap(), RebalanceMethod::Linear);
        assert_eq!(RebalanceMethod::default().to_string(), "fmv");
        assert!("qp".parse::<RebalanceMethod>().is_err());
        let parsed: RebalanceMethod = serde_json::from_str("\"risk_neutral\"").unwrap();
        assert_eq!(parsed, RebalanceMethod::Linear);
        assert!(!RebalanceMethod::Linear.needs_risk());
    }
}
