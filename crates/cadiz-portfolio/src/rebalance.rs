//! The per-date rebalancing loop.
//!
//! For every trade date from the start date on, the [`Rebalancer`] builds the
//! linear constraints and per-asset bounds, processes the alpha model's
//! features, predicts expected returns and solves for target weights. A
//! failed solve is logged and replaced by the current position (or the
//! benchmark when configured), so a run always yields one position per date.

use cadiz_process::{DEFAULT_POST_PROCESS, DEFAULT_PRE_PROCESS, factor_processing, risk_exposure};
use cadiz_traits::{
    AlphaModel, CadizError, CrossSection, FactorPanel, ModelSchedule, Result, RiskModel,
};
use std::collections::HashMap;
use ndarray::{Array1, Array2};
use tracing::{debug, info, warn};

use crate::bounds::create_box_bounds;
use crate::constraints::LinearConstraints;
use crate::position::{Position, PositionHistory};
use crate::settings::StrategyParams;
use crate::solver::{RebalanceMethod, RebalanceProblem, SolveError, Solver};

/// Alpha models keyed by the first date they apply to.
pub type AlphaSchedule = ModelSchedule<Box<dyn AlphaModel>>;
/// Risk models keyed by the first date they apply to.
pub type RiskSchedule = ModelSchedule<Box<dyn RiskModel>>;

/// Runs the constrained optimization on every trade date.
#[derive(Debug)]
pub struct Rebalancer<'a> {
    params: &'a StrategyParams,
    solver: Solver,
}

impl<'a> Rebalancer<'a> {
    /// Creates a rebalancer for `params`.
    pub fn new(params: &'a StrategyParams) -> Self {
        Self {
            params,
            solver: Solver::from_params(params),
        }
    }

    /// Replaces the solver.
    pub fn with_solver(mut self, solver: Solver) -> Self {
        self.solver = solver;
        self
    }

    /// Produces one position per trade date on or after the start date.
    ///
    /// # Errors
    ///
    /// Returns [`CadizError::MissingModel`] when no alpha model is scheduled
    /// for a date, and propagates feature lookup, processing and prediction
    /// errors. Optimization failures never surface here.
    pub fn run(
        &self,
        panel: &FactorPanel,
        alpha_models: &AlphaSchedule,
        risk_models: Option<&RiskSchedule>,
    ) -> Result<PositionHistory> {
        let mut history = PositionHistory::new();

        for section in panel.sections() {
            let date = section.trade_date;
            if self.params.start_date.is_some_and(|start| date < start) {
                continue;
            }
            let alpha = alpha_models.at(date).ok_or(CadizError::MissingModel {
                kind: "alpha",
                date,
            })?;
            let risk = risk_models.and_then(|s| s.at(date));

            let current = match history.last() {
                Some(p) => p.reindex(&section.codes),
                None => self.seed(panel, section),
            };
            let position = self.rebalance(panel, section, &**alpha, risk.map(|m| &**m), current)?;
            debug!(
                trade_date = %date,
                codes = position.len(),
                gross = position.weights.iter().map(|w| w.abs()).sum::<f64>(),
                solved = position.solved,
                "rebalanced"
            );
            history.push(position);
        }

        info!(
            dates = history.len(),
            fallbacks = history.fallback_dates().len(),
            method = %self.params.rebalance_method,
            "rebalancing finished"
        );
        Ok(history)
    }

    /// Benchmark weights of the nearest date before the first rebalanced
    /// date, or of the earliest date when none precedes it, aligned to the
    /// first rebalanced cross-section.
    fn seed(&self, panel: &FactorPanel, first: &CrossSection) -> Array1<f64> {
        let sections = panel.sections();
        let source = sections
            .iter()
            .rev()
            .find(|s| s.trade_date < first.trade_date)
            .or_else(|| sections.first())
            .unwrap_or(first);
        let weights: HashMap<&str, f64> = source
            .codes
            .iter()
            .map(String::as_str)
            .zip(source.benchmark.iter().copied())
            .collect();
        first
            .codes
            .iter()
            .map(|c| weights.get(c.as_str()).copied().unwrap_or(0.0))
            .collect()
    }

    fn rebalance(
        &self,
        panel: &FactorPanel,
        section: &CrossSection,
        alpha: &dyn AlphaModel,
        risk: Option<&dyn RiskModel>,
        current: Array1<f64>,
    ) -> Result<Position> {
        let params = self.params;
        let constraints = LinearConstraints::build(&section.industries, &section.benchmark, params);
        let bounds = create_box_bounds(&section.codes, &section.benchmark, params);

        let features = panel.factor_indices(alpha.features())?;
        let exposure = if params.neutralized_styles.is_empty() {
            None
        } else {
            let styles = panel.factor_indices(&params.neutralized_styles)?;
            Some(risk_exposure(section, &styles, true))
        };
        let processed = factor_processing(
            &section.factor_matrix(&features),
            &DEFAULT_PRE_PROCESS,
            exposure.as_ref(),
            &DEFAULT_POST_PROCESS,
        )?;
        let er = alpha.predict(&processed)?;

        let solved = self.covariance(section, risk).and_then(|cov| {
            self.solver.solve(&RebalanceProblem {
                codes: &section.codes,
                er: &er,
                benchmark: &section.benchmark,
                current: &current,
                bounds: &bounds,
                constraints: &constraints,
                covariance: cov.as_ref(),
            })
        });

        let (weights, ok) = match solved {
            Ok(weights) => (weights, true),
            Err(error) => {
                warn!(
                    trade_date = %section.trade_date,
                    %error,
                    "rebalance failed, falling back to {}",
                    if params.is_benchmark { "benchmark" } else { "current position" }
                );
                let fallback = if params.is_benchmark {
                    section.benchmark.clone()
                } else {
                    current
                };
                (fallback, false)
            }
        };

        Ok(Position {
            trade_date: section.trade_date,
            codes: section.codes.clone(),
            weights,
            industries: section.industries.clone(),
            er,
            benchmark: section.benchmark.clone(),
            solved: ok,
        })
    }

    /// Covariance required by the configured method, `None` for `linear`.
    fn covariance(
        &self,
        section: &CrossSection,
        risk: Option<&dyn RiskModel>,
    ) -> std::result::Result<Option<Array2<f64>>, SolveError> {
        let method = self.solver.method();
        if !method.needs_risk() {
            return Ok(None);
        }
        let model = risk.ok_or_else(|| {
            SolveError::MissingRiskModel(format!("no risk model scheduled for {method}"))
        })?;
        let unavailable = |e: CadizError| SolveError::MissingRiskModel(e.to_string());
        let structure = model.factor_structure(&section.codes);
        let cov = match (method, structure) {
            (RebalanceMethod::Fmv | RebalanceMethod::Tv, Some(result)) => {
                result.map_err(unavailable)?.covariance()
            }
            (RebalanceMethod::Fmv, None) => {
                return Err(SolveError::MissingRiskModel(
                    "fmv needs a factor risk model".to_string(),
                ));
            }
            _ => model
                .covariance(&section.codes, &self.params.covariance_opts())
                .map_err(unavailable)?,
        };
        Ok(Some(cov))
    }
}
