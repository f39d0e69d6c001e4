#![doc(issue_tracker_base_url = "https://github.com/factordynamics/cadiz/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Constrained portfolio rebalancing for cadiz.
//!
//! [`ParameterBuilder`] assembles validated [`StrategyParams`]. For every
//! trade date the [`Rebalancer`] turns them into per-asset [`BoxBounds`] and
//! [`LinearConstraints`], predicts expected returns with the scheduled alpha
//! model and asks the [`Solver`] for target weights under the configured
//! [`RebalanceMethod`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use cadiz_portfolio::{BoundaryType, ParameterBuilder, RebalanceMethod, Rebalancer};
//! # fn run(
//! #     panel: &cadiz_traits::FactorPanel,
//! #     alpha: &cadiz_portfolio::AlphaSchedule,
//! # ) -> cadiz_traits::Result<()> {
//! let params = ParameterBuilder::new()
//!     .benchmark_band(0.8, 1.001, BoundaryType::Relative)
//!     .rebalance_method(RebalanceMethod::Linear)
//!     .build()?;
//! let positions = Rebalancer::new(&params).run(panel, alpha, None)?;
//! println!("{} fallback dates", positions.fallback_dates().len());
//! # Ok(())
//! # }
//! ```

mod admm;
mod bounds;
mod constraints;
mod position;
mod rebalance;
mod settings;
mod solver;

pub use admm::{AdmmSettings, QpSolution, solve_qp};
pub use bounds::{BoxBounds, create_box_bounds};
pub use constraints::{BENCHMARK, LinearConstraints, TOTAL};
pub use position::{Position, PositionHistory};
pub use rebalance::{AlphaSchedule, Rebalancer, RiskSchedule};
pub use settings::{
    BoundSpec, BoundaryType, BoundarySpec, ParamOverrides, ParameterBuilder, StrategyParams,
};
pub use solver::{RebalanceMethod, RebalanceProblem, SolveError, Solver, turnover, turnover_control};
