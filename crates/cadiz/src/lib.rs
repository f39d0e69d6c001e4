#![doc(issue_tracker_base_url = "https://github.com/factordynamics/cadiz/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! # cadiz
//!
//! Factor-driven portfolio rebalancing and backtest engine.
//!
//! cadiz is an umbrella crate that re-exports all cadiz sub-crates and wires
//! them into a single [`Strategy`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use cadiz::prelude::*;
//! use cadiz::portfolio::{BoundaryType, ParameterBuilder, RebalanceMethod};
//! use ndarray::array;
//!
//! # fn run(panel: FactorPanel) -> cadiz::Result<()> {
//! let params = ParameterBuilder::new()
//!     .benchmark_band(0.8, 1.001, BoundaryType::Relative)
//!     .rebalance_method(RebalanceMethod::Linear)
//!     .build()?;
//!
//! let alpha = ConstLinearModel::new(vec!["factor".into()], array![1.0])?;
//! let alpha_models = ModelSchedule::constant(Box::new(alpha) as Box<dyn AlphaModel>);
//!
//! let outcome = Strategy::new(params).run(panel, &alpha_models, None)?;
//! for report in &outcome.reports {
//!     println!("{}: {:.2}", report.name, report.sharpe_ratio);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate Organization
//!
//! - [`traits`] - Panel data model, collaborator traits and statistics
//! - [`process`] - Imputation, winsorization, standardization, neutralization
//! - [`combine`] - Composite factor synthesis
//! - [`portfolio`] - Parameters, constraints and the rebalancer
//! - [`eval`] - Execution, returns and performance attribution
//!
//! ## Pipeline
//!
//! 1. **Preprocessor** imputes and standardizes the raw factors
//! 2. **Synthesizer** combines them into the composite `factor`
//! 3. **Rebalancer** solves a constrained portfolio on every trade date
//! 4. **Backtester** executes the positions and attributes the returns

mod strategy;

pub use strategy::{BacktestOutcome, OutcomeSummary, Strategy};

/// Version information for the cadiz crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Core Types
// ============================================================================

/// Shared data model, collaborator traits and numeric primitives.
pub mod traits {
    pub use cadiz_traits::*;
}

pub use cadiz_traits::{
    AlphaModel, CadizError, Code, ConstLinearModel, Date, FactorPanel, ModelSchedule, Period,
    Result, RiskModel,
};

// ============================================================================
// Stages
// ============================================================================

/// Factor preprocessing.
///
/// Missing values are filled with the industry median, then every factor is
/// winsorized at three standard deviations and standardized per trade date,
/// optionally neutralized against industries and style factors.
pub mod process {
    pub use cadiz_process::*;
}

/// Composite factor synthesis.
///
/// ## Methods
///
/// - **equal**: every factor weighs the same
/// - **ic_equal / ic_half**: trailing mean IC, flat or half-life weighted
/// - **ret_equal / ret_half**: trailing mean factor return
/// - **max_ic_sample / max_ic_shrunk**: IC-ratio maximizing weights
///
/// ```text
/// w ∝ Σ⁻¹ μ      (max_ic, Σ sample or Ledoit-Wolf covariance)
/// ```
pub mod combine {
    pub use cadiz_combine::*;
}

/// Strategy parameters and the per-date rebalancer.
pub mod portfolio {
    pub use cadiz_portfolio::*;
}

/// Naive execution and performance attribution.
pub mod eval {
    pub use cadiz_eval::*;
}

// ============================================================================
// Prelude
// ============================================================================

/// Prelude module for convenient imports.
///
/// ```
/// use cadiz::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{BacktestOutcome, Strategy};
    pub use crate::{AlphaModel, ConstLinearModel, FactorPanel, ModelSchedule, RiskModel};
    pub use crate::{CadizError, Result};
}
