#![doc(issue_tracker_base_url = "https://github.com/factordynamics/cadiz/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core data model and collaborator traits for the cadiz rebalancing engine.
//!
//! This crate provides the cross-sectional factor panel, the shared error
//! type, the numeric primitives used by preprocessing and synthesis, and the
//! alpha / risk model traits the rebalancer consumes.

/// The version of the cadiz-traits crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Module declarations
pub mod alpha;
pub mod error;
pub mod panel;
pub mod risk;
pub mod schedule;
pub mod stats;
pub mod types;

// Re-exports
pub use alpha::{AlphaModel, ConstLinearModel};
pub use error::{CadizError, Result};
pub use panel::{CrossSection, FactorPanel};
pub use risk::{
    CovMethod, CovarianceOpts, CovarianceRiskModel, FactorRiskModel, FactorStructure, RiskModel,
};
pub use schedule::ModelSchedule;
pub use types::{Code, Date, Period};
