#![doc(issue_tracker_base_url = "https://github.com/factordynamics/cadiz/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Composite alpha synthesis for cadiz.
//!
//! This crate combines several processed factors into one composite factor
//! per trade date. It implements equal weighting, IC and factor-return
//! weighting (with optional half-life decay) and IC-ratio maximization, and
//! can orthogonalize the factors first.
//!
//! # Examples
//!
//! ```rust,no_run
//! use cadiz_combine::{CombineMethod, CombineSpec, combine};
//! # fn run(panel: &cadiz_traits::FactorPanel) -> cadiz_traits::Result<()> {
//! let spec = CombineSpec {
//!     method: CombineMethod::IcHalf,
//!     ..Default::default()
//! };
//! let composite = combine(panel, &spec)?;
//! println!("{} dates", composite.sections().len());
//! # Ok(())
//! # }
//! ```

mod combiner;
mod equal_weight;
mod history;
mod ic_weight;
mod max_ic;
mod method;
mod orthogonal;
mod synthesizer;

// Re-export main types
pub use combiner::{CombineContext, Combiner, apply_weights, equal_weights};
pub use equal_weight::EqualWeightCombiner;
pub use history::{FactorHistory, Statistic, factor_return};
pub use ic_weight::{HistoryWeightedCombiner, HistoryWeightedConfig};
pub use max_ic::{MaxIcCombiner, nonnegative_quadratic, solve_unconstrained};
pub use method::{CombineMethod, CombineSpec};
pub use orthogonal::{OrthMethod, orthogonalize};
pub use synthesizer::{COMPOSITE_FACTOR, Composite, CompositeSection, combine, resolve_factors};
