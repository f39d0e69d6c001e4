#![doc(issue_tracker_base_url = "https://github.com/factordynamics/cadiz/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

//! Cross-sectional factor preprocessing.
//!
//! Missing exposures are filled with their industry median, then every trade
//! date is processed independently: winsorize, standardize, optionally
//! neutralize against industries and style factors, standardize again.

pub mod impute;
pub mod preprocessor;
pub mod processing;

pub use impute::impute_industry_median;
pub use preprocessor::{PreprocessConfig, Preprocessor};
pub use processing::{
    DEFAULT_POST_PROCESS, DEFAULT_PRE_PROCESS, ProcessStep, factor_processing, risk_exposure,
};
