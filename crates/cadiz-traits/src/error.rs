//! Error types for the cadiz engine.
//!
//! This module defines the error type shared by the preprocessing, synthesis,
//! rebalancing and backtesting stages. Per-date solver failures have their own
//! type in `cadiz-portfolio` because they are always recovered locally.

use thiserror::Error;

use crate::types::Date;

/// The main error type for cadiz operations.
#[derive(Debug, Error)]
pub enum CadizError {
    /// Error due to invalid or malformed data.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Error when a required column is missing from the data.
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// A configuration value is inconsistent or unsupported.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Error from Polars operations.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Error when data is insufficient for the requested operation.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Error when a date is out of range or cannot be parsed.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// No alpha or risk model is scheduled for a trade date.
    #[error("No {kind} model available for {date}")]
    MissingModel {
        /// Which collaborator was missing ("alpha" or "risk").
        kind: &'static str,
        /// The trade date that was being processed.
        date: Date,
    },

    /// Generic error for other cases.
    #[error("Error: {0}")]
    Other(String),
}

impl From<String> for CadizError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<&str> for CadizError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

/// A specialized Result type for cadiz operations.
pub type Result<T> = std::result::Result<T, CadizError>;
