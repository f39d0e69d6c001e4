//! Alpha model trait for generating expected returns.
//!
//! An alpha model maps processed factor exposures of one cross-section to
//! expected returns (`er`). The rebalancer resolves one model per trade date
//! through a [`ModelSchedule`](crate::schedule::ModelSchedule), processes the
//! model's declared features and calls [`AlphaModel::predict`].

use std::fmt::Debug;

use ndarray::{Array1, Array2};

use crate::error::{CadizError, Result};

/// An alpha model that generates expected return forecasts.
///
/// # Example
///
/// ```
/// use cadiz_traits::{AlphaModel, ConstLinearModel};
/// use ndarray::array;
///
/// let model = ConstLinearModel::new(vec!["factor".to_string()], array![1.0]).unwrap();
/// let er = model.predict(&array![[0.5], [-0.5]]).unwrap();
/// assert_eq!(er.to_vec(), vec![0.5, -0.5]);
/// ```
pub trait AlphaModel: Send + Sync + Debug {
    /// Factor columns the model consumes, in the column order expected by
    /// [`AlphaModel::predict`].
    fn features(&self) -> &[String];

    /// Predicts expected returns for a cross-section.
    ///
    /// `x` has one row per security and one column per entry of
    /// [`AlphaModel::features`].
    ///
    /// # Errors
    ///
    /// Returns an error if `x` does not have one column per feature.
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;
}

/// Linear model with fixed coefficients: `er = x · weights`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstLinearModel {
    features: Vec<String>,
    weights: Array1<f64>,
}

impl ConstLinearModel {
    /// Creates a model from feature names and one coefficient per feature.
    pub fn new(features: Vec<String>, weights: Array1<f64>) -> Result<Self> {
        if features.len() != weights.len() {
            return Err(CadizError::InvalidConfig(format!(
                "{} features but {} weights",
                features.len(),
                weights.len()
            )));
        }
        Ok(Self { features, weights })
    }

    /// Model coefficients.
    pub const fn weights(&self) -> &Array1<f64> {
        &self.weights
    }
}

impl AlphaModel for ConstLinearModel {
    fn features(&self) -> &[String] {
        &self.features
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.weights.len() {
            return Err(CadizError::InvalidData(format!(
                "expected {} feature columns, got {}",
                self.weights.len(),
                x.ncols()
            )));
        }
        Ok(x.dot(&self.weights))
    }
}
