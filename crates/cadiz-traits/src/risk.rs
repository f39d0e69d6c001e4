//! Risk model collaborators.
//!
//! The engine never estimates risk itself; it asks an injected [`RiskModel`]
//! for the covariance of the codes trading on a date. Mean-variance
//! rebalancing uses the full covariance, factor mean-variance uses the
//! [`FactorStructure`] when the model exposes one.

use std::collections::HashMap;
use std::fmt::Debug;

use derive_more::Display;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{CadizError, Result};
use crate::types::Code;

/// How a risk model should treat its covariance estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CovMethod {
    /// Raw estimate.
    #[default]
    #[display("unshrunk")]
    Unshrunk,
    /// Shrinkage estimate.
    #[display("shrunk")]
    Shrunk,
}

/// Estimation options forwarded to a [`RiskModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CovarianceOpts {
    /// Number of trailing periods the estimate should cover.
    pub windows: usize,
    /// Raw or shrunk estimate.
    pub method: CovMethod,
}

impl Default for CovarianceOpts {
    fn default() -> Self {
        Self {
            windows: 20,
            method: CovMethod::Unshrunk,
        }
    }
}

/// Factor decomposition `Σ = B F Bᵀ + diag(D)` for a list of codes.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorStructure {
    /// Factor loadings `B`, one row per code.
    pub loadings: Array2<f64>,
    /// Factor covariance `F`.
    pub factor_cov: Array2<f64>,
    /// Specific variances `D`, one per code.
    pub specific: Array1<f64>,
}

impl FactorStructure {
    /// Assembles the full covariance matrix.
    pub fn covariance(&self) -> Array2<f64> {
        let mut cov = self.loadings.dot(&self.factor_cov).dot(&self.loadings.t());
        for (i, d) in self.specific.iter().enumerate() {
            cov[[i, i]] += d;
        }
        cov
    }
}

/// A source of asset covariance for one trade date.
pub trait RiskModel: Send + Sync + Debug {
    /// Covariance matrix of `codes`, rows and columns in the given order.
    ///
    /// # Errors
    ///
    /// Returns an error when a code is not covered by the model.
    fn covariance(&self, codes: &[Code], opts: &CovarianceOpts) -> Result<Array2<f64>>;

    /// Factor decomposition of the covariance, for models that have one.
    fn factor_structure(&self, _codes: &[Code]) -> Option<Result<FactorStructure>> {
        None
    }
}

/// Risk model defined by factor loadings, a factor covariance and specific risk.
///
/// The model is fixed, so estimation options are ignored.
#[derive(Debug, Clone)]
pub struct FactorRiskModel {
    factor_cov: Array2<f64>,
    loadings: HashMap<Code, Array1<f64>>,
    specific: HashMap<Code, f64>,
}

impl FactorRiskModel {
    /// Creates a factor risk model.
    pub fn new(
        factor_cov: Array2<f64>,
        loadings: HashMap<Code, Array1<f64>>,
        specific: HashMap<Code, f64>,
    ) -> Result<Self> {
        let k = factor_cov.nrows();
        if factor_cov.ncols() != k {
            return Err(CadizError::InvalidData(
                "factor covariance must be square".to_string(),
            ));
        }
        if let Some((code, _)) = loadings.iter().find(|(_, l)| l.len() != k) {
            return Err(CadizError::InvalidData(format!(
                "loadings of '{code}' do not match {k} factors"
            )));
        }
        Ok(Self {
            factor_cov,
            loadings,
            specific,
        })
    }

    fn structure(&self, codes: &[Code]) -> Result<FactorStructure> {
        let k = self.factor_cov.nrows();
        let mut loadings = Array2::zeros((codes.len(), k));
        let mut specific = Array1::zeros(codes.len());
        for (i, code) in codes.iter().enumerate() {
            let row = self.loadings.get(code).ok_or_else(|| {
                CadizError::InvalidData(format!("risk model has no loadings for '{code}'"))
            })?;
            loadings.row_mut(i).assign(row);
            specific[i] = *self.specific.get(code).ok_or_else(|| {
                CadizError::InvalidData(format!("risk model has no specific risk for '{code}'"))
            })?;
        }
        Ok(FactorStructure {
            loadings,
            factor_cov: self.factor_cov.clone(),
            specific,
        })
    }
}

impl RiskModel for FactorRiskModel {
    fn covariance(&self, codes: &[Code], _opts: &CovarianceOpts) -> Result<Array2<f64>> {
        Ok(self.structure(codes)?.covariance())
    }

    fn factor_structure(&self, codes: &[Code]) -> Option<Result<FactorStructure>> {
        Some(self.structure(codes))
    }
}

/// Risk model backed by a full asset covariance matrix.
#[derive(Debug, Clone)]
pub struct CovarianceRiskModel {
    index: HashMap<Code, usize>,
    cov: Array2<f64>,
}

impl CovarianceRiskModel {
    /// Creates a model over `codes` with covariance `cov` (same order).
    pub fn new(codes: Vec<Code>, cov: Array2<f64>) -> Result<Self> {
        if cov.dim() != (codes.len(), codes.len()) {
            return Err(CadizError::InvalidData(format!(
                "covariance is {:?} for {} codes",
                cov.dim(),
                codes.len()
            )));
        }
        let index = codes.into_iter().enumerate().map(|(i, c)| (c, i)).collect();
        Ok(Self { index, cov })
    }
}

impl RiskModel for CovarianceRiskModel {
    fn covariance(&self, codes: &[Code], _opts: &CovarianceOpts) -> Result<Array2<f64>> {
        let rows = codes
            .iter()
            .map(|c| {
                self.index.get(c).copied().ok_or_else(|| {
                    CadizError::InvalidData(format!("risk model does not cover '{c}'"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Array2::from_shape_fn((rows.len(), rows.len()), |(i, j)| {
            self.cov[[rows[i], rows[j]]]
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn codes(names: &[&str]) -> Vec<Code> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_factor_structure_covariance() {
        let model = FactorRiskModel::new(
            array![[0.04]],
            HashMap::from([
                ("A".to_string(), array![1.0]),
                ("B".to_string(), array![0.5]),
            ]),
            HashMap::from([("A".to_string(), 0.01), ("B".to_string(), 0.02)]),
        )
        .unwrap();

        let cov = model
            .covariance(&codes(&["A", "B"]), &CovarianceOpts::default())
            .unwrap();
        assert!((cov[[0, 0]] - 0.05).abs() < 1e-12);
        assert!((cov[[0, 1]] - 0.02).abs() < 1e-12);
        assert!((cov[[1, 1]] - 0.03).abs() < 1e-12);
        assert!(model.factor_structure(&codes(&["B"])).is_some());
    }

    #[test]
    fn test_factor_model_unknown_code() {
        let model = FactorRiskModel::new(array![[0.04]], HashMap::new(), HashMap::new()).unwrap();
        assert!(model
            .covariance(&codes(&["Z"]), &CovarianceOpts::default())
            .is_err());
    }

    #[test]
    fn test_covariance_model_reorders() {
        let model =
            CovarianceRiskModel::new(codes(&["A", "B"]), array![[1.0, 0.1], [0.1, 2.0]]).unwrap();
        let cov = model
            .covariance(&codes(&["B", "A"]), &CovarianceOpts::default())
            .unwrap();
        assert_eq!(cov, array![[2.0, 0.1], [0.1, 1.0]]);
        assert!(model.factor_structure(&codes(&["A"])).is_none());
    }

    #[test]
    fn test_cov_method_display() {
        assert_eq!(CovMethod::default().to_string(), "unshrunk");
        assert_eq!(CovMethod::Shrunk.to_string(), "shrunk");
    }
}
