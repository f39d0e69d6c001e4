//! Per-asset weight bounds.

use ndarray::Array1;

use crate::settings::StrategyParams;

/// Lower and upper weight of every asset.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxBounds {
    /// Lower bounds.
    pub lower: Array1<f64>,
    /// Upper bounds.
    pub upper: Array1<f64>,
}

impl BoxBounds {
    /// First asset whose lower bound exceeds its upper bound.
    pub fn first_inverted(&self) -> Option<usize> {
        self.lower.iter().zip(&self.upper).position(|(l, u)| l > u)
    }

    /// Clamps `weights` into the box.
    pub fn clip(&self, weights: &Array1<f64>) -> Array1<f64> {
        ndarray::Zip::from(weights)
            .and(&self.lower)
            .and(&self.upper)
            .map_collect(|&w, &l, &u| w.max(l).min(u))
    }

    /// Returns whether `weights` lies inside the box within `tol`.
    pub fn contains(&self, weights: &Array1<f64>, tol: f64) -> bool {
        ndarray::Zip::from(weights)
            .and(&self.lower)
            .and(&self.upper)
            .all(|&w, &l, &u| w >= l - tol && w <= u + tol)
    }
}

/// Builds the per-asset bounds of one cross-section.
///
/// With a bandwidth `bw` every asset starts at `[max(0, b − bw), b + bw]`
/// around its benchmark weight `b`, otherwise at `[0, 1]`. Explicit `lbound`
/// and `ubound` then replace the corresponding side.
pub fn create_box_bounds(codes: &[String], benchmark: &Array1<f64>, params: &StrategyParams) -> BoxBounds {
    let (mut lower, mut upper) = match params.weights_bandwidth {
        Some(bw) => (
            benchmark.mapv(|b| (b - bw).max(0.0)),
            benchmark.mapv(|b| b + bw),
        ),
        None => (Array1::zeros(codes.len()), Array1::ones(codes.len())),
    };
    if let Some(lbound) = &params.lbound {
        lower = codes.iter().map(|c| lbound.value_for(c)).collect();
    }
    if let Some(ubound) = &params.ubound {
        upper = codes.iter().map(|c| ubound.value_for(c)).collect();
    }
    BoxBounds { lower, upper }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{BoundSpec, BoundaryType, ParameterBuilder};
    use approx::assert_relative_eq;
    use ndarray::array;
    use std::collections::BTreeMap;

    fn codes() -> Vec<String> {
        vec!["A".into(), "B".into()]
    }

    fn builder() -> ParameterBuilder {
        ParameterBuilder::new().benchmark_band(0.8, 1.0, BoundaryType::Relative)
    }

    #[test]
    fn test_bandwidth_only() {
        let params = builder().lbound(None).ubound(None).build().unwrap();
        let bounds = create_box_bounds(&codes(), &array![0.05, 0.5], &params);
        assert_eq!(bounds.lower[0], 0.0);
        assert_relative_eq!(bounds.lower[1], 0.4, epsilon = 1e-12);
        assert_relative_eq!(bounds.upper[0], 0.15, epsilon = 1e-12);
        assert_relative_eq!(bounds.upper[1], 0.6, epsilon = 1e-12);
    }

    #[test]
    fn test_explicit_bounds_override_bandwidth() {
        let mut map = BTreeMap::new();
        map.insert("A".to_string(), 0.3);
        map.insert(BoundSpec::OTHER.to_string(), 0.02);
        let params = builder()
            .lbound(Some(BoundSpec::Scalar(0.01)))
            .ubound(Some(BoundSpec::PerCode(map)))
            .build()
            .unwrap();
        let bounds = create_box_bounds(&codes(), &array![0.05, 0.5], &params);
        assert_eq!(bounds.lower.to_vec(), vec![0.01, 0.01]);
        assert_eq!(bounds.upper.to_vec(), vec![0.3, 0.02]);
    }

    #[test]
    fn test_no_limits_at_all() {
        let params = builder()
            .lbound(None)
            .ubound(None)
            .weights_bandwidth(None)
            .build()
            .unwrap();
        let bounds = create_box_bounds(&codes(), &array![0.05, 0.5], &params);
        assert_eq!(bounds.lower.to_vec(), vec![0.0, 0.0]);
        assert_eq!(bounds.upper.to_vec(), vec![1.0, 1.0]);
    }

    #[test]
    fn test_clip_and_inverted() {
        let bounds = BoxBounds {
            lower: array![0.0, 0.2],
            upper: array![0.1, 0.1],
        };
        assert_eq!(bounds.first_inverted(), Some(1));
        let clipped = bounds.clip(&array![0.5, -1.0]);
        assert_eq!(clipped[0], 0.1);
        assert!(!bounds.contains(&array![0.5, 0.1], 1e-9));
    }
}
