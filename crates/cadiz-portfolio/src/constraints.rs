//! Linear constraints of one rebalance.

use ndarray::{Array1, Array2};

use crate::settings::{BoundarySpec, StrategyParams};

/// Name of the benchmark-membership constraint.
pub const BENCHMARK: &str = "benchmark";
/// Name of the total-weight constraint.
pub const TOTAL: &str = "total";

/// Constraints `lower ≤ Aᵀ w ≤ upper`, one column of `A` per constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraints {
    names: Vec<String>,
    matrix: Array2<f64>,
    lower: Array1<f64>,
    upper: Array1<f64>,
}

impl LinearConstraints {
    /// No constraint on `n` assets.
    pub fn empty(n: usize) -> Self {
        Self {
            names: Vec::new(),
            matrix: Array2::zeros((n, 0)),
            lower: Array1::zeros(0),
            upper: Array1::zeros(0),
        }
    }

    /// Builds the industry, benchmark-membership and total-weight
    /// constraints of a cross-section.
    ///
    /// Each constraint's band is centered on the benchmark's exposure to it.
    /// An industry gets the invalid band when it is listed as invalid, the
    /// effective band when it is listed as effective (or when no industry is
    /// listed as effective), and no constraint otherwise.
    pub fn build(industries: &[String], benchmark: &Array1<f64>, params: &StrategyParams) -> Self {
        let n = industries.len();
        let mut distinct: Vec<&String> = industries.iter().collect();
        distinct.sort();
        distinct.dedup();

        let mut out = Self::empty(n);
        let mut columns: Vec<Array1<f64>> = Vec::new();
        for industry in distinct {
            let band = if params.invalid_industries.contains(industry) {
                params.invalid_industry
            } else if params.effective_industries.is_empty()
                || params.effective_industries.contains(industry)
            {
                params.effective_industry
            } else {
                continue;
            };
            let column: Array1<f64> = industries
                .iter()
                .map(|i| if i == industry { 1.0 } else { 0.0 })
                .collect();
            out.push_row(industry.clone(), &column, benchmark, &band, &mut columns);
        }

        let members: Array1<f64> = benchmark.mapv(|b| if b > 0.0 { 1.0 } else { 0.0 });
        out.push_row(BENCHMARK.to_string(), &members, benchmark, &params.benchmark, &mut columns);
        let ones = Array1::ones(n);
        out.push_row(TOTAL.to_string(), &ones, benchmark, &params.total, &mut columns);

        out.matrix = Array2::from_shape_fn((n, columns.len()), |(i, j)| columns[j][i]);
        out
    }

    fn push_row(
        &mut self,
        name: String,
        column: &Array1<f64>,
        benchmark: &Array1<f64>,
        band: &BoundarySpec,
        columns: &mut Vec<Array1<f64>>,
    ) {
        let center = column.dot(benchmark);
        let (lower, upper) = band.bounds(center);
        self.names.push(name);
        self.lower = append(&self.lower, lower);
        self.upper = append(&self.upper, upper);
        columns.push(column.clone());
    }

    /// Constraint names, one per column of [`Self::matrix`].
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Constraint matrix `A`, assets × constraints.
    pub const fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    /// Lower limits.
    pub const fn lower(&self) -> &Array1<f64> {
        &self.lower
    }

    /// Upper limits.
    pub const fn upper(&self) -> &Array1<f64> {
        &self.upper
    }

    /// Number of constraints.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns whether there is no constraint.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// First constraint whose band is inverted.
    pub fn first_inverted(&self) -> Option<&str> {
        self.lower
            .iter()
            .zip(&self.upper)
            .position(|(l, u)| l > u)
            .map(|i| self.names[i].as_str())
    }

    /// Returns whether `weights` satisfies every constraint within `tol`.
    pub fn is_satisfied(&self, weights: &Array1<f64>, tol: f64) -> bool {
        let exposure = self.matrix.t().dot(weights);
        exposure
            .iter()
            .zip(&self.lower)
            .zip(&self.upper)
            .all(|((x, l), u)| *x >= l - tol && *x <= u + tol)
    }
}

fn append(values: &Array1<f64>, value: f64) -> Array1<f64> {
    values.iter().copied().chain(std::iter::once(value)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{BoundaryType, ParameterBuilder};
    use approx::assert_relative_eq;
    use ndarray::array;

    fn industries() -> Vec<String> {
        ["bank", "bank", "tech", "util"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_all_industries_effective_by_default() {
        let params = ParameterBuilder::new()
            .benchmark_band(0.8, 1.0, BoundaryType::Relative)
            .build()
            .unwrap();
        let b = array![0.3, 0.2, 0.5, 0.0];
        let cons = LinearConstraints::build(&industries(), &b, &params);

        assert_eq!(cons.names(), &["bank", "tech", "util", BENCHMARK, TOTAL]);
        assert_relative_eq!(cons.lower()[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(cons.upper()[0], 0.7, epsilon = 1e-12);
        assert_eq!(cons.matrix().column(1).to_vec(), vec![0.0, 0.0, 1.0, 0.0]);
        assert_eq!(cons.matrix().column(3).to_vec(), vec![1.0, 1.0, 1.0, 0.0]);
        assert_relative_eq!(cons.lower()[3], 0.8, epsilon = 1e-12);
        assert_relative_eq!(cons.upper()[4], 1.01, epsilon = 1e-12);
        assert!(cons.is_satisfied(&b, 1e-9));
    }

    #[test]
    fn test_effective_and_invalid_lists() {
        let params = ParameterBuilder::new()
            .benchmark_band(0.8, 1.0, BoundaryType::Relative)
            .effective_industries(vec!["tech".into()])
            .invalid_industries(vec!["util".into()])
            .invalid_industry_band(0.0, 0.0, BoundaryType::Absolute)
            .build()
            .unwrap();
        let b = array![0.3, 0.2, 0.5, 0.0];
        let cons = LinearConstraints::build(&industries(), &b, &params);

        assert_eq!(cons.names(), &["tech", "util", BENCHMARK, TOTAL]);
        assert_eq!(cons.upper()[1], 0.0);
        assert!(cons.first_inverted().is_none());
    }

    #[test]
    fn test_violation_detected() {
        let params = ParameterBuilder::new()
            .benchmark_band(0.8, 1.0, BoundaryType::Relative)
            .build()
            .unwrap();
        let b = array![0.3, 0.2, 0.5, 0.0];
        let cons = LinearConstraints::build(&industries(), &b, &params);
        assert!(!cons.is_satisfied(&array![1.0, 0.0, 0.0, 0.0], 1e-9));
    }
}
