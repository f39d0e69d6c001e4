//! Per-date factor processing pipeline.
//!
//! `factor_processing` runs a pre-processing pipeline on every factor column
//! of one cross-section, optionally neutralizes the result against a risk
//! exposure matrix, then runs a post-processing pipeline.

use cadiz_traits::stats::{ols_residuals, standardize, winsorize_normal};
use cadiz_traits::{CrossSection, Result};
use derive_more::Display;
use ndarray::{Array2, Axis, s};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One column-wise transformation in a processing pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStep {
    /// Cap values at `mean ± num_stds × std`.
    #[display("winsorize_normal({num_stds})")]
    WinsorizeNormal {
        /// Number of standard deviations kept.
        num_stds: f64,
    },
    /// Z-score the column.
    #[display("standardize")]
    Standardize,
}

impl ProcessStep {
    /// Default winsorization at three standard deviations.
    pub const fn winsorize() -> Self {
        Self::WinsorizeNormal { num_stds: 3.0 }
    }
}

/// Default pre-processing: winsorize at 3σ, then standardize.
pub const DEFAULT_PRE_PROCESS: [ProcessStep; 2] =
    [ProcessStep::WinsorizeNormal { num_stds: 3.0 }, ProcessStep::Standardize];

/// Default post-processing: standardize.
pub const DEFAULT_POST_PROCESS: [ProcessStep; 1] = [ProcessStep::Standardize];

fn apply_steps(x: &mut Array2<f64>, steps: &[ProcessStep]) {
    for step in steps {
        for mut column in x.axis_iter_mut(Axis(1)) {
            let out = match step {
                ProcessStep::WinsorizeNormal { num_stds } => {
                    winsorize_normal(column.view(), *num_stds)
                }
                ProcessStep::Standardize => {
                    let (out, stats) = standardize(column.view());
                    if !stats.applied {
                        warn!(
                            std = stats.std,
                            "degenerate cross-section, standardized column set to zero"
                        );
                    }
                    out
                }
            };
            column.assign(&out);
        }
    }
}

/// Processes the factor matrix of one cross-section.
///
/// `x` has one row per security and one column per factor. When `risk` is
/// given, the pre-processed factors are replaced by their OLS residuals on
/// the risk exposures before post-processing.
pub fn factor_processing(
    x: &Array2<f64>,
    pre_process: &[ProcessStep],
    risk: Option<&Array2<f64>>,
    post_process: &[ProcessStep],
) -> Result<Array2<f64>> {
    let mut out = x.clone();
    apply_steps(&mut out, pre_process);
    if let Some(risk) = risk {
        out = ols_residuals(&out, risk)?;
    }
    apply_steps(&mut out, post_process);
    Ok(out)
}

/// Risk exposures used for neutralization: the given style columns followed
/// by one-hot industry dummies when `industry` is set.
pub fn risk_exposure(section: &CrossSection, style_columns: &[usize], industry: bool) -> Array2<f64> {
    let styles = section.factor_matrix(style_columns);
    if !industry {
        return styles;
    }
    let dummies = section.industry_dummies();
    let k = styles.ncols();
    let mut out = Array2::zeros((section.len(), k + dummies.ncols()));
    out.slice_mut(s![.., ..k]).assign(&styles);
    out.slice_mut(s![.., k..]).assign(&dummies);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cadiz_traits::Date;
    use ndarray::array;

    #[test]
    fn test_default_pipeline_standardizes() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let out = factor_processing(&x, &DEFAULT_PRE_PROCESS, None, &DEFAULT_POST_PROCESS).unwrap();

        assert_relative_eq!(out.column(0).sum(), 0.0, epsilon = 1e-10);
        let var = out.column(0).mapv(|v| v * v).sum() / 3.0;
        assert_relative_eq!(var, 1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_neutralized_output_has_no_industry_mean() {
        let x = array![[1.0], [3.0], [10.0], [14.0]];
        let risk = array![[1.0, 0.0], [1.0, 0.0], [0.0, 1.0], [0.0, 1.0]];
        let out = factor_processing(&x, &[], Some(&risk), &[]).unwrap();

        assert_relative_eq!(out[[0, 0]] + out[[1, 0]], 0.0, epsilon = 1e-9);
        assert_relative_eq!(out[[2, 0]] + out[[3, 0]], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_degenerate_section_becomes_zero() {
        let x = array![[2.0], [2.0]];
        let out = factor_processing(&x, &DEFAULT_PRE_PROCESS, None, &DEFAULT_POST_PROCESS).unwrap();
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_risk_exposure_layout() {
        let section = CrossSection::new(
            Date::from_ymd_opt(2020, 1, 2).unwrap(),
            vec!["A".into(), "B".into(), "C".into()],
            vec!["x".into(), "y".into(), "x".into()],
            vec![1.0; 3],
            vec![0.3; 3],
            array![[0.1, 5.0], [0.2, 6.0], [0.3, 7.0]],
        )
        .unwrap();

        let risk = risk_exposure(&section, &[1], true);
        assert_eq!(risk.dim(), (3, 3));
        assert_eq!(risk.row(1).to_vec(), vec![6.0, 0.0, 1.0]);

        let styles_only = risk_exposure(&section, &[1], false);
        assert_eq!(styles_only.dim(), (3, 1));
    }

    #[test]
    fn test_step_display() {
        assert_eq!(ProcessStep::Standardize.to_string(), "standardize");
        assert_eq!(ProcessStep::winsorize().to_string(), "winsorize_normal(3)");
    }
}
