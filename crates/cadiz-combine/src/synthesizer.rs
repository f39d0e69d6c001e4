//! The synthesis stage: turns a processed panel into one composite factor.

use cadiz_traits::panel::{CODE, NXT1_RET, TRADE_DATE};
use cadiz_traits::types::DATE_FORMAT;
use cadiz_traits::{CadizError, Code, Date, FactorPanel, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use tracing::{debug, info};

use crate::combiner::{CombineContext, apply_weights};
use crate::history::FactorHistory;
use crate::method::{CombineMethod, CombineSpec};
use crate::orthogonal::orthogonalize;

/// Name of the composite factor column.
pub const COMPOSITE_FACTOR: &str = "factor";

/// Composite factor of one trade date.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeSection {
    /// Trade date.
    pub trade_date: Date,
    /// Codes in ascending order.
    pub codes: Vec<Code>,
    /// Composite alpha, one value per code.
    pub factor: Array1<f64>,
    /// Log forward return, one value per code.
    pub nxt1_ret: Array1<f64>,
    /// Raw factor weights chosen for this date.
    pub weights: Array1<f64>,
}

/// Composite factor series together with the statistics used to build it.
#[derive(Debug, Clone, PartialEq)]
pub struct Composite {
    method: CombineMethod,
    factor_names: Vec<String>,
    sections: Vec<CompositeSection>,
    history: FactorHistory,
}

impl Composite {
    /// Method that produced the composite.
    pub const fn method(&self) -> CombineMethod {
        self.method
    }

    /// Factors that were combined, in weight order.
    pub fn factor_names(&self) -> &[String] {
        &self.factor_names
    }

    /// Per-date composites in ascending date order.
    pub fn sections(&self) -> &[CompositeSection] {
        &self.sections
    }

    /// IC and factor-return history of the combined factors.
    pub const fn history(&self) -> &FactorHistory {
        &self.history
    }

    /// Composite values, one vector per trade date.
    pub fn factor_columns(&self) -> Vec<Array1<f64>> {
        self.sections.iter().map(|s| s.factor.clone()).collect()
    }

    /// Adds the composite to `panel` as the column [`COMPOSITE_FACTOR`].
    ///
    /// # Errors
    ///
    /// Returns an error if `panel` does not have the same dates and codes.
    pub fn attach(&self, panel: FactorPanel) -> Result<FactorPanel> {
        for (section, composite) in panel.sections().iter().zip(&self.sections) {
            if section.trade_date != composite.trade_date || section.codes != composite.codes {
                return Err(CadizError::InvalidData(format!(
                    "composite does not match the panel on {}",
                    section.trade_date
                )));
            }
        }
        panel.with_factor(COMPOSITE_FACTOR, self.factor_columns())
    }

    /// Long-format `DataFrame` sorted by `(trade_date, code)` with columns
    /// `trade_date`, `code`, `factor` and `nxt1_ret`.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut dates = Vec::new();
        let mut codes = Vec::new();
        let mut factor = Vec::new();
        let mut nxt1 = Vec::new();
        for s in &self.sections {
            let date = s.trade_date.format(DATE_FORMAT).to_string();
            dates.extend(std::iter::repeat_n(date, s.codes.len()));
            codes.extend(s.codes.iter().cloned());
            factor.extend(s.factor.iter().copied());
            nxt1.extend(s.nxt1_ret.iter().copied());
        }
        Ok(DataFrame::new(vec![
            Column::new(TRADE_DATE.into(), dates),
            Column::new(CODE.into(), codes),
            Column::new(COMPOSITE_FACTOR.into(), factor),
            Column::new(NXT1_RET.into(), nxt1),
        ])?)
    }
}

/// Factors `spec` combines on `panel`.
pub fn resolve_factors(panel: &FactorPanel, spec: &CombineSpec) -> Vec<String> {
    if spec.factors.is_empty() {
        panel
            .factor_names()
            .iter()
            .filter(|n| n.as_str() != COMPOSITE_FACTOR)
            .cloned()
            .collect()
    } else {
        spec.factors.clone()
    }
}

/// Combines the factors of `panel` into a composite alpha, date by date.
///
/// History-based methods only use statistics of dates strictly before the
/// date being combined.
///
/// # Errors
///
/// Returns an error for an invalid spec, an unknown factor, no factor at all,
/// or factors the requested orthogonalization cannot handle.
pub fn combine(panel: &FactorPanel, spec: &CombineSpec) -> Result<Composite> {
    spec.validate()?;
    let factor_names = resolve_factors(panel, spec);
    if factor_names.is_empty() {
        return Err(CadizError::InvalidConfig(
            "no factor to combine".to_string(),
        ));
    }
    let columns = panel.factor_indices(&factor_names)?;

    let exposures = panel
        .sections()
        .iter()
        .map(|s| {
            let x = s.factor_matrix(&columns);
            match spec.orthogonalize {
                Some(method) => orthogonalize(&x, method),
                None => Ok(x),
            }
        })
        .collect::<Result<Vec<Array2<f64>>>>()?;
    let forwards: Vec<Array1<f64>> = panel.sections().iter().map(|s| s.nxt1_ret.clone()).collect();
    let history = FactorHistory::compute(factor_names.clone(), panel.dates(), &exposures, &forwards);

    let combiner = spec.combiner();
    let mut sections = Vec::with_capacity(panel.len());
    for (date_index, (section, x)) in panel.sections().iter().zip(&exposures).enumerate() {
        let ctx = CombineContext {
            exposures: x,
            history: &history,
            date_index,
        };
        let weights = combiner.weights(&ctx)?;
        let factor = apply_weights(x, &weights)?;
        debug!(
            trade_date = %section.trade_date,
            method = combiner.name(),
            weights = ?weights.to_vec(),
            "combined factors"
        );
        sections.push(CompositeSection {
            trade_date: section.trade_date,
            codes: section.codes.clone(),
            factor,
            nxt1_ret: section.nxt1_ret.clone(),
            weights,
        });
    }

    info!(
        method = %spec.method,
        factors = factor_names.len(),
        dates = sections.len(),
        "synthesized composite factor"
    );
    Ok(Composite {
        method: spec.method,
        factor_names,
        sections,
        history,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orthogonal::OrthMethod;
    use approx::assert_relative_eq;
    use cadiz_traits::CrossSection;
    use ndarray::array;

    fn panel() -> FactorPanel {
        let day = |d| Date::from_ymd_opt(2020, 1, d).unwrap();
        let codes: Vec<String> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();
        let industries = vec!["x".to_string(); 3];
        let closes = [[10.0, 20.0, 30.0], [11.0, 20.0, 27.0], [12.1, 20.0, 24.3]];
        let sections = closes
            .iter()
            .enumerate()
            .map(|(i, close)| {
                CrossSection::new(
                    day(i as u32 + 2),
                    codes.clone(),
                    industries.clone(),
                    close.to_vec(),
                    vec![1.0 / 3.0; 3],
                    array![[1.0, -1.0], [0.0, 0.5], [-1.0, 0.5]],
                )
                .unwrap()
            })
            .collect();
        FactorPanel::from_sections(vec!["mom".into(), "rev".into()], sections)
            .unwrap()
            .with_forward_returns()
    }

    #[test]
    fn test_equal_combination() {
        let composite = combine(&panel(), &CombineSpec::default()).unwrap();
        assert_eq!(composite.sections().len(), 3);
        let first = &composite.sections()[0];
        assert_relative_eq!(first.factor[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(first.factor[1], 0.25, epsilon = 1e-12);
        assert!(composite.sections()[2].nxt1_ret.iter().all(|r| r.is_nan()));
    }

    #[test]
    fn test_ic_weighting_uses_prior_dates_only() {
        let spec = CombineSpec {
            method: CombineMethod::IcEqual,
            ..Default::default()
        };
        let composite = combine(&panel(), &spec).unwrap();

        assert_eq!(composite.sections()[0].weights.to_vec(), vec![0.5, 0.5]);
        // "mom" ranks forward returns perfectly on the first date.
        let w = &composite.sections()[1].weights;
        assert_relative_eq!(w[0], 1.0, epsilon = 1e-12);
        assert!(w[1] < 0.0);
    }

    #[test]
    fn test_attach_adds_factor_column() {
        let data = panel();
        let composite = combine(&data, &CombineSpec::default()).unwrap();
        let attached = composite.attach(data).unwrap();
        assert_eq!(attached.factor_names().last().unwrap(), COMPOSITE_FACTOR);

        let recombined = combine(&attached, &CombineSpec::default()).unwrap();
        assert_eq!(recombined.factor_names().len(), 2);
    }

    #[test]
    fn test_dataframe_export() {
        let composite = combine(&panel(), &CombineSpec::default()).unwrap();
        let df = composite.to_dataframe().unwrap();
        assert_eq!(df.height(), 9);
        assert_eq!(df.width(), 4);
    }

    #[test]
    fn test_orthogonalized_combination() {
        let spec = CombineSpec {
            orthogonalize: Some(OrthMethod::Schmidt),
            ..Default::default()
        };
        assert!(combine(&panel(), &spec).is_ok());
    }

    #[test]
    fn test_unknown_factor() {
        let spec = CombineSpec {
            factors: vec!["missing".into()],
            ..Default::default()
        };
        assert!(matches!(
            combine(&panel(), &spec),
            Err(CadizError::MissingColumn(_))
        ));
    }
}
