//! Strategy parameters and the builder that validates them.
//!
//! [`StrategyParams`] is the typed configuration of one run. It is produced by
//! [`ParameterBuilder`] (or [`StrategyParams::from_overrides`] for a JSON file
//! of [`ParamOverrides`]) and read by every later stage.

use std::collections::BTreeMap;

use cadiz_combine::CombineSpec;
use cadiz_traits::{CadizError, Code, CovMethod, CovarianceOpts, Date, Period, Result};
use derive_more::Display;
use serde::{Deserialize, Deserializer, Serialize};

use crate::solver::RebalanceMethod;

/// Interpretation of a band's limits relative to the benchmark exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryType {
    /// `[center + lower, center + upper]`.
    #[default]
    #[display("absolute")]
    Absolute,
    /// `[center × lower, center × upper]`.
    #[display("relative")]
    Relative,
}

/// Band on a linear exposure, centered on the benchmark's exposure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundarySpec {
    /// Lower limit.
    pub lower: f64,
    /// Upper limit.
    pub upper: f64,
    /// How the limits combine with the benchmark exposure.
    #[serde(default)]
    pub boundary_type: BoundaryType,
}

impl BoundarySpec {
    /// Creates an absolute band.
    pub const fn absolute(lower: f64, upper: f64) -> Self {
        Self {
            lower,
            upper,
            boundary_type: BoundaryType::Absolute,
        }
    }

    /// Creates a relative band.
    pub const fn relative(lower: f64, upper: f64) -> Self {
        Self {
            lower,
            upper,
            boundary_type: BoundaryType::Relative,
        }
    }

    /// Lower and upper limit of the exposure given the benchmark's exposure.
    pub fn bounds(&self, center: f64) -> (f64, f64) {
        match self.boundary_type {
            BoundaryType::Absolute => (center + self.lower, center + self.upper),
            BoundaryType::Relative => (center * self.lower, center * self.upper),
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        if !(self.lower.is_finite() && self.upper.is_finite()) {
            return Err(CadizError::InvalidConfig(format!(
                "{name} band must be finite"
            )));
        }
        if self.lower > self.upper {
            return Err(CadizError::InvalidConfig(format!(
                "{name} band lower {} exceeds upper {}",
                self.lower, self.upper
            )));
        }
        Ok(())
    }
}

/// Per-asset weight limit: one value for every code, or a value per code
/// with an [`BoundSpec::OTHER`] fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BoundSpec {
    /// Same limit for every code.
    Scalar(f64),
    /// Limit per code, `"other"` for the rest.
    PerCode(BTreeMap<Code, f64>),
}

impl BoundSpec {
    /// Key of the fallback entry in a per-code map.
    pub const OTHER: &'static str = "other";

    /// Limit applying to `code`.
    pub fn value_for(&self, code: &str) -> f64 {
        match self {
            Self::Scalar(v) => *v,
            Self::PerCode(map) => map
                .get(code)
                .or_else(|| map.get(Self::OTHER))
                .copied()
                .unwrap_or(f64::NAN),
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        match self {
            Self::Scalar(v) if v.is_finite() => Ok(()),
            Self::Scalar(v) => Err(CadizError::InvalidConfig(format!(
                "{name} must be finite, got {v}"
            ))),
            Self::PerCode(map) => {
                if !map.contains_key(Self::OTHER) {
                    return Err(CadizError::InvalidConfig(format!(
                        "{name} per-code map needs an '{}' entry",
                        Self::OTHER
                    )));
                }
                match map.iter().find(|(_, v)| !v.is_finite()) {
                    Some((code, v)) => Err(CadizError::InvalidConfig(format!(
                        "{name} for '{code}' must be finite, got {v}"
                    ))),
                    None => Ok(()),
                }
            }
        }
    }
}

impl From<f64> for BoundSpec {
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

/// Validated configuration of one strategy run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyParams {
    /// Maximum one-way turnover per rebalance.
    pub turn_over_target: f64,
    /// Active-risk target of the `tv` method.
    pub target_vol: f64,
    /// Explicit per-asset lower bound, overriding the bandwidth bound.
    pub lbound: Option<BoundSpec>,
    /// Explicit per-asset upper bound, overriding the bandwidth bound.
    pub ubound: Option<BoundSpec>,
    /// Covariance estimation window passed to the risk model.
    pub cov_windows: usize,
    /// Covariance estimation method passed to the risk model.
    pub cov_method: CovMethod,
    /// Band on the weight held in benchmark members.
    pub benchmark: BoundarySpec,
    /// Band on the total weight.
    pub total: BoundarySpec,
    /// Band on each effective industry's weight.
    pub effective_industry: BoundarySpec,
    /// Band on each invalid industry's weight.
    pub invalid_industry: BoundarySpec,
    /// Industries constrained by the effective band. Empty means every
    /// industry not listed as invalid.
    pub effective_industries: Vec<String>,
    /// Industries constrained by the invalid band.
    pub invalid_industries: Vec<String>,
    /// Per-asset band `[max(0, b − bw), b + bw]` around the benchmark weight.
    pub weights_bandwidth: Option<f64>,
    /// Optimization used on every trade date.
    pub rebalance_method: RebalanceMethod,
    /// Style factors the alpha is neutralized against.
    pub neutralized_styles: Vec<String>,
    /// Risk aversion of the mean-variance methods.
    pub risk_aversion: f64,
    /// Sampling period of the trade dates.
    pub period: Period,
    /// Fall back to benchmark weights instead of the current position when a
    /// solve fails.
    pub is_benchmark: bool,
    /// Cost per unit of turnover.
    pub transaction_rate: f64,
    /// First trade date rebalanced. `None` starts at the first panel date.
    pub start_date: Option<Date>,
    /// Synthesis settings.
    pub synthetize: CombineSpec,
}

impl Default for StrategyParams {
    /// Documented defaults, before validation.
    ///
    /// The default benchmark band is inverted (`1.001 > 0.8`), so these
    /// values do not pass [`ParameterBuilder::build`] unless the band is
    /// overridden.
    fn default() -> Self {
        Self {
            turn_over_target: 1.0,
            target_vol: 0.1,
            lbound: Some(BoundSpec::Scalar(0.0)),
            ubound: Some(BoundSpec::Scalar(0.04)),
            cov_windows: 20,
            cov_method: CovMethod::Unshrunk,
            benchmark: BoundarySpec::absolute(1.001, 0.8),
            total: BoundarySpec::absolute(-0.001, 0.01),
            effective_industry: BoundarySpec::absolute(0.0, 0.20),
            invalid_industry: BoundarySpec::absolute(0.0, 0.20),
            effective_industries: Vec::new(),
            invalid_industries: Vec::new(),
            weights_bandwidth: Some(0.1),
            rebalance_method: RebalanceMethod::Fmv,
            neutralized_styles: Vec::new(),
            risk_aversion: 1.0,
            period: Period::Daily,
            is_benchmark: false,
            transaction_rate: 0.0,
            start_date: None,
            synthetize: CombineSpec::default(),
        }
    }
}

impl StrategyParams {
    /// Applies `overrides` to the defaults and validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`CadizError::InvalidConfig`] if the result is not valid.
    pub fn from_overrides(overrides: &ParamOverrides) -> Result<Self> {
        ParameterBuilder::new().overrides(overrides).build()
    }

    /// Estimation options forwarded to the risk model.
    pub const fn covariance_opts(&self) -> CovarianceOpts {
        CovarianceOpts {
            windows: self.cov_windows,
            method: self.cov_method,
        }
    }

    /// Checks every band and limit.
    ///
    /// # Errors
    ///
    /// Returns [`CadizError::InvalidConfig`] naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        self.benchmark.validate("benchmark")?;
        self.total.validate("total")?;
        self.effective_industry.validate("effective industry")?;
        self.invalid_industry.validate("invalid industry")?;
        if let Some(lbound) = &self.lbound {
            lbound.validate("lbound")?;
        }
        if let Some(ubound) = &self.ubound {
            ubound.validate("ubound")?;
        }
        if let (Some(BoundSpec::Scalar(l)), Some(BoundSpec::Scalar(u))) = (&self.lbound, &self.ubound)
            && l > u
        {
            return Err(CadizError::InvalidConfig(format!(
                "lbound {l} exceeds ubound {u}"
            )));
        }
        if let Some(bw) = self.weights_bandwidth
            && !(bw.is_finite() && bw >= 0.0)
        {
            return Err(CadizError::InvalidConfig(format!(
                "weights_bandwidth must be non-negative, got {bw}"
            )));
        }
        if !(self.turn_over_target.is_finite() && self.turn_over_target >= 0.0) {
            return Err(CadizError::InvalidConfig(format!(
                "turn_over_target must be non-negative, got {}",
                self.turn_over_target
            )));
        }
        if !(self.target_vol.is_finite() && self.target_vol > 0.0) {
            return Err(CadizError::InvalidConfig(format!(
                "target_vol must be positive, got {}",
                self.target_vol
            )));
        }
        if !(self.risk_aversion.is_finite() && self.risk_aversion > 0.0) {
            return Err(CadizError::InvalidConfig(format!(
                "risk_aversion must be positive, got {}",
                self.risk_aversion
            )));
        }
        if !(self.transaction_rate.is_finite() && self.transaction_rate >= 0.0) {
            return Err(CadizError::InvalidConfig(format!(
                "transaction_rate must be non-negative, got {}",
                self.transaction_rate
            )));
        }
        if self.cov_windows == 0 {
            return Err(CadizError::InvalidConfig(
                "cov_windows must be positive".to_string(),
            ));
        }
        if let Some(industry) = self
            .effective_industries
            .iter()
            .find(|i| self.invalid_industries.contains(*i))
        {
            return Err(CadizError::InvalidConfig(format!(
                "industry '{industry}' is both effective and invalid"
            )));
        }
        self.synthetize.validate()
    }
}

fn double_option<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Any subset of the strategy parameters, as read from a JSON file.
///
/// A missing field keeps the default. `lbound`, `ubound` and
/// `weights_bandwidth` may be set to `null` to remove the default limit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
#[allow(missing_docs)]
pub struct ParamOverrides {
    pub turn_over_target: Option<f64>,
    pub target_vol: Option<f64>,
    #[serde(deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub lbound: Option<Option<BoundSpec>>,
    #[serde(deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub ubound: Option<Option<BoundSpec>>,
    pub cov_windows: Option<usize>,
    pub cov_method: Option<CovMethod>,
    pub benchmark_lower: Option<f64>,
    pub benchmark_upper: Option<f64>,
    pub benchmark_boundary_type: Option<BoundaryType>,
    pub total_lower: Option<f64>,
    pub total_upper: Option<f64>,
    pub total_boundary_type: Option<BoundaryType>,
    pub effective_industry_lower: Option<f64>,
    pub effective_industry_upper: Option<f64>,
    pub invalid_industry_lower: Option<f64>,
    pub invalid_industry_upper: Option<f64>,
    pub industry_boundary_type: Option<BoundaryType>,
    pub effective_industries: Option<Vec<String>>,
    pub invalid_industries: Option<Vec<String>>,
    #[serde(deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub weights_bandwidth: Option<Option<f64>>,
    pub rebalance_method: Option<RebalanceMethod>,
    pub neutralized_styles: Option<Vec<String>>,
    pub risk_aversion: Option<f64>,
    pub period: Option<Period>,
    pub is_benchmark: Option<bool>,
    pub transaction_rate: Option<f64>,
    pub start_date: Option<Date>,
    pub synthetize: Option<CombineSpec>,
}

/// Builds [`StrategyParams`] from the defaults plus overrides.
///
/// # Example
///
/// ```
/// use cadiz_portfolio::{BoundaryType, ParameterBuilder, RebalanceMethod};
///
/// let params = ParameterBuilder::new()
///     .benchmark_band(0.8, 1.001, BoundaryType::Relative)
///     .rebalance_method(RebalanceMethod::Linear)
///     .build()
///     .unwrap();
/// assert_eq!(params.ubound.unwrap().value_for("any"), 0.04);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ParameterBuilder {
    params: StrategyParams,
}

impl ParameterBuilder {
    /// Starts from the documented defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the turnover target.
    pub const fn turn_over_target(mut self, value: f64) -> Self {
        self.params.turn_over_target = value;
        self
    }

    /// Sets the `tv` active-risk target.
    pub const fn target_vol(mut self, value: f64) -> Self {
        self.params.target_vol = value;
        self
    }

    /// Sets or removes the explicit lower bound.
    pub fn lbound(mut self, value: Option<BoundSpec>) -> Self {
        self.params.lbound = value;
        self
    }

    /// Sets or removes the explicit upper bound.
    pub fn ubound(mut self, value: Option<BoundSpec>) -> Self {
        self.params.ubound = value;
        self
    }

    /// Sets the covariance window and method.
    pub const fn covariance(mut self, windows: usize, method: CovMethod) -> Self {
        self.params.cov_windows = windows;
        self.params.cov_method = method;
        self
    }

    /// Sets the benchmark-membership band.
    pub const fn benchmark_band(mut self, lower: f64, upper: f64, kind: BoundaryType) -> Self {
        self.params.benchmark = BoundarySpec {
            lower,
            upper,
            boundary_type: kind,
        };
        self
    }

    /// Sets the total-weight band.
    pub const fn total_band(mut self, lower: f64, upper: f64, kind: BoundaryType) -> Self {
        self.params.total = BoundarySpec {
            lower,
            upper,
            boundary_type: kind,
        };
        self
    }

    /// Sets the effective-industry band.
    pub const fn effective_industry_band(mut self, lower: f64, upper: f64, kind: BoundaryType) -> Self {
        self.params.effective_industry = BoundarySpec {
            lower,
            upper,
            boundary_type: kind,
        };
        self
    }

    /// Sets the invalid-industry band.
    pub const fn invalid_industry_band(mut self, lower: f64, upper: f64, kind: BoundaryType) -> Self {
        self.params.invalid_industry = BoundarySpec {
            lower,
            upper,
            boundary_type: kind,
        };
        self
    }

    /// Sets the effective industries.
    pub fn effective_industries(mut self, industries: Vec<String>) -> Self {
        self.params.effective_industries = industries;
        self
    }

    /// Sets the invalid industries.
    pub fn invalid_industries(mut self, industries: Vec<String>) -> Self {
        self.params.invalid_industries = industries;
        self
    }

    /// Sets or removes the benchmark bandwidth.
    pub const fn weights_bandwidth(mut self, value: Option<f64>) -> Self {
        self.params.weights_bandwidth = value;
        self
    }

    /// Sets the rebalance method.
    pub const fn rebalance_method(mut self, method: RebalanceMethod) -> Self {
        self.params.rebalance_method = method;
        self
    }

    /// Sets the styles the alpha is neutralized against.
    pub fn neutralized_styles(mut self, styles: Vec<String>) -> Self {
        self.params.neutralized_styles = styles;
        self
    }

    /// Sets the mean-variance risk aversion.
    pub const fn risk_aversion(mut self, value: f64) -> Self {
        self.params.risk_aversion = value;
        self
    }

    /// Sets the sampling period.
    pub const fn period(mut self, period: Period) -> Self {
        self.params.period = period;
        self
    }

    /// Falls back to benchmark weights on a failed solve.
    pub const fn is_benchmark(mut self, value: bool) -> Self {
        self.params.is_benchmark = value;
        self
    }

    /// Sets the cost per unit of turnover.
    pub const fn transaction_rate(mut self, value: f64) -> Self {
        self.params.transaction_rate = value;
        self
    }

    /// Sets the first rebalanced date.
    pub const fn start_date(mut self, date: Option<Date>) -> Self {
        self.params.start_date = date;
        self
    }

    /// Sets the synthesis settings.
    pub fn synthetize(mut self, spec: CombineSpec) -> Self {
        self.params.synthetize = spec;
        self
    }

    /// Applies every field set in `overrides`.
    pub fn overrides(mut self, overrides: &ParamOverrides) -> Self {
        let p = &mut self.params;
        let o = overrides.clone();
        macro_rules! set {
            ($($field:ident),* $(,)?) => {
                $(if let Some(v) = o.$field { p.$field = v; })*
            };
        }
        set!(
            turn_over_target,
            target_vol,
            lbound,
            ubound,
            cov_windows,
            cov_method,
            effective_industries,
            invalid_industries,
            weights_bandwidth,
            rebalance_method,
            neutralized_styles,
            risk_aversion,
            period,
            is_benchmark,
            transaction_rate,
            synthetize,
        );
        if o.start_date.is_some() {
            p.start_date = o.start_date;
        }

        let band = |spec: &mut BoundarySpec, lower: Option<f64>, upper: Option<f64>, kind: Option<BoundaryType>| {
            if let Some(lower) = lower {
                spec.lower = lower;
            }
            if let Some(upper) = upper {
                spec.upper = upper;
            }
            if let Some(kind) = kind {
                spec.boundary_type = kind;
            }
        };
        band(
            &mut p.benchmark,
            o.benchmark_lower,
            o.benchmark_upper,
            o.benchmark_boundary_type,
        );
        band(&mut p.total, o.total_lower, o.total_upper, o.total_boundary_type);
        band(
            &mut p.effective_industry,
            o.effective_industry_lower,
            o.effective_industry_upper,
            o.industry_boundary_type,
        );
        band(
            &mut p.invalid_industry,
            o.invalid_industry_lower,
            o.invalid_industry_upper,
            o.industry_boundary_type,
        );
        self
    }

    /// Validates and returns the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`CadizError::InvalidConfig`] if any band is inverted, a
    /// per-code bound map has no `other` entry, or a limit is out of range.
    pub fn build(self) -> Result<StrategyParams> {
        self.params.validate()?;
        Ok(self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn valid() -> ParameterBuilder {
        ParameterBuilder::new().benchmark_band(0.8, 1.001, BoundaryType::Relative)
    }

    #[test]
    fn test_default_benchmark_band_is_rejected() {
        let err = ParameterBuilder::new().build().unwrap_err();
        assert!(matches!(err, CadizError::InvalidConfig(ref msg) if msg.contains("benchmark")));
    }

    #[test]
    fn test_defaults() {
        let params = valid().build().unwrap();
        assert_eq!(params.turn_over_target, 1.0);
        assert_eq!(params.target_vol, 0.1);
        assert_eq!(params.cov_windows, 20);
        assert_eq!(params.total, BoundarySpec::absolute(-0.001, 0.01));
        assert_eq!(params.effective_industry.upper, 0.20);
        assert_eq!(params.weights_bandwidth, Some(0.1));
        assert_eq!(params.rebalance_method, RebalanceMethod::Fmv);
        assert_eq!(params.period, Period::Daily);
        assert!(!params.is_benchmark);
    }

    #[test]
    fn test_building_is_idempotent() {
        let overrides: ParamOverrides = serde_json::from_str(
            r#"{"benchmark_lower": 0.8, "benchmark_upper": 1.001, "ubound": {"A": 0.1, "other": 0.05}}"#,
        )
        .unwrap();
        let first = StrategyParams::from_overrides(&overrides).unwrap();
        let second = StrategyParams::from_overrides(&overrides).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.ubound.as_ref().unwrap().value_for("A"), 0.1);
        assert_eq!(first.ubound.as_ref().unwrap().value_for("B"), 0.05);
    }

    #[test]
    fn test_null_override_removes_limit() {
        let overrides: ParamOverrides = serde_json::from_str(
            r#"{"benchmark_lower": 0.0, "benchmark_upper": 0.1, "lbound": null, "ubound": null}"#,
        )
        .unwrap();
        let params = StrategyParams::from_overrides(&overrides).unwrap();
        assert!(params.lbound.is_none());
        assert!(params.ubound.is_none());
        assert_eq!(params.weights_bandwidth, Some(0.1));
    }

    #[test]
    fn test_per_code_map_needs_other() {
        let mut map = BTreeMap::new();
        map.insert("A".to_string(), 0.1);
        let result = valid().ubound(Some(BoundSpec::PerCode(map))).build();
        assert!(matches!(result, Err(CadizError::InvalidConfig(_))));
    }

    #[test]
    fn test_inverted_industry_band() {
        let result = valid()
            .effective_industry_band(0.1, -0.1, BoundaryType::Absolute)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_negative_bandwidth() {
        assert!(valid().weights_bandwidth(Some(-0.1)).build().is_err());
        assert!(valid().weights_bandwidth(None).build().is_ok());
    }

    #[test]
    fn test_unknown_override_field() {
        let parsed: std::result::Result<ParamOverrides, _> =
            serde_json::from_str(r#"{"turnover": 0.5}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_boundary_bounds() {
        let (lower, upper) = BoundarySpec::absolute(-0.1, 0.2).bounds(0.5);
        assert_relative_eq!(lower, 0.4, epsilon = 1e-12);
        assert_relative_eq!(upper, 0.7, epsilon = 1e-12);

        let (lower, upper) = BoundarySpec::relative(0.5, 2.0).bounds(0.3);
        assert_relative_eq!(lower, 0.15, epsilon = 1e-12);
        assert_relative_eq!(upper, 0.6, epsilon = 1e-12);
    }

    #[test]
    fn test_synthetize_override() {
        let overrides: ParamOverrides = serde_json::from_str(
            r#"{"benchmark_lower": 0.8, "benchmark_upper": 1.0,
                "synthetize": {"method": "ic_half", "half_life": 5.0}}"#,
        )
        .unwrap();
        let params = StrategyParams::from_overrides(&overrides).unwrap();
        assert_eq!(params.synthetize.method, cadiz_combine::CombineMethod::IcHalf);
        assert_eq!(params.synthetize.span, 20);
    }
}
