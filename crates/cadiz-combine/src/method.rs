//! Combination methods and their configuration.

use std::str::FromStr;

use cadiz_traits::{CadizError, Result};
use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::combiner::Combiner;
use crate::equal_weight::EqualWeightCombiner;
use crate::history::Statistic;
use crate::ic_weight::{HistoryWeightedCombiner, HistoryWeightedConfig};
use crate::max_ic::MaxIcCombiner;
use crate::orthogonal::OrthMethod;

/// Closed set of composite-alpha combination methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineMethod {
    /// Unweighted mean of the factors.
    #[default]
    #[display("equal")]
    Equal,
    /// Weights from the trailing mean IC.
    #[display("ic_equal")]
    IcEqual,
    /// Weights from the half-life decayed trailing IC.
    #[display("ic_half")]
    IcHalf,
    /// Weights from the trailing mean factor return.
    #[display("ret_equal")]
    RetEqual,
    /// Weights from the half-life decayed trailing factor return.
    #[display("ret_half")]
    RetHalf,
    /// IC-ratio maximizing weights with the sample factor covariance.
    #[display("max_ic_sample")]
    MaxIcSample,
    /// IC-ratio maximizing weights with the Ledoit-Wolf factor covariance.
    #[display("max_ic_shrunk")]
    MaxIcShrunk,
}

impl CombineMethod {
    /// Every method, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Equal,
        Self::IcEqual,
        Self::IcHalf,
        Self::RetEqual,
        Self::RetHalf,
        Self::MaxIcSample,
        Self::MaxIcShrunk,
    ];
}

impl FromStr for CombineMethod {
    type Err = CadizError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.to_string() == s)
            .ok_or_else(|| CadizError::InvalidConfig(format!("unknown combination method '{s}'")))
    }
}

/// Settings of the synthesis stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombineSpec {
    /// Factors to combine. Empty means every factor of the panel.
    pub factors: Vec<String>,
    /// Combination method.
    pub method: CombineMethod,
    /// Number of past trade dates the history-based methods look at.
    pub span: usize,
    /// Half-life, in trade dates, of the `*_half` methods.
    pub half_life: f64,
    /// Keep max-IC weights non-negative.
    pub weight_limit: bool,
    /// Orthogonalize the factors before combining them.
    pub orthogonalize: Option<OrthMethod>,
}

impl Default for CombineSpec {
    fn default() -> Self {
        Self {
            factors: Vec::new(),
            method: CombineMethod::Equal,
            span: 20,
            half_life: 10.0,
            weight_limit: true,
            orthogonalize: None,
        }
    }
}

impl CombineSpec {
    /// Checks the numeric settings.
    ///
    /// # Errors
    ///
    /// Returns [`CadizError::InvalidConfig`] for a zero span or a
    /// non-positive half-life.
    pub fn validate(&self) -> Result<()> {
        if self.span == 0 {
            return Err(CadizError::InvalidConfig("span must be positive".to_string()));
        }
        if !(self.half_life.is_finite() && self.half_life > 0.0) {
            return Err(CadizError::InvalidConfig(format!(
                "half_life must be positive, got {}",
                self.half_life
            )));
        }
        Ok(())
    }

    /// Builds the combiner implementing `method`.
    pub fn combiner(&self) -> Box<dyn Combiner> {
        let history = |statistic, half_life| {
            Box::new(HistoryWeightedCombiner::new(HistoryWeightedConfig {
                statistic,
                span: self.span,
                half_life,
            })) as Box<dyn Combiner>
        };
        match self.method {
            CombineMethod::Equal => Box::new(EqualWeightCombiner),
            CombineMethod::IcEqual => history(Statistic::Ic, None),
            CombineMethod::IcHalf => history(Statistic::Ic, Some(self.half_life)),
            CombineMethod::RetEqual => history(Statistic::Return, None),
            CombineMethod::RetHalf => history(Statistic::Return, Some(self.half_life)),
            CombineMethod::MaxIcSample => {
                Box::new(MaxIcCombiner::new(self.span, false, self.weight_limit))
            }
            CombineMethod::MaxIcShrunk => {
                Box::new(MaxIcCombiner::new(self.span, true, self.weight_limit))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_every_tag() {
        for method in CombineMethod::ALL {
            assert_eq!(method.to_string().parse::<CombineMethod>().unwrap(), method);
        }
    }

    #[test]
    fn test_unknown_tag_is_an_error() {
        assert!(matches!(
            "ic_decay".parse::<CombineMethod>(),
            Err(CadizError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_serde_tags_match_display() {
        let json = serde_json::to_string(&CombineMethod::MaxIcShrunk).unwrap();
        assert_eq!(json, "\"max_ic_shrunk\"");

        let spec: CombineSpec =
            serde_json::from_str(r#"{"method": "ret_half", "orthogonalize": "symmetric"}"#).unwrap();
        assert_eq!(spec.method, CombineMethod::RetHalf);
        assert_eq!(spec.orthogonalize, Some(OrthMethod::Symmetric));
        assert_eq!(spec.span, 20);
    }

    #[test]
    fn test_combiner_names_match_methods() {
        for method in CombineMethod::ALL {
            let spec = CombineSpec {
                method,
                ..Default::default()
            };
            assert_eq!(spec.combiner().name(), method.to_string());
        }
    }

    #[test]
    fn test_validate() {
        assert!(CombineSpec::default().validate().is_ok());
        let bad = CombineSpec {
            span: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad = CombineSpec {
            half_life: 0.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
