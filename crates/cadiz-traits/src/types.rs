//! Common types used throughout the cadiz engine.

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::error::{CadizError, Result};

// Re-export date type from chrono
pub use chrono::NaiveDate as Date;

/// A security identifier, e.g. `"600000.SH"`.
pub type Code = String;

/// Date format used for trade dates in tabular input and output.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a trade date in `YYYY-MM-DD` format.
pub fn parse_date(s: &str) -> Result<Date> {
    Date::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|e| CadizError::InvalidDate(format!("'{s}': {e}")))
}

/// Sampling frequency of a return series, used for annualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    /// Daily observations.
    #[default]
    #[display("daily")]
    Daily,
    /// Weekly observations.
    #[display("weekly")]
    Weekly,
    /// Monthly observations.
    #[display("monthly")]
    Monthly,
    /// Quarterly observations.
    #[display("quarterly")]
    Quarterly,
    /// Yearly observations.
    #[display("yearly")]
    Yearly,
}

impl Period {
    /// Number of observations per year.
    pub const fn annualization(self) -> f64 {
        match self {
            Self::Daily => 252.0,
            Self::Weekly => 52.0,
            Self::Monthly => 12.0,
            Self::Quarterly => 4.0,
            Self::Yearly => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_parse_date() {
        let date = parse_date("2024-01-15").unwrap();
        assert_eq!(date.year(), 2024);
        assert_eq!(date.month(), 1);
        assert_eq!(date.day(), 15);
    }

    #[test]
    fn test_parse_date_invalid() {
        assert!(matches!(
            parse_date("15/01/2024"),
            Err(CadizError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_period_annualization() {
        assert_eq!(Period::default(), Period::Daily);
        assert_eq!(Period::Daily.annualization(), 252.0);
        assert_eq!(Period::Monthly.annualization(), 12.0);
        assert_eq!(Period::Weekly.to_string(), "weekly");
    }
}
