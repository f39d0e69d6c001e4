//! Industry-median imputation of missing factor values.

use std::collections::HashMap;

use cadiz_traits::stats::median;
use cadiz_traits::{CrossSection, FactorPanel, Result};
use tracing::debug;

/// Fills missing values of `factors` with the median of the same industry on
/// the same trade date.
///
/// Values still missing afterwards (an industry with no observation at all)
/// become 0.0, so the listed columns contain no `NaN` on return.
///
/// # Errors
///
/// Returns [`CadizError::MissingColumn`](cadiz_traits::CadizError::MissingColumn)
/// if a factor is not in the panel.
pub fn impute_industry_median<S: AsRef<str>>(
    panel: FactorPanel,
    factors: &[S],
) -> Result<FactorPanel> {
    let columns = panel.factor_indices(factors)?;
    panel.try_map_sections(|mut section| {
        let filled = impute_section(&mut section, &columns);
        if filled > 0 {
            debug!(trade_date = %section.trade_date, filled, "imputed missing factor values");
        }
        Ok(section)
    })
}

fn impute_section(section: &mut CrossSection, columns: &[usize]) -> usize {
    let mut groups: HashMap<&str, Vec<usize>> = HashMap::new();
    for (row, industry) in section.industries.iter().enumerate() {
        groups.entry(industry.as_str()).or_default().push(row);
    }

    let mut filled = 0;
    for &j in columns {
        let mut column = section.factors.column_mut(j);
        for rows in groups.values() {
            let fill = median(rows.iter().map(|&r| column[r])).unwrap_or(0.0);
            for &r in rows {
                if !column[r].is_finite() {
                    column[r] = fill;
                    filled += 1;
                }
            }
        }
    }
    filled
}
