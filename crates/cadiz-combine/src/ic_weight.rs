//! History-weighted factor combination (IC or factor return).

use cadiz_traits::Result;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::combiner::{CombineContext, Combiner, equal_weights};
use crate::history::Statistic;

/// Configuration for history-weighted combination.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryWeightedConfig {
    /// Statistic the weights are proportional to.
    pub statistic: Statistic,
    /// Number of past trade dates averaged.
    pub span: usize,
    /// Half-life, in trade dates, of the decay applied to older
    /// observations. `None` averages the window equally.
    pub half_life: Option<f64>,
}

impl Default for HistoryWeightedConfig {
    fn default() -> Self {
        Self {
            statistic: Statistic::Ic,
            span: 20,
            half_life: None,
        }
    }
}

/// Combiner weighting each factor by the trailing mean of its IC or return.
///
/// Weights keep the sign of the statistic, so a factor with negative IC
/// enters the composite inverted. Before any history is available every
/// factor gets the same weight.
#[derive(Debug, Clone)]
pub struct HistoryWeightedCombiner {
    config: HistoryWeightedConfig,
    name: String,
}

impl HistoryWeightedCombiner {
    /// Creates a history-weighted combiner.
    pub fn new(config: HistoryWeightedConfig) -> Self {
        let decay = if config.half_life.is_some() { "half" } else { "equal" };
        Self {
            config,
            name: format!("{}_{decay}", config.statistic),
        }
    }

    /// Returns the configuration.
    pub const fn config(&self) -> &HistoryWeightedConfig {
        &self.config
    }
}

impl Default for HistoryWeightedCombiner {
    fn default() -> Self {
        Self::new(HistoryWeightedConfig::default())
    }
}

impl Combiner for HistoryWeightedCombiner {
    fn weights(&self, ctx: &CombineContext<'_>) -> Result<Array1<f64>> {
        Ok(ctx
            .history
            .trailing_mean(
                self.config.statistic,
                ctx.date_index,
                self.config.span,
                self.config.half_life,
            )
            .unwrap_or_else(|| equal_weights(ctx.n_factors())))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::FactorHistory;
    use cadiz_traits::Date;
    use ndarray::{Array2, array};

    fn history() -> FactorHistory {
        let dates = (1..=3)
            .map(|d| Date::from_ymd_opt(2020, 1, d).unwrap())
            .collect();
        let x = array![[1.0, 0.0], [2.0, 1.0], [3.0, 0.0]];
        let fwd = array![0.01, 0.02, 0.03];
        FactorHistory::compute(
            vec!["a".into(), "b".into()],
            dates,
            &[x.clone(), x.clone(), x],
            &[fwd.clone(), fwd.clone(), fwd],
        )
    }

    #[test]
    fn test_no_history_is_equal_weight() {
        let h = history();
        let x = Array2::zeros((3, 2));
        let combiner = HistoryWeightedCombiner::default();
        let w = combiner
            .weights(&CombineContext {
                exposures: &x,
                history: &h,
                date_index: 0,
            })
            .unwrap();
        assert_eq!(w.to_vec(), vec![0.5, 0.5]);
    }

    #[test]
    fn test_weights_follow_ic() {
        let h = history();
        let x = Array2::zeros((3, 2));
        let combiner = HistoryWeightedCombiner::default();
        let w = combiner
            .weights(&CombineContext {
                exposures: &x,
                history: &h,
                date_index: 2,
            })
            .unwrap();
        assert!((w[0] - 1.0).abs() < 1e-12);
        assert!(w[1].abs() < 1e-12);
    }

    #[test]
    fn test_names() {
        assert_eq!(HistoryWeightedCombiner::default().name(), "ic_equal");
        let ret_half = HistoryWeightedCombiner::new(HistoryWeightedConfig {
            statistic: Statistic::Return,
            span: 10,
            half_life: Some(5.0),
        });
        assert_eq!(ret_half.name(), "ret_half");
    }
}
