//! Naive execution model.

use std::collections::HashMap;

use cadiz_portfolio::Position;
use cadiz_traits::Code;
use ndarray::Array1;

/// Fills every target in full and tracks the holdings it leaves behind.
#[derive(Debug, Clone, Default)]
pub struct NaiveExecutor {
    current: HashMap<Code, f64>,
}

impl NaiveExecutor {
    /// Creates an executor that holds nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Turnover needed to reach `target` and the weights actually executed.
    ///
    /// Turnover is `Σ|w|` when nothing is held, otherwise `Σ|w − w₀|` over
    /// the union of held and targeted codes.
    pub fn execute(&self, target: &Position) -> (f64, Array1<f64>) {
        let executed = target.weights.clone();
        if self.current.is_empty() {
            return (executed.iter().map(|w| w.abs()).sum(), executed);
        }

        let targeted = target.weight_map();
        let mut turn_over: f64 = targeted
            .iter()
            .map(|(code, w)| (w - self.current.get(*code).copied().unwrap_or(0.0)).abs())
            .sum();
        turn_over += self
            .current
            .iter()
            .filter(|(code, _)| !targeted.contains_key(code.as_str()))
            .map(|(_, w)| w.abs())
            .sum::<f64>();
        (turn_over, executed)
    }

    /// Replaces the holdings with `weights` of `codes`.
    pub fn set_current(&mut self, codes: &[Code], weights: &Array1<f64>) {
        self.current = codes.iter().cloned().zip(weights.iter().copied()).collect();
    }

    /// Current holdings.
    pub const fn current(&self) -> &HashMap<Code, f64> {
        &self.current
    }
}
