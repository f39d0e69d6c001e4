//! Target positions produced by the rebalancer.

use std::collections::HashMap;

use cadiz_traits::panel::{CODE, INDUSTRY_CODE, TRADE_DATE, WEIGHT};
use cadiz_traits::types::DATE_FORMAT;
use cadiz_traits::{Code, Date, Result};
use ndarray::Array1;
use polars::prelude::*;

use crate::constraints::BENCHMARK;

const ER: &str = "er";

/// Target portfolio of one trade date.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    /// Trade date.
    pub trade_date: Date,
    /// Codes in ascending order.
    pub codes: Vec<Code>,
    /// Target weights.
    pub weights: Array1<f64>,
    /// Industry of every code.
    pub industries: Vec<String>,
    /// Expected returns the weights were solved for.
    pub er: Array1<f64>,
    /// Benchmark weights.
    pub benchmark: Array1<f64>,
    /// Whether the optimizer succeeded. A `false` position is the fallback.
    pub solved: bool,
}

impl Position {
    /// Number of codes.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Returns whether the position covers no code.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Weight of every code.
    pub fn weight_map(&self) -> HashMap<&str, f64> {
        self.codes
            .iter()
            .map(String::as_str)
            .zip(self.weights.iter().copied())
            .collect()
    }

    /// Weights aligned to `codes`; codes this position does not hold get 0.0.
    pub fn reindex(&self, codes: &[Code]) -> Array1<f64> {
        let weights = self.weight_map();
        codes
            .iter()
            .map(|c| weights.get(c.as_str()).copied().unwrap_or(0.0))
            .collect()
    }
}

/// Positions of a run in chronological order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionHistory {
    positions: Vec<Position>,
}

impl PositionHistory {
    /// Creates an empty history.
    pub const fn new() -> Self {
        Self {
            positions: Vec::new(),
        }
    }

    /// Appends the position of the next trade date.
    pub fn push(&mut self, position: Position) {
        self.positions.push(position);
    }

    /// All positions.
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// Most recent position.
    pub fn last(&self) -> Option<&Position> {
        self.positions.last()
    }

    /// Number of trade dates.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns whether no position was recorded.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Trade dates whose optimization failed.
    pub fn fallback_dates(&self) -> Vec<Date> {
        self.positions
            .iter()
            .filter(|p| !p.solved)
            .map(|p| p.trade_date)
            .collect()
    }

    /// Long-format `DataFrame` with columns `trade_date`, `code`, `weight`,
    /// `industry_code`, `er` and `benchmark`.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut dates = Vec::new();
        let mut codes = Vec::new();
        let mut weights = Vec::new();
        let mut industries = Vec::new();
        let mut er = Vec::new();
        let mut benchmark = Vec::new();
        for p in &self.positions {
            let date = p.trade_date.format(DATE_FORMAT).to_string();
            dates.extend(std::iter::repeat_n(date, p.len()));
            codes.extend(p.codes.iter().cloned());
            weights.extend(p.weights.iter().copied());
            industries.extend(p.industries.iter().cloned());
            er.extend(p.er.iter().copied());
            benchmark.extend(p.benchmark.iter().copied());
        }
        Ok(DataFrame::new(vec![
            Column::new(TRADE_DATE.into(), dates),
            Column::new(CODE.into(), codes),
            Column::new(WEIGHT.into(), weights),
            Column::new(INDUSTRY_CODE.into(), industries),
            Column::new(ER.into(), er),
            Column::new(BENCHMARK.into(), benchmark),
        ])?)
    }
}

impl<'a> IntoIterator for &'a PositionHistory {
    type Item = &'a Position;
    type IntoIter = std::slice::Iter<'a, Position>;

    fn into_iter(self) -> Self::IntoIter {
        self.positions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn position() -> Position {
        Position {
            trade_date: Date::from_ymd_opt(2020, 1, 2).unwrap(),
            codes: vec!["A".into(), "B".into()],
            weights: array![0.7, 0.3],
            industries: vec!["x".into(), "y".into()],
            er: array![0.1, -0.1],
            benchmark: array![0.5, 0.5],
            solved: true,
        }
    }

    #[test]
    fn test_reindex_fills_zero() {
        let codes: Vec<Code> = vec!["B".into(), "C".into()];
        assert_eq!(position().reindex(&codes).to_vec(), vec![0.3, 0.0]);
    }

    #[test]
    fn test_history_export() {
        let mut history = PositionHistory::new();
        history.push(position());
        let mut failed = position();
        failed.trade_date = Date::from_ymd_opt(2020, 1, 3).unwrap();
        failed.solved = false;
        history.push(failed);

        let df = history.to_dataframe().unwrap();
        assert_eq!(df.shape(), (4, 6));
        assert_eq!(history.fallback_dates().len(), 1);
        assert_eq!(history.last().unwrap().trade_date.to_string(), "2020-01-03");
    }
}
