//! Cross-sectional factor panels.
//!
//! A [`FactorPanel`] holds one [`CrossSection`] per trade date, in ascending
//! date order. Each cross-section stores the codes trading on that date, their
//! industry classification, close price, benchmark weight, factor exposures and
//! the log forward return `nxt1_ret`.
//!
//! Panels are built from a Polars `DataFrame` with the columns
//! `trade_date`, `code`, `industry_code`, `closePrice`, `weight` and one column
//! per factor. Missing numeric values are read as `NaN`.

use std::collections::{BTreeMap, HashMap, HashSet};

use ndarray::{Array1, Array2, Axis, concatenate};
use polars::prelude::*;

use crate::error::{CadizError, Result};
use crate::types::{Code, DATE_FORMAT, Date, parse_date};

/// Column holding the trade date.
pub const TRADE_DATE: &str = "trade_date";
/// Column holding the security code.
pub const CODE: &str = "code";
/// Column holding the industry classification.
pub const INDUSTRY_CODE: &str = "industry_code";
/// Column holding the close price.
pub const CLOSE_PRICE: &str = "closePrice";
/// Column holding the benchmark weight.
pub const WEIGHT: &str = "weight";
/// Column holding the log forward return.
pub const NXT1_RET: &str = "nxt1_ret";

/// All securities observed on a single trade date.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossSection {
    /// The trade date.
    pub trade_date: Date,
    /// Security codes, sorted ascending.
    pub codes: Vec<Code>,
    /// Industry code per security.
    pub industries: Vec<String>,
    /// Close price per security.
    pub close: Array1<f64>,
    /// Benchmark weight per security.
    pub benchmark: Array1<f64>,
    /// Factor exposures, one row per security and one column per factor.
    pub factors: Array2<f64>,
    /// Log return from this trade date to the next one.
    pub nxt1_ret: Array1<f64>,
}

impl CrossSection {
    /// Creates a cross-section whose forward returns are not yet known.
    ///
    /// Rows are reordered so that codes are ascending.
    pub fn new(
        trade_date: Date,
        codes: Vec<Code>,
        industries: Vec<String>,
        close: Vec<f64>,
        benchmark: Vec<f64>,
        factors: Array2<f64>,
    ) -> Result<Self> {
        let n = codes.len();
        if industries.len() != n || close.len() != n || benchmark.len() != n || factors.nrows() != n
        {
            return Err(CadizError::InvalidData(format!(
                "cross-section {trade_date} has mismatched column lengths"
            )));
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| codes[a].cmp(&codes[b]));

        let section = Self {
            trade_date,
            codes: order.iter().map(|&i| codes[i].clone()).collect(),
            industries: order.iter().map(|&i| industries[i].clone()).collect(),
            close: order.iter().map(|&i| close[i]).collect(),
            benchmark: order.iter().map(|&i| benchmark[i]).collect(),
            factors: factors.select(Axis(0), &order),
            nxt1_ret: Array1::from_elem(n, f64::NAN),
        };
        section.check_unique_codes()?;
        Ok(section)
    }

    /// Number of securities on this date.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Returns whether no security trades on this date.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Maps each code to its row.
    pub fn code_index(&self) -> HashMap<&str, usize> {
        self.codes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect()
    }

    /// Exposure matrix for the given factor columns.
    pub fn factor_matrix(&self, columns: &[usize]) -> Array2<f64> {
        self.factors.select(Axis(1), columns)
    }

    /// Sorted list of distinct industries on this date.
    pub fn distinct_industries(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .industries
            .iter()
            .cloned()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        out.sort();
        out
    }

    /// One-hot industry dummies, one column per entry of
    /// [`Self::distinct_industries`].
    pub fn industry_dummies(&self) -> Array2<f64> {
        let names = self.distinct_industries();
        let lookup: HashMap<&str, usize> = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.as_str(), i))
            .collect();
        let mut dummies = Array2::zeros((self.len(), names.len()));
        for (row, industry) in self.industries.iter().enumerate() {
            dummies[[row, lookup[industry.as_str()]]] = 1.0;
        }
        dummies
    }

    fn check_unique_codes(&self) -> Result<()> {
        if let Some(dup) = self.codes.windows(2).find(|w| w[0] == w[1]) {
            return Err(CadizError::InvalidData(format!(
                "duplicate row for ({}, {})",
                self.trade_date, dup[0]
            )));
        }
        Ok(())
    }
}

/// A time-ordered collection of cross-sections sharing one set of factor columns.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorPanel {
    factor_names: Vec<String>,
    sections: Vec<CrossSection>,
}

impl FactorPanel {
    /// Builds a panel from cross-sections, keeping their forward returns.
    ///
    /// Sections are sorted by date; a repeated date or a factor matrix whose
    /// width differs from `factor_names` is rejected.
    pub fn from_sections(factor_names: Vec<String>, mut sections: Vec<CrossSection>) -> Result<Self> {
        sections.sort_by_key(|s| s.trade_date);
        if let Some(w) = sections.windows(2).find(|w| w[0].trade_date == w[1].trade_date) {
            return Err(CadizError::InvalidData(format!(
                "trade date {} appears twice",
                w[0].trade_date
            )));
        }
        for section in &sections {
            if section.factors.ncols() != factor_names.len() {
                return Err(CadizError::InvalidData(format!(
                    "cross-section {} has {} factor columns, expected {}",
                    section.trade_date,
                    section.factors.ncols(),
                    factor_names.len()
                )));
            }
            section.check_unique_codes()?;
        }
        Ok(Self {
            factor_names,
            sections,
        })
    }

    /// Recomputes `nxt1_ret` as `ln(close[t+1] / close[t])` per code.
    ///
    /// Codes missing from the next date, and every code on the final date,
    /// get `NaN`.
    pub fn with_forward_returns(mut self) -> Self {
        for i in 0..self.sections.len() {
            let next: Option<HashMap<String, f64>> = self.sections.get(i + 1).map(|s| {
                s.codes
                    .iter()
                    .cloned()
                    .zip(s.close.iter().copied())
                    .collect()
            });
            let section = &mut self.sections[i];
            section.nxt1_ret = section
                .codes
                .iter()
                .zip(section.close.iter())
                .map(|(code, &close)| {
                    next.as_ref()
                        .and_then(|m| m.get(code))
                        .map_or(f64::NAN, |&nxt| log_return(close, nxt))
                })
                .collect();
        }
        self
    }

    /// Reads a panel from a `DataFrame`.
    ///
    /// `nxt1_ret` is taken from the frame when present, otherwise derived
    /// from `closePrice`.
    pub fn from_dataframe(df: &DataFrame, factor_names: &[String]) -> Result<Self> {
        let dates = string_values(df, TRADE_DATE)?
            .iter()
            .map(|s| parse_date(s))
            .collect::<Result<Vec<_>>>()?;
        let codes = string_values(df, CODE)?;
        let industries = string_values(df, INDUSTRY_CODE)?;
        let close = float_values(df, CLOSE_PRICE)?;
        let weight = float_values(df, WEIGHT)?;
        let factor_cols = factor_names
            .iter()
            .map(|name| float_values(df, name))
            .collect::<Result<Vec<_>>>()?;
        let forward = if has_column(df, NXT1_RET) {
            Some(float_values(df, NXT1_RET)?)
        } else {
            None
        };

        let mut by_date: BTreeMap<Date, Vec<usize>> = BTreeMap::new();
        for (row, date) in dates.iter().enumerate() {
            by_date.entry(*date).or_default().push(row);
        }

        let mut sections = Vec::with_capacity(by_date.len());
        for (date, rows) in by_date {
            let factors = Array2::from_shape_fn((rows.len(), factor_cols.len()), |(i, j)| {
                factor_cols[j][rows[i]]
            });
            let mut section = CrossSection::new(
                date,
                rows.iter().map(|&r| codes[r].clone()).collect(),
                rows.iter().map(|&r| industries[r].clone()).collect(),
                rows.iter().map(|&r| close[r]).collect(),
                rows.iter().map(|&r| weight[r]).collect(),
                factors,
            )?;
            if let Some(fwd) = &forward {
                let lookup: HashMap<&str, f64> = rows
                    .iter()
                    .map(|&r| (codes[r].as_str(), fwd[r]))
                    .collect();
                section.nxt1_ret = section
                    .codes
                    .iter()
                    .map(|c| lookup[c.as_str()])
                    .collect();
            }
            sections.push(section);
        }

        let panel = Self::from_sections(factor_names.to_vec(), sections)?;
        Ok(if forward.is_some() {
            panel
        } else {
            panel.with_forward_returns()
        })
    }

    /// Writes the panel back to a `DataFrame` sorted by `(trade_date, code)`.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let n = self.n_rows();
        let mut dates = Vec::with_capacity(n);
        let mut codes = Vec::with_capacity(n);
        let mut industries = Vec::with_capacity(n);
        let mut close = Vec::with_capacity(n);
        let mut weight = Vec::with_capacity(n);
        let mut nxt1 = Vec::with_capacity(n);
        let mut factors = vec![Vec::with_capacity(n); self.factor_names.len()];

        for s in &self.sections {
            let date = s.trade_date.format(DATE_FORMAT).to_string();
            for row in 0..s.len() {
                dates.push(date.clone());
                codes.push(s.codes[row].clone());
                industries.push(s.industries[row].clone());
                close.push(s.close[row]);
                weight.push(s.benchmark[row]);
                nxt1.push(s.nxt1_ret[row]);
                for (j, col) in factors.iter_mut().enumerate() {
                    col.push(s.factors[[row, j]]);
                }
            }
        }

        let mut columns = vec![
            Column::new(TRADE_DATE.into(), dates),
            Column::new(CODE.into(), codes),
            Column::new(INDUSTRY_CODE.into(), industries),
            Column::new(CLOSE_PRICE.into(), close),
            Column::new(WEIGHT.into(), weight),
        ];
        for (name, values) in self.factor_names.iter().zip(factors) {
            columns.push(Column::new(PlSmallStr::from(name.as_str()), values));
        }
        columns.push(Column::new(NXT1_RET.into(), nxt1));

        Ok(DataFrame::new(columns)?)
    }

    /// Factor column names.
    pub fn factor_names(&self) -> &[String] {
        &self.factor_names
    }

    /// Position of a factor column.
    pub fn factor_index(&self, name: &str) -> Result<usize> {
        self.factor_names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| CadizError::MissingColumn(name.to_string()))
    }

    /// Positions of several factor columns.
    pub fn factor_indices<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<usize>> {
        names.iter().map(|n| self.factor_index(n.as_ref())).collect()
    }

    /// Cross-sections in ascending date order.
    pub fn sections(&self) -> &[CrossSection] {
        &self.sections
    }

    /// Cross-section for one date.
    pub fn section(&self, date: Date) -> Option<&CrossSection> {
        self.sections
            .binary_search_by_key(&date, |s| s.trade_date)
            .ok()
            .map(|i| &self.sections[i])
    }

    /// Trade dates in ascending order.
    pub fn dates(&self) -> Vec<Date> {
        self.sections.iter().map(|s| s.trade_date).collect()
    }

    /// Number of trade dates.
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Returns whether the panel has no trade dates.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Total number of `(trade_date, code)` rows.
    pub fn n_rows(&self) -> usize {
        self.sections.iter().map(CrossSection::len).sum()
    }

    /// Applies a fallible transformation to every cross-section.
    pub fn try_map_sections<F>(mut self, mut f: F) -> Result<Self>
    where
        F: FnMut(CrossSection) -> Result<CrossSection>,
    {
        self.sections = self
            .sections
            .into_iter()
            .map(&mut f)
            .collect::<Result<Vec<_>>>()?;
        Self::from_sections(self.factor_names, self.sections)
    }

    /// Adds (or replaces) a factor column, one value vector per trade date.
    pub fn with_factor(mut self, name: &str, values: Vec<Array1<f64>>) -> Result<Self> {
        if values.len() != self.sections.len() {
            return Err(CadizError::InvalidData(format!(
                "factor '{name}' has {} dates, panel has {}",
                values.len(),
                self.sections.len()
            )));
        }
        let existing = self.factor_names.iter().position(|n| n == name);
        for (section, column) in self.sections.iter_mut().zip(values) {
            if column.len() != section.len() {
                return Err(CadizError::InvalidData(format!(
                    "factor '{name}' on {} has {} values for {} codes",
                    section.trade_date,
                    column.len(),
                    section.len()
                )));
            }
            match existing {
                Some(j) => section.factors.column_mut(j).assign(&column),
                None => {
                    section.factors = concatenate(
                        Axis(1),
                        &[section.factors.view(), column.insert_axis(Axis(1)).view()],
                    )
                    .map_err(|e| CadizError::InvalidData(e.to_string()))?;
                }
            }
        }
        if existing.is_none() {
            self.factor_names.push(name.to_string());
        }
        Ok(self)
    }
}

/// `ln(next / close)`, or `NaN` when either price is not a positive number.
fn log_return(close: f64, next: f64) -> f64 {
    if close > 0.0 && next > 0.0 {
        (next / close).ln()
    } else {
        f64::NAN
    }
}

fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|s| s.as_str() == name)
}

fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name)
        .map_err(|_| CadizError::MissingColumn(name.to_string()))
}

fn string_values(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let series = column(df, name)?
        .as_materialized_series()
        .cast(&DataType::String)?;
    series
        .str()?
        .into_iter()
        .map(|v| {
            v.map(str::to_string)
                .ok_or_else(|| CadizError::InvalidData(format!("null value in column '{name}'")))
        })
        .collect()
}

fn float_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let series = column(df, name)?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    Ok(series
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_frame() -> DataFrame {
        df! {
            "trade_date" => &["2020-01-02", "2020-01-02", "2020-01-03", "2020-01-03"],
            "code" => &["B", "A", "A", "B"],
            "industry_code" => &["bank", "tech", "tech", "bank"],
            "closePrice" => &[110.0, 100.0, 102.0, 108.0],
            "weight" => &[0.4, 0.6, 0.5, 0.5],
            "mom" => &[Some(1.0), None, Some(0.5), Some(-0.5)],
        }
        .unwrap()
    }

    #[test]
    fn test_from_dataframe_groups_and_sorts() {
        let panel = FactorPanel::from_dataframe(&sample_frame(), &["mom".to_string()]).unwrap();

        assert_eq!(panel.len(), 2);
        assert_eq!(panel.n_rows(), 4);
        let first = &panel.sections()[0];
        assert_eq!(first.codes, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(first.industries, vec!["tech".to_string(), "bank".to_string()]);
        assert!(first.factors[[0, 0]].is_nan());
        assert_eq!(first.factors[[1, 0]], 1.0);
        assert_eq!(first.benchmark.to_vec(), vec![0.6, 0.4]);
    }

    #[test]
    fn test_forward_returns_from_close() {
        let panel = FactorPanel::from_dataframe(&sample_frame(), &["mom".to_string()]).unwrap();

        let first = &panel.sections()[0];
        assert_relative_eq!(first.nxt1_ret[0], (102.0_f64 / 100.0).ln(), epsilon = 1e-12);
        assert_relative_eq!(first.nxt1_ret[1], (108.0_f64 / 110.0).ln(), epsilon = 1e-12);
        assert!(panel.sections()[1].nxt1_ret.iter().all(|r| r.is_nan()));
    }

    #[test]
    fn test_duplicate_rows_rejected() {
        let df = df! {
            "trade_date" => &["2020-01-02", "2020-01-02"],
            "code" => &["A", "A"],
            "industry_code" => &["tech", "tech"],
            "closePrice" => &[1.0, 1.0],
            "weight" => &[0.5, 0.5],
        }
        .unwrap();

        let result = FactorPanel::from_dataframe(&df, &[]);
        assert!(matches!(result, Err(CadizError::InvalidData(_))));
    }

    #[test]
    fn test_missing_column() {
        let result = FactorPanel::from_dataframe(&sample_frame(), &["value".to_string()]);
        assert!(matches!(result, Err(CadizError::MissingColumn(c)) if c == "value"));
    }

    #[test]
    fn test_with_factor_appends_and_replaces() {
        let panel = FactorPanel::from_dataframe(&sample_frame(), &["mom".to_string()]).unwrap();
        let values = vec![Array1::from(vec![1.0, 2.0]), Array1::from(vec![3.0, 4.0])];
        let panel = panel.with_factor("factor", values).unwrap();
        assert_eq!(panel.factor_names(), &["mom".to_string(), "factor".to_string()]);
        assert_eq!(panel.sections()[1].factors[[1, 1]], 4.0);

        let panel = panel
            .with_factor("mom", vec![Array1::zeros(2), Array1::zeros(2)])
            .unwrap();
        assert_eq!(panel.factor_names().len(), 2);
        assert_eq!(panel.sections()[0].factors[[1, 0]], 0.0);
    }

    #[test]
    fn test_to_dataframe_roundtrip_shape() {
        let panel = FactorPanel::from_dataframe(&sample_frame(), &["mom".to_string()]).unwrap();
        let df = panel.to_dataframe().unwrap();
        assert_eq!(df.height(), 4);
        assert!(has_column(&df, NXT1_RET));
        assert!(has_column(&df, "mom"));
    }

    #[test]
    fn test_industry_dummies() {
        let panel = FactorPanel::from_dataframe(&sample_frame(), &["mom".to_string()]).unwrap();
        let section = &panel.sections()[0];
        assert_eq!(section.distinct_industries(), vec!["bank".to_string(), "tech".to_string()]);
        let dummies = section.industry_dummies();
        // A is tech, B is bank
        assert_eq!(dummies.row(0).to_vec(), vec![0.0, 1.0]);
        assert_eq!(dummies.row(1).to_vec(), vec![1.0, 0.0]);
    }
}
