//! Input loading for the cadiz CLI.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use cadiz::FactorPanel;
use cadiz::portfolio::{ParamOverrides, StrategyParams};
use cadiz::traits::{FactorRiskModel, RiskModel};
use ndarray::{Array1, Array2};
use polars::prelude::*;

/// Reads a long-format panel from a CSV file.
///
/// The file needs the columns `trade_date`, `code`, `industry_code`,
/// `closePrice`, `weight` and one column per entry of `factors`. A
/// `nxt1_ret` column is used when present.
pub(crate) fn load_panel(path: &Path, factors: &[String]) -> Result<FactorPanel> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .with_context(|| format!("cannot open {}", path.display()))?
        .finish()
        .with_context(|| format!("cannot parse {}", path.display()))?;
    Ok(FactorPanel::from_dataframe(&df, factors)?)
}

/// Reads parameter overrides from a JSON file.
pub(crate) fn load_overrides(path: &Path) -> Result<ParamOverrides> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid parameters in {}", path.display()))
}

/// Resolves the strategy parameters from an optional override file.
pub(crate) fn resolve_params(path: Option<&Path>) -> Result<StrategyParams> {
    let overrides = match path {
        Some(path) => load_overrides(path)?,
        None => ParamOverrides::default(),
    };
    Ok(StrategyParams::from_overrides(&overrides)?)
}

/// Risk model in which every code has the same specific volatility and no
/// common factor.
pub(crate) fn specific_risk_model(panel: &FactorPanel, specific_vol: f64) -> Result<Box<dyn RiskModel>> {
    let codes: Vec<String> = {
        let mut codes: Vec<String> = panel
            .sections()
            .iter()
            .flat_map(|s| s.codes.iter().cloned())
            .collect();
        codes.sort();
        codes.dedup();
        codes
    };
    let loadings: HashMap<String, Array1<f64>> =
        codes.iter().map(|c| (c.clone(), Array1::zeros(0))).collect();
    let specific = codes
        .into_iter()
        .map(|c| (c, specific_vol * specific_vol))
        .collect();
    let model = FactorRiskModel::new(Array2::zeros((0, 0)), loadings, specific)?;
    Ok(Box::new(model))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("cadiz-{}-{name}", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_panel_from_csv() {
        let path = write_temp(
            "panel.csv",
            "trade_date,code,industry_code,closePrice,weight,value\n\
             2020-01-02,A,bank,100,0.6,1.0\n\
             2020-01-02,B,bank,110,0.4,2.0\n\
             2020-01-03,A,bank,102,0.5,\n\
             2020-01-03,B,bank,108,0.5,3.0\n",
        );
        let panel = load_panel(&path, &["value".to_string()]).unwrap();
        assert_eq!(panel.len(), 2);
        assert!(panel.sections()[1].factors[[0, 0]].is_nan());
        assert_relative_eq!(panel.sections()[0].nxt1_ret[0], (1.02f64).ln(), epsilon = 1e-12);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_resolve_params_from_file() {
        let path = write_temp(
            "params.json",
            r#"{"benchmark_lower": 0.8, "benchmark_upper": 1.001, "rebalance_method": "linear"}"#,
        );
        let params = resolve_params(Some(&path)).unwrap();
        assert_eq!(params.rebalance_method.to_string(), "linear");
        std::fs::remove_file(path).unwrap();

        assert!(resolve_params(None).is_err());
    }
}
