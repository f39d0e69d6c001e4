//! The preprocessing stage applied to a whole panel.

use cadiz_traits::{CadizError, FactorPanel, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::impute::impute_industry_median;
use crate::processing::{
    DEFAULT_POST_PROCESS, DEFAULT_PRE_PROCESS, ProcessStep, factor_processing, risk_exposure,
};

/// Configuration of [`Preprocessor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Factors to process. Empty means every factor that is not a style.
    pub factors: Vec<String>,
    /// Steps run before neutralization.
    pub pre_process: Vec<ProcessStep>,
    /// Steps run after neutralization.
    pub post_process: Vec<ProcessStep>,
    /// Neutralize against one-hot industry dummies.
    pub neutralize_industry: bool,
    /// Style factors to neutralize against.
    pub neutralized_styles: Vec<String>,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            factors: Vec::new(),
            pre_process: DEFAULT_PRE_PROCESS.to_vec(),
            post_process: DEFAULT_POST_PROCESS.to_vec(),
            neutralize_industry: false,
            neutralized_styles: Vec::new(),
        }
    }
}

/// Imputes and processes factor columns, one trade date at a time.
///
/// # Example
///
/// ```
/// use cadiz_process::{PreprocessConfig, Preprocessor};
///
/// let pre = Preprocessor::new(PreprocessConfig {
///     neutralize_industry: true,
///     ..Default::default()
/// });
/// assert!(pre.config().neutralize_industry);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    /// Creates a preprocessor.
    pub const fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub const fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Factors this preprocessor transforms for `panel`.
    pub fn target_factors(&self, panel: &FactorPanel) -> Vec<String> {
        if !self.config.factors.is_empty() {
            return self.config.factors.clone();
        }
        panel
            .factor_names()
            .iter()
            .filter(|name| !self.config.neutralized_styles.contains(*name))
            .cloned()
            .collect()
    }

    /// Imputes missing values by industry median, then processes the target
    /// factors of every cross-section.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured factor or style is not in the panel,
    /// or if a style is also a target.
    pub fn process(&self, panel: FactorPanel) -> Result<FactorPanel> {
        let targets = self.target_factors(&panel);
        if let Some(style) = self
            .config
            .neutralized_styles
            .iter()
            .find(|s| targets.contains(*s))
        {
            return Err(CadizError::InvalidConfig(format!(
                "style '{style}' cannot be neutralized against itself"
            )));
        }

        let mut imputed: Vec<&str> = targets.iter().map(String::as_str).collect();
        imputed.extend(self.config.neutralized_styles.iter().map(String::as_str));
        let panel = impute_industry_median(panel, &imputed)?;

        let target_idx = panel.factor_indices(&targets)?;
        let style_idx = panel.factor_indices(&self.config.neutralized_styles)?;
        let neutralize = self.config.neutralize_industry || !style_idx.is_empty();

        panel.try_map_sections(|mut section| {
            let x = section.factor_matrix(&target_idx);
            let risk =
                neutralize.then(|| risk_exposure(&section, &style_idx, self.config.neutralize_industry));
            let processed = factor_processing(
                &x,
                &self.config.pre_process,
                risk.as_ref(),
                &self.config.post_process,
            )?;
            for (k, &j) in target_idx.iter().enumerate() {
                section.factors.column_mut(j).assign(&processed.column(k));
            }
            debug!(
                trade_date = %section.trade_date,
                codes = section.len(),
                factors = target_idx.len(),
                "processed cross-section"
            );
            Ok(section)
        })
    }
}
