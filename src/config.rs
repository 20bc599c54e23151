use crate::error::{ExtractionError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables for a single extraction run. Every field has a default, so a
/// partial JSON document is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pattern matches below this count trigger the model fallback.
    pub fallback_threshold: usize,
    /// Canonical items below this count after all stages grade the result `low`.
    pub insufficient_threshold: usize,
    pub scale: ScaleDetectorConfig,
    pub validation: ValidationConfig,
    pub inference: InferenceConfig,
    pub model: ModelSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fallback_threshold: 4,
            insufficient_threshold: 3,
            scale: ScaleDetectorConfig::default(),
            validation: ValidationConfig::default(),
            inference: InferenceConfig::default(),
            model: ModelSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleDetectorConfig {
    /// Characters inspected at both the start and the end of the text for scale phrases.
    pub phrase_window: usize,
    /// Characters at the start of the text checked for the looser header form.
    pub header_window: usize,
    /// Fewest `$` figures needed before their mean is trusted to imply a scale.
    pub min_statistical_samples: usize,
}

impl Default for ScaleDetectorConfig {
    fn default() -> Self {
        Self {
            phrase_window: 2000,
            header_window: 1000,
            min_statistical_samples: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub magnitude_limit: f64,
    pub magnitude_divisor: f64,
    /// When no identity can repair an ordering violation, rescale the larger
    /// neighbour by a fixed ratio (Revenue = 2x Gross Profit, Gross Profit =
    /// 1.5x Operating Income, Operating Income = 1.2x Net Income). When off,
    /// the smaller side is clamped to the larger one instead.
    pub ratio_repairs: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            magnitude_limit: 1e12,
            magnitude_divisor: 1000.0,
            ratio_repairs: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub estimate_ratios: bool,
    pub cost_of_revenue_ratio: f64,
    pub operating_expense_ratio: f64,
    pub net_income_ratio: f64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            estimate_ratios: true,
            cost_of_revenue_ratio: 0.65,
            operating_expense_ratio: 0.70,
            net_income_ratio: 0.75,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Only this many leading characters of the document are sent to the model.
    pub max_prompt_chars: usize,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model: "granite3.2-vision".to_string(),
            temperature: 0.0,
            max_tokens: None,
            max_prompt_chars: 12_000,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fallback_threshold == 0 || self.insufficient_threshold == 0 {
            return Err(ExtractionError::InvalidConfig(
                "thresholds must be at least 1".to_string(),
            ));
        }
        if self.scale.phrase_window == 0 || self.scale.header_window == 0 {
            return Err(ExtractionError::InvalidConfig(
                "scale detection windows must be non-empty".to_string(),
            ));
        }
        if !(self.validation.magnitude_limit > 0.0) || !(self.validation.magnitude_divisor > 1.0)
        {
            return Err(ExtractionError::InvalidConfig(format!(
                "magnitude limit {} must be positive and divisor {} greater than 1",
                self.validation.magnitude_limit, self.validation.magnitude_divisor
            )));
        }
        for (name, ratio) in [
            ("cost_of_revenue_ratio", self.inference.cost_of_revenue_ratio),
            ("operating_expense_ratio", self.inference.operating_expense_ratio),
            ("net_income_ratio", self.inference.net_income_ratio),
        ] {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(ExtractionError::InvalidConfig(format!(
                    "{} must be between 0.0 and 1.0, got {}",
                    name, ratio
                )));
            }
        }
        if self.model.max_prompt_chars == 0 {
            return Err(ExtractionError::InvalidConfig(
                "max_prompt_chars must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
