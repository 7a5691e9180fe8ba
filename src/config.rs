//! Loss configuration, loadable from JSON

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    error::{KgeError, KgeResult},
    nn::losses::LossType,
};

/// Everything needed to bind a [`crate::nn::losses::KgeLoss`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LossConfig {
    /// Target separation for the hinge loss
    pub margin: f32,
    pub loss_type: LossType,
    /// Reweight negatives by a temperature-scaled softmax of their scores
    pub neg_adv_sampling: bool,
    pub adv_temp_value: f32,
    /// Score the positive/negative difference instead of each side separately
    pub pairwise: bool,
}

impl Default for LossConfig {
    fn default() -> Self {
        Self {
            margin: 1.0,
            loss_type: LossType::LogSigmoid,
            neg_adv_sampling: false,
            adv_temp_value: 0.0,
            pairwise: false,
        }
    }
}

impl LossConfig {
    pub fn new(loss_type: LossType) -> Self {
        Self {
            loss_type,
            ..Self::default()
        }
    }

    pub fn with_margin(mut self, margin: f32) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_loss_type(mut self, loss_type: LossType) -> Self {
        self.loss_type = loss_type;
        self
    }

    /// Enable adversarial negative sampling at the given softmax temperature
    pub fn with_adversarial_sampling(mut self, temperature: f32) -> Self {
        self.neg_adv_sampling = true;
        self.adv_temp_value = temperature;
        self
    }

    pub fn with_pairwise(mut self, pairwise: bool) -> Self {
        self.pairwise = pairwise;
        self
    }

    pub fn validate(&self) -> KgeResult<()> {
        if !self.margin.is_finite() {
            return Err(KgeError::ConfigurationError(format!(
                "margin must be finite, got {}",
                self.margin
            )));
        }
        if !self.adv_temp_value.is_finite() {
            return Err(KgeError::ConfigurationError(format!(
                "adv_temp_value must be finite, got {}",
                self.adv_temp_value
            )));
        }
        Ok(())
    }

    /// Parse and validate a JSON document. Missing fields take their defaults.
    pub fn from_json_str(content: &str) -> KgeResult<Self> {
        let config: LossConfig = serde_json::from_str(content).map_err(|e| {
            KgeError::ConfigurationError(format!("Failed to parse loss config: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> KgeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> KgeResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&content)?;
        tracing::info!("Loss configuration loaded from {:?}", path);
        Ok(config)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> KgeResult<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json_string()?)?;
        tracing::info!("Loss configuration saved to {:?}", path);
        Ok(())
    }
}
