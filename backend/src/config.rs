use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default = "default_models_dir")]
    pub models_dir: String,
    #[serde(default = "default_image_size")]
    pub image_size: u32,
    /// Probability a designated positive class must reach before a binary
    /// stage declares the positive condition.
    #[serde(default = "default_decision_threshold")]
    pub decision_threshold: f32,
    #[serde(default = "default_stage_timeout_ms")]
    pub stage_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_narrative_timeout_ms")]
    pub narrative_timeout_ms: u64,
}

fn default_models_dir() -> String {
    "models".to_string()
}

fn default_image_size() -> u32 {
    224
}

fn default_decision_threshold() -> f32 {
    0.5
}

fn default_stage_timeout_ms() -> u64 {
    10_000
}

fn default_request_timeout_ms() -> u64 {
    45_000
}

fn default_narrative_timeout_ms() -> u64 {
    20_000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            models_dir: default_models_dir(),
            image_size: default_image_size(),
            decision_threshold: default_decision_threshold(),
            stage_timeout_ms: default_stage_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            narrative_timeout_ms: default_narrative_timeout_ms(),
        }
    }
}

impl PipelineConfig {
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = if let Ok(path) = std::env::var("PIPELINE_CONFIG") {
            path
        } else {
            let manifest_dir = std::env::var("CARGO_MANIFEST_DIR")
                .map_err(|_| "Failed to get manifest directory")?;
            format!("{}/../config/pipeline.yaml", manifest_dir)
        };
        let config_str = std::fs::read_to_string(config_path)?;
        let config: PipelineConfig = serde_yaml::from_str(&config_str)?;
        Ok(config)
    }

    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to load pipeline config, using defaults: {}", e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: PipelineConfig = serde_yaml::from_str("models_dir: /opt/models\n").unwrap();
        assert_eq!(config.models_dir, "/opt/models");
        assert_eq!(config.image_size, 224);
        assert_eq!(config.decision_threshold, 0.5);
        assert_eq!(config.stage_timeout_ms, 10_000);
        assert_eq!(config.request_timeout_ms, 45_000);
        assert_eq!(config.narrative_timeout_ms, 20_000);
    }
}
