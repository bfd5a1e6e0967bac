use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::common::DeviceSelector;

pub const DEFAULT_TEXT_MODEL: &str = "lmz/candle-mistral";
pub const DEFAULT_TEXT_MODEL_FILE: &str = "model-q4k.gguf";
pub const DEFAULT_SENTIMENT_MODEL: &str = "distilbert/distilbert-base-uncased-finetuned-sst-2-english";
pub const DEFAULT_QUOTE_BASE_URL: &str = "https://finance.yahoo.com";
pub const DEFAULT_CHART_BASE_URL: &str = "https://query1.finance.yahoo.com";
pub const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Where the seed comes from when a request does not carry one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedPolicy {
    /// Every unseeded request reuses this value.
    Fixed(u64),
    /// Every unseeded request draws a new seed.
    #[default]
    Fresh,
}

impl SeedPolicy {
    pub fn resolve(&self) -> u64 {
        match self {
            SeedPolicy::Fixed(seed) => *seed,
            SeedPolicy::Fresh => rand::random(),
        }
    }
}

impl FromStr for SeedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "fresh" => Ok(SeedPolicy::Fresh),
            other => other
                .parse::<u64>()
                .map(SeedPolicy::Fixed)
                .map_err(|_| format!("invalid seed policy `{other}`, expected `fresh` or a number")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub text_model: String,
    /// GGUF weights file looked up in the text model's hub repo.
    pub text_model_file: String,
    pub sentiment_model: String,
    pub device: DeviceSelector,
    pub seed_policy: SeedPolicy,
    pub quote_base_url: String,
    pub chart_base_url: String,
    pub user_agent: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            text_model_file: DEFAULT_TEXT_MODEL_FILE.to_string(),
            sentiment_model: DEFAULT_SENTIMENT_MODEL.to_string(),
            device: DeviceSelector::Cpu,
            seed_policy: SeedPolicy::Fresh,
            quote_base_url: DEFAULT_QUOTE_BASE_URL.to_string(),
            chart_base_url: DEFAULT_CHART_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}
