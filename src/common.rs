use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Compute resource a model is placed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceSelector {
    #[default]
    Cpu,
    Accelerator(usize),
}

impl std::fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceSelector::Cpu => f.write_str("cpu"),
            DeviceSelector::Accelerator(ordinal) => write!(f, "{ordinal}"),
        }
    }
}

impl FromStr for DeviceSelector {
    type Err = String;

    /// Accepts `cpu`, `-1` (cpu) or an accelerator index.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "cpu" | "-1" => Ok(DeviceSelector::Cpu),
            other => other
                .parse::<usize>()
                .map(DeviceSelector::Accelerator)
                .map_err(|_| format!("invalid device `{other}`, expected `cpu` or an index")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SamplingParams {
    /// Upper bound on the sequence length, prompt tokens included.
    pub max_length: usize,
    /// Lower bound on the sequence length before end-of-sequence may be emitted.
    pub min_length: usize,
    pub do_sample: bool,
    pub temperature: f64,
    /// Zero disables top-k filtering.
    pub top_k: usize,
    pub top_p: f64,
    pub num_return_sequences: usize,
    pub truncation: bool,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            max_length: 100,
            min_length: 30,
            do_sample: true,
            temperature: 0.7,
            top_k: 50,
            top_p: 0.95,
            num_return_sequences: 1,
            truncation: true,
        }
    }
}

impl SamplingParams {
    pub fn validate(&self) -> Result<()> {
        if self.max_length == 0 {
            return Err(Error::InvalidArgument(
                "max_length must be at least 1.".to_string(),
            ));
        }
        if self.max_length < self.min_length {
            return Err(Error::InvalidArgument(format!(
                "max_length ({}) must not be smaller than min_length ({}).",
                self.max_length, self.min_length
            )));
        }
        if !(self.temperature > 0.0) {
            return Err(Error::InvalidArgument(format!(
                "temperature must be positive, got {}.",
                self.temperature
            )));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(Error::InvalidArgument(format!(
                "top_p must lie in [0, 1], got {}.",
                self.top_p
            )));
        }
        if self.num_return_sequences == 0 {
            return Err(Error::InvalidArgument(
                "num_return_sequences must be at least 1.".to_string(),
            ));
        }
        Ok(())
    }
}

/// A text completion request.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub model: String,
    #[serde(default)]
    pub revision: Option<String>,
    #[serde(default)]
    pub device: DeviceSelector,
    #[serde(default)]
    pub sampling: SamplingParams,
    /// Falls back to the service's seed policy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            revision: None,
            device: DeviceSelector::default(),
            sampling: SamplingParams::default(),
            seed: None,
        }
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    pub fn with_device(mut self, device: DeviceSelector) -> Self {
        self.device = device;
        self
    }

    pub fn with_sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Checks every precondition that must hold before a model is touched.
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(Error::InvalidArgument("Prompt cannot be empty.".to_string()));
        }
        if self.model.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "Model name cannot be empty.".to_string(),
            ));
        }
        self.sampling.validate()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TextGenResponse {
    pub text: String,
}

impl TextGenResponse {
    pub fn new(text: String) -> Self {
        Self { text }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SentimentRequest {
    pub text: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub device: Option<DeviceSelector>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SentimentResponse {
    pub label: String,
}

impl SentimentResponse {
    pub fn new(label: String) -> Self {
        Self { label }
    }
}

/// One trading day.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Daily bars for one ticker, oldest first.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PriceHistory {
    pub ticker: String,
    pub bars: Vec<PriceBar>,
}
