//! Inference engines.
//!
//! The service only talks to [`InferenceEngine`]; [`CandleEngine`] is the
//! local implementation backed by candle and the Hugging Face hub.

pub mod distilbert;
pub mod mistral;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::common::{DeviceSelector, SamplingParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    TextGeneration,
    SentimentAnalysis,
}

impl Task {
    pub fn as_str(&self) -> &'static str {
        match self {
            Task::TextGeneration => "text-generation",
            Task::SentimentAnalysis => "sentiment-analysis",
        }
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to load and where to put it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub task: Task,
    pub model_id: String,
    pub revision: Option<String>,
    pub device: DeviceSelector,
}

impl ModelSpec {
    pub fn new(task: Task, model_id: impl Into<String>, device: DeviceSelector) -> Self {
        Self {
            task,
            model_id: model_id.into(),
            revision: None,
            device,
        }
    }

    pub fn with_revision(mut self, revision: Option<String>) -> Self {
        self.revision = revision;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GeneratedSequence {
    pub generated_text: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SentimentPrediction {
    pub label: String,
    pub score: f32,
}

pub trait TextGeneration {
    /// Produces `params.num_return_sequences` candidates.
    ///
    /// All sampling randomness must derive from `seed`.
    fn generate(
        &mut self,
        prompt: &str,
        params: &SamplingParams,
        seed: u64,
    ) -> Result<Vec<GeneratedSequence>>;
}

pub trait SentimentAnalysis {
    /// Predictions ordered from most to least likely.
    fn classify(&mut self, text: &str) -> Result<Vec<SentimentPrediction>>;
}

pub trait InferenceEngine: Send + Sync {
    fn text_generation(&self, spec: &ModelSpec) -> Result<Box<dyn TextGeneration>>;

    fn sentiment_analysis(&self, spec: &ModelSpec) -> Result<Box<dyn SentimentAnalysis>>;
}

/// Loads quantized Mistral generators and DistilBERT classifiers from the hub.
#[derive(Debug, Clone)]
pub struct CandleEngine {
    gguf_file: String,
}

impl CandleEngine {
    pub fn new(gguf_file: impl Into<String>) -> Self {
        Self {
            gguf_file: gguf_file.into(),
        }
    }
}

impl InferenceEngine for CandleEngine {
    fn text_generation(&self, spec: &ModelSpec) -> Result<Box<dyn TextGeneration>> {
        Ok(Box::new(mistral::Mistral::load(spec, &self.gguf_file)?))
    }

    fn sentiment_analysis(&self, spec: &ModelSpec) -> Result<Box<dyn SentimentAnalysis>> {
        Ok(Box::new(distilbert::SentimentClassifier::load(spec)?))
    }
}
