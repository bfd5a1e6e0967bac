//! Sequence classification head on top of candle's DistilBERT encoder, enough
//! to run the hub's `DistilBertForSequenceClassification` checkpoints.

use std::collections::HashMap;

use anyhow::{Error as E, Result};
use candle_core::{DType, Device, IndexOp, Module, Tensor, D};
use candle_nn::{linear, Linear, VarBuilder};
use candle_transformers::models::distilbert::{Config as EncoderConfig, DistilBertModel};
use serde::Deserialize;
use tokenizers::Tokenizer;

use crate::models::{ModelSpec, SentimentAnalysis, SentimentPrediction};

fn default_max_position_embeddings() -> usize {
    512
}

/// The parts of `config.json` the classification head needs. The encoder
/// reads its own view of the same file.
#[derive(Debug, Clone, Deserialize)]
pub struct HeadConfig {
    pub dim: usize,
    #[serde(default = "default_max_position_embeddings")]
    pub max_position_embeddings: usize,
    #[serde(default)]
    pub id2label: HashMap<String, String>,
}

impl HeadConfig {
    /// Checkpoints without `id2label` are binary.
    pub fn num_labels(&self) -> usize {
        if self.id2label.is_empty() {
            2
        } else {
            self.id2label.len()
        }
    }

    pub fn label(&self, index: usize) -> String {
        self.id2label
            .get(&index.to_string())
            .cloned()
            .unwrap_or_else(|| format!("LABEL_{index}"))
    }
}

struct Classifier {
    encoder: DistilBertModel,
    pre_classifier: Linear,
    classifier: Linear,
}

impl Classifier {
    /// `vb` is the checkpoint root; the encoder resolves its own
    /// `distilbert.` prefix from `model_type`.
    fn load(vb: VarBuilder, encoder_config: &EncoderConfig, head: &HeadConfig) -> Result<Self> {
        Ok(Self {
            encoder: DistilBertModel::load(vb.clone(), encoder_config)?,
            pre_classifier: linear(head.dim, head.dim, vb.pp("pre_classifier"))?,
            classifier: linear(head.dim, head.num_labels(), vb.pp("classifier"))?,
        })
    }

    /// Class logits of shape `(batch, num_labels)`.
    fn forward(&self, input_ids: &Tensor) -> Result<Tensor> {
        let (_, seq_len) = input_ids.dims2()?;
        let mask = attention_mask(seq_len, input_ids.device())?;
        let hidden = self.encoder.forward(input_ids, &mask)?;
        let cls = hidden.i((.., 0))?;
        let pooled = self.pre_classifier.forward(&cls)?.relu()?;
        Ok(self.classifier.forward(&pooled)?)
    }
}

/// Square mask over one unpadded sequence. Nonzero entries are hidden from
/// attention by candle's encoder, so every position stays visible.
fn attention_mask(seq_len: usize, device: &Device) -> Result<Tensor> {
    Ok(Tensor::zeros((seq_len, seq_len), DType::U8, device)?)
}

pub struct SentimentClassifier {
    model: Classifier,
    head: HeadConfig,
    tokenizer: Tokenizer,
    device: Device,
}

impl SentimentClassifier {
    pub fn load(spec: &ModelSpec) -> Result<Self> {
        let device = crate::utils::device(spec.device)?;
        let repo = crate::utils::hub_repo(&spec.model_id, spec.revision.as_deref())?;

        let config_file = repo.get("config.json")?;
        let tokenizer_file = repo.get("tokenizer.json")?;
        let weights_file = repo.get("model.safetensors")?;

        let config = std::fs::read_to_string(config_file)?;
        let encoder_config: EncoderConfig = serde_json::from_str(&config)?;
        let head: HeadConfig = serde_json::from_str(&config)?;
        let tokenizer = Tokenizer::from_file(tokenizer_file).map_err(E::msg)?;
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights_file], DType::F32, &device)? };
        let model = Classifier::load(vb, &encoder_config, &head)?;

        log::info!("Loaded {} on {:?}", spec.model_id, device);

        Ok(Self {
            model,
            head,
            tokenizer,
            device,
        })
    }
}

impl SentimentAnalysis for SentimentClassifier {
    fn classify(&mut self, text: &str) -> Result<Vec<SentimentPrediction>> {
        let mut ids = self
            .tokenizer
            .encode(text, true)
            .map_err(E::msg)?
            .get_ids()
            .to_vec();
        ids.truncate(self.head.max_position_embeddings);

        let input_ids = Tensor::new(ids.as_slice(), &self.device)?.unsqueeze(0)?;
        let logits = self.model.forward(&input_ids)?;
        let scores = candle_nn::ops::softmax(&logits, D::Minus1)?
            .squeeze(0)?
            .to_vec1::<f32>()?;
        Ok(rank_predictions(&self.head, &scores))
    }
}

fn rank_predictions(head: &HeadConfig, scores: &[f32]) -> Vec<SentimentPrediction> {
    let mut predictions: Vec<SentimentPrediction> = scores
        .iter()
        .enumerate()
        .map(|(index, &score)| SentimentPrediction {
            label: head.label(index),
            score,
        })
        .collect();
    predictions.sort_by(|a, b| b.score.total_cmp(&a.score));
    predictions
}
