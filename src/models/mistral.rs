use anyhow::{bail, Error as E, Result};
use candle_core::{DType, Device, Tensor};
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::mistral::Config;
use candle_transformers::models::quantized_mistral::Model;
use candle_transformers::quantized_var_builder::VarBuilder;
use tokenizers::Tokenizer;

use crate::common::SamplingParams;
use crate::models::{GeneratedSequence, ModelSpec, TextGeneration};

const EOS_TOKEN: &str = "</s>";

/// Quantized Mistral 7B loaded from a GGUF file in a hub repo.
pub struct Mistral {
    model: Model,
    tokenizer: Tokenizer,
    device: Device,
    eos_token: u32,
}

impl Mistral {
    pub fn load(spec: &ModelSpec, gguf_file: &str) -> Result<Self> {
        let use_flash_attn = false;

        let device = crate::utils::device(spec.device)?;
        let repo = crate::utils::hub_repo(&spec.model_id, spec.revision.as_deref())?;

        let tokenizer_file = repo.get("tokenizer.json")?;
        let model_file = repo.get(gguf_file)?;

        let tokenizer = Tokenizer::from_file(tokenizer_file).map_err(E::msg)?;
        let eos_token = match tokenizer.token_to_id(EOS_TOKEN) {
            Some(token) => token,
            None => bail!("cannot find the {EOS_TOKEN} token"),
        };

        let config = Config::config_7b_v0_1(use_flash_attn);
        let vb = VarBuilder::from_gguf(model_file, &device)?;
        let model = Model::new(&config, vb)?;

        log::info!("Loaded {} ({}) on {:?}", spec.model_id, gguf_file, device);

        Ok(Self {
            model,
            tokenizer,
            device,
            eos_token,
        })
    }

    fn prompt_tokens(&self, prompt: &str, params: &SamplingParams) -> Result<Vec<u32>> {
        let tokens = self
            .tokenizer
            .encode(prompt, true)
            .map_err(E::msg)?
            .get_ids()
            .to_vec();
        fit_prompt(tokens, params.max_length, params.truncation)
    }

    fn sample_sequence(
        &mut self,
        prompt_tokens: &[u32],
        params: &SamplingParams,
        logits_processor: &mut LogitsProcessor,
    ) -> Result<Vec<u32>> {
        self.model.clear_kv_cache();

        let mut tokens = prompt_tokens.to_vec();
        let budget = params.max_length.saturating_sub(tokens.len());
        let top_k = if params.do_sample { params.top_k } else { 0 };

        for index in 0..budget {
            let context_size = if index > 0 { 1 } else { tokens.len() };
            let start_pos = tokens.len().saturating_sub(context_size);
            let text_context = &tokens[start_pos..];
            let input = Tensor::new(text_context, &self.device)?.unsqueeze(0)?;
            let logits = self.model.forward(&input, start_pos)?;
            let logits = logits.squeeze(0)?.squeeze(0)?.to_dtype(DType::F32)?;

            let suppress_eos = tokens.len() < params.min_length;
            let logits = if suppress_eos || top_k > 0 {
                let mut values = logits.to_vec1::<f32>()?;
                constrain_logits(&mut values, self.eos_token, suppress_eos, top_k);
                Tensor::new(values.as_slice(), &self.device)?
            } else {
                logits
            };

            let next_token = logits_processor.sample(&logits)?;
            tokens.push(next_token);
            if next_token == self.eos_token {
                break;
            }
        }
        Ok(tokens)
    }
}

impl TextGeneration for Mistral {
    fn generate(
        &mut self,
        prompt: &str,
        params: &SamplingParams,
        seed: u64,
    ) -> Result<Vec<GeneratedSequence>> {
        let (temperature, top_p) = sampling_settings(params);
        // One processor per call: candidates share its RNG stream, so the
        // whole batch is a function of `seed`.
        let mut logits_processor = LogitsProcessor::new(seed, temperature, top_p);

        let prompt_tokens = self.prompt_tokens(prompt, params)?;
        let start_time = std::time::Instant::now();

        let mut sequences = Vec::with_capacity(params.num_return_sequences);
        for _ in 0..params.num_return_sequences {
            let tokens = self.sample_sequence(&prompt_tokens, params, &mut logits_processor)?;
            let generated_text = self.tokenizer.decode(&tokens, true).map_err(E::msg)?;
            sequences.push(GeneratedSequence { generated_text });
        }

        log::info!(
            "{} sequence(s) generated in {:.2}s",
            sequences.len(),
            start_time.elapsed().as_secs_f64()
        );
        Ok(sequences)
    }
}

/// Temperature and nucleus settings for `LogitsProcessor`. `None` temperature
/// means greedy decoding. An empty nucleus (`top_p == 0`) keeps only the most
/// likely token, which is greedy as well.
fn sampling_settings(params: &SamplingParams) -> (Option<f64>, Option<f64>) {
    if !params.do_sample || params.top_p <= 0.0 {
        return (None, None);
    }
    let top_p = (params.top_p < 1.0).then_some(params.top_p);
    (Some(params.temperature), top_p)
}

/// Prompts longer than `max_length` are cut when `truncation` is set and
/// rejected otherwise.
fn fit_prompt(mut tokens: Vec<u32>, max_length: usize, truncation: bool) -> Result<Vec<u32>> {
    if tokens.len() > max_length {
        if !truncation {
            bail!(
                "prompt is {} tokens long, which exceeds max_length {}",
                tokens.len(),
                max_length
            );
        }
        tokens.truncate(max_length);
    }
    Ok(tokens)
}

/// Bans end-of-sequence while the minimum length is unmet and keeps only the
/// `top_k` highest logits (ties at the threshold survive). `top_k == 0`
/// disables the filter.
fn constrain_logits(values: &mut [f32], eos_token: u32, suppress_eos: bool, top_k: usize) {
    if suppress_eos {
        if let Some(logit) = values.get_mut(eos_token as usize) {
            *logit = f32::NEG_INFINITY;
        }
    }
    if top_k == 0 || top_k >= values.len() {
        return;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));
    let threshold = sorted[top_k - 1];
    for logit in values.iter_mut() {
        if *logit < threshold {
            *logit = f32::NEG_INFINITY;
        }
    }
}
