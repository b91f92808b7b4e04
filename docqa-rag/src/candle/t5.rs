//! T5 encoder-decoder generation.

use std::sync::Mutex;

use candle_core::{Device, Tensor};
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::t5::{Config as T5Config, T5ForConditionalGeneration};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use super::{ModelFiles, select_device, unavailable};
use crate::error::{RagError, Result};
use crate::generator::{DecodingParams, Seq2SeqModel};

const COMPONENT: &str = "generator";

/// A T5 checkpoint loaded for conditional generation.
///
/// The model keeps a key/value cache across decoding steps, so it sits behind
/// a mutex and generates one prompt at a time.
pub struct T5Model {
    model_id: String,
    model: Mutex<T5ForConditionalGeneration>,
    tokenizer: Tokenizer,
    device: Device,
    decoder_start_token: u32,
    eos_token: u32,
}

impl T5Model {
    /// Load `model_id` (for example `t5-base`) from the hub. Blocks while
    /// downloading and loading.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ModelUnavailable`] if the model cannot be fetched or built.
    pub fn load(model_id: &str) -> Result<Self> {
        let files = ModelFiles::fetch(model_id, COMPONENT)?;
        let mut config: T5Config = files.read_config(COMPONENT)?;
        config.use_cache = true;
        let device = select_device();
        let tokenizer = files.tokenizer(COMPONENT)?;

        let weights = files.var_builder(&device, COMPONENT)?;
        let model = T5ForConditionalGeneration::load(weights, &config)
            .map_err(|e| unavailable(COMPONENT, format!("cannot build T5 model: {e}")))?;

        let decoder_start_token =
            config.decoder_start_token_id.unwrap_or(config.pad_token_id) as u32;
        info!(
            model = model_id,
            layers = config.num_layers,
            device = ?device,
            "loaded generation model"
        );

        Ok(Self {
            model_id: model_id.to_string(),
            model: Mutex::new(model),
            tokenizer,
            device,
            decoder_start_token,
            eos_token: config.eos_token_id as u32,
        })
    }

    fn failure(&self, message: impl std::fmt::Display) -> RagError {
        RagError::GenerationFailure { backend: self.model_id.clone(), message: message.to_string() }
    }

    fn run(&self, prompt: &str, params: &DecodingParams) -> candle_core::Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| candle_core::Error::Msg(format!("tokenization failed: {e}")))?;
        let mut input = encoding.get_ids().to_vec();
        // Keep the tail: the question and answer marker come last.
        if input.len() > params.max_input_tokens {
            input.drain(..input.len() - params.max_input_tokens);
        }

        let mut model = self
            .model
            .lock()
            .map_err(|_| candle_core::Error::Msg("model mutex poisoned".into()))?;
        model.clear_kv_cache();

        let input_ids = Tensor::new(input.as_slice(), &self.device)?.unsqueeze(0)?;
        let encoder_output = model.encode(&input_ids)?;

        let temperature = (params.temperature > 0.0).then_some(params.temperature);
        let top_p = (params.top_p < 1.0).then_some(params.top_p);
        let mut sampler = LogitsProcessor::new(params.seed, temperature, top_p);

        let mut output = vec![self.decoder_start_token];
        while output.len() <= params.max_length {
            let step = if output.len() == 1 { &output[..] } else { &output[output.len() - 1..] };
            let decoder_ids = Tensor::new(step, &self.device)?.unsqueeze(0)?;
            let logits = model.decode(&decoder_ids, &encoder_output)?.squeeze(0)?;
            let next = sampler.sample(&logits)?;
            if next == self.eos_token {
                break;
            }
            output.push(next);
        }

        Ok(output.split_off(1))
    }
}

impl Seq2SeqModel for T5Model {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn generate(&self, prompt: &str, params: &DecodingParams) -> Result<String> {
        let tokens = self.run(prompt, params).map_err(|e| self.failure(e))?;
        debug!(model = %self.model_id, generated_tokens = tokens.len(), "decoding finished");
        self.tokenizer
            .decode(&tokens, true)
            .map_err(|e| self.failure(format!("detokenization failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Downloads weights from the hub; run with `cargo test --features candle -- --ignored`.
    #[test]
    #[ignore]
    fn t5_small_generates_text() {
        let model = T5Model::load("t5-small").unwrap();
        let params =
            DecodingParams { max_length: 32, temperature: 0.0, ..DecodingParams::default() };
        let prompt = "translate English to German: The house is small.";
        let text = model.generate(prompt, &params).unwrap();
        assert!(!text.trim().is_empty());
    }
}
