//! Local models run with the Candle ML framework.
//!
//! This module is only available when the `candle` feature is enabled.
//! Weights and tokenizers are fetched from the Hugging Face hub and cached
//! locally on first use.

mod bert;
mod t5;

use std::fmt::Display;
use std::path::PathBuf;

use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use hf_hub::api::sync::Api;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::error::{RagError, Result};

pub use bert::{CandleBertEmbeddingProvider, DEFAULT_EMBEDDING_MODEL};
pub use t5::T5Model;

fn unavailable(component: &str, message: impl Display) -> RagError {
    RagError::ModelUnavailable { component: component.to_string(), message: message.to_string() }
}

/// The files of a downloaded checkpoint.
struct ModelFiles {
    config: PathBuf,
    weights: PathBuf,
    tokenizer: PathBuf,
}

impl ModelFiles {
    /// Download (or find in the local cache) the files of `model_id`.
    fn fetch(model_id: &str, component: &str) -> Result<Self> {
        info!(model = model_id, "fetching model from Hugging Face hub");
        let api = Api::new().map_err(|e| unavailable(component, format!("hub client: {e}")))?;
        let repo = api.model(model_id.to_string());
        let get = |file: &str| {
            repo.get(file).map_err(|e| {
                unavailable(component, format!("{model_id}: cannot fetch {file}: {e}"))
            })
        };

        let files = Self {
            config: get("config.json")?,
            weights: get("model.safetensors")?,
            tokenizer: get("tokenizer.json")?,
        };
        debug!(model = model_id, weights = %files.weights.display(), "model files ready");
        Ok(files)
    }

    fn read_config<T: serde::de::DeserializeOwned>(&self, component: &str) -> Result<T> {
        let raw = std::fs::read_to_string(&self.config)
            .map_err(|e| unavailable(component, format!("cannot read config.json: {e}")))?;
        serde_json::from_str(&raw)
            .map_err(|e| unavailable(component, format!("invalid config.json: {e}")))
    }

    fn tokenizer(&self, component: &str) -> Result<Tokenizer> {
        Tokenizer::from_file(&self.tokenizer)
            .map_err(|e| unavailable(component, format!("tokenizer: {e}")))
    }

    fn var_builder(&self, device: &Device, component: &str) -> Result<VarBuilder<'static>> {
        // SAFETY: the weights file lives in the hub cache and is not modified while mapped.
        unsafe { VarBuilder::from_mmaped_safetensors(&[&self.weights], DType::F32, device) }
            .map_err(|e| unavailable(component, format!("cannot load weights: {e}")))
    }
}

/// The first CUDA device if one is available, otherwise the CPU.
fn select_device() -> Device {
    Device::cuda_if_available(0).unwrap_or(Device::Cpu)
}
