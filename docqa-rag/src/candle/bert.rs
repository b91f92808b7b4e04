//! Sentence embeddings from a BERT-family encoder.

use std::sync::Arc;

use async_trait::async_trait;
use candle_core::{D, Device, Tensor};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::{PaddingParams, Tokenizer, TruncationParams};
use tracing::{debug, error, info};

use super::{ModelFiles, select_device, unavailable};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// Sentence-transformer used when no model is configured.
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

const COMPONENT: &str = "embedder";

/// Longest input, in tokens, fed to the encoder.
const MAX_TOKENS: usize = 256;

struct Encoder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

impl Encoder {
    fn load(model_id: &str) -> Result<(Self, usize)> {
        let files = ModelFiles::fetch(model_id, COMPONENT)?;
        let config: BertConfig = files.read_config(COMPONENT)?;
        let device = select_device();

        let mut tokenizer = files.tokenizer(COMPONENT)?;
        tokenizer.with_padding(Some(PaddingParams::default()));
        let truncation = TruncationParams { max_length: MAX_TOKENS, ..Default::default() };
        tokenizer
            .with_truncation(Some(truncation))
            .map_err(|e| unavailable(COMPONENT, format!("tokenizer truncation: {e}")))?;

        let model = BertModel::load(files.var_builder(&device, COMPONENT)?, &config)
            .map_err(|e| unavailable(COMPONENT, format!("cannot build BERT model: {e}")))?;

        info!(
            model = model_id,
            hidden_size = config.hidden_size,
            device = ?device,
            "loaded embedding model"
        );
        Ok((Self { model, tokenizer, device }, config.hidden_size))
    }

    /// Mean-pooled, L2-normalized embeddings, one row per text.
    fn encode(&self, texts: &[String]) -> candle_core::Result<Vec<Vec<f32>>> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| candle_core::Error::Msg(format!("tokenization failed: {e}")))?;

        let ids = encodings
            .iter()
            .map(|e| Tensor::new(e.get_ids(), &self.device))
            .collect::<candle_core::Result<Vec<_>>>()?;
        let mask = encodings
            .iter()
            .map(|e| Tensor::new(e.get_attention_mask(), &self.device))
            .collect::<candle_core::Result<Vec<_>>>()?;

        let input_ids = Tensor::stack(&ids, 0)?;
        let attention_mask = Tensor::stack(&mask, 0)?;
        let token_type_ids = input_ids.zeros_like()?;

        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        let mask = attention_mask.unsqueeze(2)?.to_dtype(hidden.dtype())?;
        let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
        let counts = mask.sum(1)?.clamp(1e-9, f64::MAX)?;
        let pooled = summed.broadcast_div(&counts)?;

        let norms = pooled.sqr()?.sum_keepdim(D::Minus1)?.sqrt()?.clamp(1e-12, f64::MAX)?;
        pooled.broadcast_div(&norms)?.to_vec2()
    }
}

/// An [`EmbeddingProvider`] running a sentence-transformer locally.
///
/// Inference runs on the blocking thread pool.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::CandleBertEmbeddingProvider;
///
/// let provider = CandleBertEmbeddingProvider::load(DEFAULT_EMBEDDING_MODEL)?;
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct CandleBertEmbeddingProvider {
    encoder: Arc<Encoder>,
    model_id: String,
    dimensions: usize,
}

impl CandleBertEmbeddingProvider {
    /// Load `model_id` from the hub. Blocks while downloading and loading.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ModelUnavailable`] if the model cannot be fetched or built.
    pub fn load(model_id: &str) -> Result<Self> {
        let (encoder, dimensions) = Encoder::load(model_id).inspect_err(|e| {
            error!(model = model_id, error = %e, "failed to load embedding model");
        })?;
        Ok(Self { encoder: Arc::new(encoder), model_id: model_id.to_string(), dimensions })
    }

    fn failure(&self, message: impl std::fmt::Display) -> RagError {
        RagError::EmbeddingError { provider: self.model_id.clone(), message: message.to_string() }
    }
}

#[async_trait]
impl EmbeddingProvider for CandleBertEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| self.failure("no embedding produced"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(provider = %self.model_id, batch_size = texts.len(), "embedding batch");

        let encoder = Arc::clone(&self.encoder);
        let owned: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        tokio::task::spawn_blocking(move || encoder.encode(&owned))
            .await
            .map_err(|e| self.failure(format!("inference task failed: {e}")))?
            .map_err(|e| {
                error!(provider = %self.model_id, error = %e, "embedding inference failed");
                self.failure(e)
            })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        &self.model_id
    }
}
