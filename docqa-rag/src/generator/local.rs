//! Local sequence-to-sequence generation.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use super::{BackendInfo, BackendKind, DecodingParams, GenerationBackend, Prompt};
use crate::error::{RagError, Result};

/// Marker after which a seq2seq model's output holds the answer.
const ANSWER_MARKER: &str = "Answer:";

/// A loaded encoder-decoder model that maps a prompt to generated text.
///
/// Inference is synchronous and CPU/GPU bound; [`LocalSeq2SeqBackend`] runs it
/// on the blocking thread pool.
pub trait Seq2SeqModel: Send + Sync {
    /// Identifier of the loaded checkpoint.
    fn model_id(&self) -> &str;

    /// Generate text for `prompt`.
    fn generate(&self, prompt: &str, params: &DecodingParams) -> Result<String>;
}

/// [`GenerationBackend`] over a local [`Seq2SeqModel`].
pub struct LocalSeq2SeqBackend {
    model: Arc<dyn Seq2SeqModel>,
    params: DecodingParams,
    description: String,
}

impl LocalSeq2SeqBackend {
    pub fn new(model: Arc<dyn Seq2SeqModel>, params: DecodingParams) -> Self {
        Self { model, params, description: "Local sequence-to-sequence model".to_string() }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Keep only what follows the last answer marker, if the model echoed the prompt.
fn extract_answer(output: &str) -> &str {
    output.rsplit_once(ANSWER_MARKER).map_or(output, |(_, answer)| answer).trim()
}

#[async_trait]
impl GenerationBackend for LocalSeq2SeqBackend {
    fn info(&self) -> BackendInfo {
        BackendInfo {
            kind: BackendKind::Local,
            model: self.model.model_id().to_string(),
            description: self.description.clone(),
        }
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let model = Arc::clone(&self.model);
        let params = self.params.clone();
        let rendered = prompt.render();
        debug!(model = model.model_id(), prompt_len = rendered.len(), "local generation");

        let output = tokio::task::spawn_blocking(move || model.generate(&rendered, &params))
            .await
            .map_err(|e| {
                error!(error = %e, "local inference task failed");
                RagError::GenerationFailure {
                    backend: self.model.model_id().to_string(),
                    message: format!("inference task failed: {e}"),
                }
            })??;

        Ok(extract_answer(&output).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoModel;

    impl Seq2SeqModel for EchoModel {
        fn model_id(&self) -> &str {
            "echo"
        }

        fn generate(&self, prompt: &str, params: &DecodingParams) -> Result<String> {
            Ok(format!("{prompt} mat (max {})", params.max_length))
        }
    }

    struct BrokenModel;

    impl Seq2SeqModel for BrokenModel {
        fn model_id(&self) -> &str {
            "broken"
        }

        fn generate(&self, _prompt: &str, _params: &DecodingParams) -> Result<String> {
            Err(RagError::GenerationFailure {
                backend: "broken".into(),
                message: "CUDA OOM".into(),
            })
        }
    }

    #[test]
    fn extracts_text_after_last_marker() {
        assert_eq!(extract_answer("Question: q\n\nAnswer: on the mat "), "on the mat");
        assert_eq!(extract_answer("plain output"), "plain output");
    }

    #[tokio::test]
    async fn strips_echoed_prompt() {
        let backend = LocalSeq2SeqBackend::new(Arc::new(EchoModel), DecodingParams::default());
        let answer = backend.complete(&Prompt::for_question("Where?", "The mat.")).await.unwrap();
        assert_eq!(answer, "mat (max 512)");
        assert_eq!(backend.info().kind, BackendKind::Local);
        assert_eq!(backend.info().model, "echo");
    }

    #[tokio::test]
    async fn model_errors_propagate() {
        let backend = LocalSeq2SeqBackend::new(Arc::new(BrokenModel), DecodingParams::default());
        let err = backend.complete(&Prompt::for_question("q", "c")).await.unwrap_err();
        assert!(matches!(err, RagError::GenerationFailure { .. }));
    }
}
