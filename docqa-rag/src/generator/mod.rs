//! Answer generation from a question and retrieved context.
//!
//! [`AnswerGenerator`] builds the prompt and drives one [`GenerationBackend`].
//! Two backend families exist: a hosted chat-completion API
//! ([`HostedChatBackend`], feature `openai`) and a local sequence-to-sequence
//! model ([`LocalSeq2SeqBackend`]). Which one is used is decided when the
//! generator is constructed, never per call.

mod config;
#[cfg(feature = "openai")]
mod hosted;
mod local;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::{RagError, Result, with_timeout};

pub use config::{
    DEFAULT_BASE_URL, DEFAULT_HOSTED_MODEL, DecodingParams, GeneratorConfig, HostedConfig,
    LocalConfig, LocalModelSize,
};
#[cfg(feature = "openai")]
pub use hosted::HostedChatBackend;
pub use local::{LocalSeq2SeqBackend, Seq2SeqModel};

/// Returned when retrieval found nothing to answer from.
pub const NO_CONTEXT_ANSWER: &str =
    "I could not find any relevant information in the uploaded documents to answer this question.";

/// Returned to the user when the backend fails.
pub const APOLOGY_ANSWER: &str =
    "Sorry, something went wrong while generating the answer. Please try again later.";

/// System instruction sent with every request.
pub const SYSTEM_INSTRUCTION: &str = "You are an assistant that answers questions about the \
     user's documents using only the provided context.";

/// The two messages sent to a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    /// Build the grounded question prompt.
    pub fn for_question(query: &str, context: &str) -> Self {
        let user = format!(
            "Answer the question using only the context below. \
             If the context does not contain the information needed, say so.\n\n\
             Context:\n{context}\n\n\
             Question: {query}\n\n\
             Answer:"
        );
        Self { system: SYSTEM_INSTRUCTION.to_string(), user }
    }

    /// Flatten into a single prompt string for models without chat roles.
    pub fn render(&self) -> String {
        format!("{}\n\n{}", self.system, self.user)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Hosted,
    Local,
}

/// What a backend reports about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendInfo {
    pub kind: BackendKind,
    pub model: String,
    pub description: String,
}

/// A text-generation backend.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Describe the backend and model.
    fn info(&self) -> BackendInfo;

    /// Produce a completion for the prompt.
    async fn complete(&self, prompt: &Prompt) -> Result<String>;
}

/// Produces natural-language answers from a question and retrieved context.
///
/// Every failure of the backend surfaces as [`RagError::GenerationFailure`]
/// or [`RagError::Timeout`]; callers decide how to present them.
#[derive(Clone)]
pub struct AnswerGenerator {
    backend: Arc<dyn GenerationBackend>,
    timeout: Option<Duration>,
}

impl AnswerGenerator {
    /// Wrap a backend with no time limit.
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend, timeout: None }
    }

    /// Bound every backend call by `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the backend described by `config`.
    ///
    /// Local models are loaded on the blocking thread pool.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ModelUnavailable`] if the backend cannot be
    /// initialized, including when the crate was built without the feature
    /// the backend needs.
    pub async fn from_config(config: &GeneratorConfig) -> Result<Self> {
        let backend: Arc<dyn GenerationBackend> = match config {
            GeneratorConfig::Hosted(hosted) => hosted_backend(hosted)?,
            GeneratorConfig::Local(local) => local_backend(local).await?,
        };
        let info = backend.info();
        info!(kind = ?info.kind, model = %info.model, "generation backend ready");
        Ok(Self::new(backend))
    }

    /// Describe the active backend.
    pub fn info(&self) -> BackendInfo {
        self.backend.info()
    }

    /// Answer `query` from `context`.
    ///
    /// Blank context short-circuits to [`NO_CONTEXT_ANSWER`] without calling
    /// the backend.
    pub async fn generate(&self, query: &str, context: &str) -> Result<String> {
        if context.trim().is_empty() {
            debug!("no context retrieved; skipping backend");
            return Ok(NO_CONTEXT_ANSWER.to_string());
        }

        let prompt = Prompt::for_question(query, context);
        let model = self.backend.info().model;

        let answer = with_timeout("generation", self.timeout, self.backend.complete(&prompt))
            .await
            .map_err(|e| match e {
                RagError::Timeout { .. } | RagError::GenerationFailure { .. } => e,
                other => RagError::GenerationFailure {
                    backend: model.clone(),
                    message: other.to_string(),
                },
            })
            .inspect_err(|e| error!(backend = %model, error = %e, "generation failed"))?;

        let answer = answer.trim();
        if answer.is_empty() {
            error!(backend = %model, "backend returned an empty answer");
            return Err(RagError::GenerationFailure {
                backend: model,
                message: "backend returned an empty answer".to_string(),
            });
        }
        Ok(answer.to_string())
    }
}

#[cfg(feature = "openai")]
fn hosted_backend(config: &HostedConfig) -> Result<Arc<dyn GenerationBackend>> {
    Ok(Arc::new(HostedChatBackend::new(config.clone())?))
}

#[cfg(not(feature = "openai"))]
fn hosted_backend(_config: &HostedConfig) -> Result<Arc<dyn GenerationBackend>> {
    Err(RagError::ModelUnavailable {
        component: "generator".to_string(),
        message: "hosted generation requires the `openai` feature".to_string(),
    })
}

#[cfg(feature = "candle")]
async fn local_backend(config: &LocalConfig) -> Result<Arc<dyn GenerationBackend>> {
    let model_id = config.model_id().to_string();
    let model = tokio::task::spawn_blocking(move || crate::candle::T5Model::load(&model_id))
        .await
        .map_err(|e| RagError::ModelUnavailable {
            component: "generator".to_string(),
            message: format!("model loading task failed: {e}"),
        })??;
    let description = config.size.description().to_string();
    let backend = LocalSeq2SeqBackend::new(Arc::new(model), config.decoding.clone())
        .with_description(description);
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "candle"))]
async fn local_backend(_config: &LocalConfig) -> Result<Arc<dyn GenerationBackend>> {
    Err(RagError::ModelUnavailable {
        component: "generator".to_string(),
        message: "local generation requires the `candle` feature".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct ScriptedBackend {
        reply: Result<String>,
        prompts: Mutex<Vec<Prompt>>,
    }

    impl ScriptedBackend {
        fn replying(reply: Result<String>) -> Arc<Self> {
            Arc::new(Self { reply, prompts: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl GenerationBackend for ScriptedBackend {
        fn info(&self) -> BackendInfo {
            BackendInfo {
                kind: BackendKind::Local,
                model: "scripted".into(),
                description: String::new(),
            }
        }

        async fn complete(&self, prompt: &Prompt) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.clone());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(e) => {
                    Err(RagError::EmbeddingError { provider: "x".into(), message: e.to_string() })
                }
            }
        }
    }

    #[test]
    fn prompt_contains_context_and_question() {
        let prompt = Prompt::for_question("Where?", "On the mat.");
        assert!(prompt.user.contains("Context:\nOn the mat."));
        assert!(prompt.user.contains("Question: Where?"));
        assert!(prompt.user.ends_with("Answer:"));
        assert!(prompt.user.contains("say so"));
        assert!(prompt.render().starts_with(SYSTEM_INSTRUCTION));
    }

    #[tokio::test]
    async fn empty_context_skips_backend() {
        let backend = ScriptedBackend::replying(Ok("unused".into()));
        let generator = AnswerGenerator::new(backend.clone());

        let answer = generator.generate("anything", "  \n").await.unwrap();

        assert_eq!(answer, NO_CONTEXT_ANSWER);
        assert!(backend.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn answer_is_trimmed() {
        let backend = ScriptedBackend::replying(Ok("  On the mat.\n".into()));
        let generator = AnswerGenerator::new(backend.clone());

        let answer = generator.generate("Where?", "The cat sat on the mat.").await.unwrap();
        assert_eq!(answer, "On the mat.");
        assert_eq!(backend.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn backend_errors_become_generation_failures() {
        let backend = ScriptedBackend::replying(Err(RagError::ConfigError("quota".into())));
        let err = AnswerGenerator::new(backend).generate("q", "ctx").await.unwrap_err();
        assert!(matches!(
            err,
            RagError::GenerationFailure { ref backend, .. } if backend == "scripted"
        ));
    }

    #[tokio::test]
    async fn blank_answer_is_a_failure() {
        let backend = ScriptedBackend::replying(Ok("   ".into()));
        let err = AnswerGenerator::new(backend).generate("q", "ctx").await.unwrap_err();
        assert!(matches!(err, RagError::GenerationFailure { .. }));
    }

    #[cfg(not(feature = "openai"))]
    #[tokio::test]
    async fn hosted_without_feature_is_unavailable() {
        let result = AnswerGenerator::from_config(&GeneratorConfig::hosted("sk-test")).await;
        assert!(matches!(result, Err(RagError::ModelUnavailable { .. })));
    }
}
