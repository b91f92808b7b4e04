//! Command-line and environment settings.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use docqa_rag::{
    EmbeddingProvider, GeneratorConfig, HashingEmbeddingProvider, HostedConfig, LocalModelSize,
    OpenAIEmbeddingProvider, RagConfig,
};
use tracing::info;

/// Embedder name that selects the model-free hashing embedder.
const HASHING_EMBEDDER: &str = "hashing";

#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// SQLite database holding the uploaded documents
    #[arg(long, env = "DOCQA_DATABASE", default_value = "docqa.db", global = true)]
    pub database: PathBuf,

    /// API key for the hosted backend; without it a local model is used
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    pub openai_api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL", global = true)]
    pub openai_base_url: Option<String>,

    /// Hosted chat model
    #[arg(long, env = "LLM_MODEL", global = true)]
    pub llm_model: Option<String>,

    /// Local model size used when no API key is configured; overrides the
    /// size saved with `docqa model <size>`
    #[arg(long, env = "DOCQA_MODEL_SIZE", global = true)]
    pub model_size: Option<LocalModelSize>,

    /// Embedding model: `hashing`, an OpenAI `text-embedding-*` model, or a
    /// Hugging Face sentence-transformer
    #[arg(long, env = "EMBEDDING_MODEL", global = true)]
    pub embedding_model: Option<String>,

    /// Number of chunks retrieved per question
    #[arg(long, env = "TOP_K", default_value_t = 3, global = true)]
    pub top_k: usize,

    /// Target chunk size in characters
    #[arg(long, env = "CHUNK_SIZE", default_value_t = 1000, global = true)]
    pub chunk_size: usize,

    /// Limit for each embedding and generation call, in seconds (0 disables)
    #[arg(long, env = "DOCQA_TIMEOUT_SECS", default_value_t = 60, global = true)]
    pub timeout_secs: u64,
}

impl Settings {
    pub fn rag_config(&self) -> Result<RagConfig> {
        let timeout = (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs));
        let config = RagConfig::builder()
            .chunk_size(self.chunk_size)
            .top_k(self.top_k)
            .timeout(timeout)
            .build()?;
        Ok(config)
    }

    fn api_key(&self) -> Option<&str> {
        self.openai_api_key.as_deref().filter(|key| !key.trim().is_empty())
    }

    fn base_url(&self) -> Option<&str> {
        self.openai_base_url.as_deref().filter(|url| !url.trim().is_empty())
    }

    /// The hosted backend when an API key is configured, otherwise the local
    /// model. An explicit `--model-size` wins over the `saved` size.
    pub fn generator_config(&self, saved: Option<LocalModelSize>) -> GeneratorConfig {
        match self.api_key() {
            Some(key) => {
                let mut hosted = HostedConfig::new(key);
                if let Some(model) = &self.llm_model {
                    hosted = hosted.with_model(model.clone());
                }
                if let Some(base_url) = self.base_url() {
                    hosted = hosted.with_base_url(base_url);
                }
                GeneratorConfig::Hosted(hosted)
            }
            None => GeneratorConfig::local(self.model_size.or(saved).unwrap_or_default()),
        }
    }

    pub async fn embedding_provider(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        let provider: Arc<dyn EmbeddingProvider> = match self.embedding_model.as_deref() {
            Some(HASHING_EMBEDDER) => Arc::new(HashingEmbeddingProvider::default()),
            Some(model) if model.starts_with("text-embedding-") => {
                let key = self.api_key().ok_or_else(|| {
                    anyhow::anyhow!("embedding model '{model}' requires OPENAI_API_KEY")
                })?;
                let mut provider = OpenAIEmbeddingProvider::new(key)?.with_model(model);
                if let Some(base_url) = self.base_url() {
                    provider = provider.with_base_url(base_url);
                }
                Arc::new(provider)
            }
            other => local_embedder(other.map(str::to_string)).await?,
        };
        info!(embedder = provider.name(), dimensions = provider.dimensions(), "embedder ready");
        Ok(provider)
    }
}

/// Download and load the sentence-transformer on the blocking pool.
#[cfg(feature = "candle")]
async fn local_embedder(model: Option<String>) -> Result<Arc<dyn EmbeddingProvider>> {
    let model = model.unwrap_or_else(|| docqa_rag::DEFAULT_EMBEDDING_MODEL.to_string());
    let provider = tokio::task::spawn_blocking(move || {
        docqa_rag::CandleBertEmbeddingProvider::load(&model)
    })
    .await??;
    Ok(Arc::new(provider))
}

#[cfg(not(feature = "candle"))]
async fn local_embedder(model: Option<String>) -> Result<Arc<dyn EmbeddingProvider>> {
    match model {
        None => Ok(Arc::new(HashingEmbeddingProvider::default())),
        Some(model) => {
            anyhow::bail!("embedding model '{model}' needs a build with the `candle` feature")
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        settings: Settings,
    }

    fn parse(args: &[&str]) -> Settings {
        let mut argv = vec!["docqa"];
        argv.extend_from_slice(args);
        TestCli::parse_from(argv).settings
    }

    #[test]
    fn zero_timeout_disables_limit() {
        let settings = parse(&["--timeout-secs", "0", "--top-k", "5"]);
        let config = settings.rag_config().unwrap();
        assert_eq!(config.timeout, None);
        assert_eq!(config.top_k, 5);
    }

    #[test]
    fn zero_top_k_is_rejected() {
        assert!(parse(&["--top-k", "0"]).rag_config().is_err());
    }

    #[test]
    fn api_key_selects_hosted_backend() {
        let settings = parse(&[
            "--openai-api-key",
            "sk-test",
            "--llm-model",
            "gpt-4o-mini",
            "--openai-base-url",
            "http://localhost:8080/v1",
        ]);
        match settings.generator_config(Some(LocalModelSize::Small)) {
            GeneratorConfig::Hosted(hosted) => {
                assert_eq!(hosted.model, "gpt-4o-mini");
                assert_eq!(hosted.base_url, "http://localhost:8080/v1");
            }
            other => panic!("expected hosted backend, got {other:?}"),
        }
    }

    #[test]
    fn blank_api_key_selects_local_backend() {
        let settings = parse(&["--openai-api-key", " ", "--model-size", "large"]);
        let config = settings.generator_config(None);
        assert_eq!(config, GeneratorConfig::local(LocalModelSize::Large));
    }

    #[test]
    fn explicit_size_beats_saved_size() {
        let saved = Some(LocalModelSize::Small);
        let explicit = parse(&["--openai-api-key", "", "--model-size", "large"]);
        assert_eq!(explicit.generator_config(saved), GeneratorConfig::local(LocalModelSize::Large));

        let implicit = parse(&["--openai-api-key", ""]);
        assert_eq!(implicit.generator_config(saved), GeneratorConfig::local(LocalModelSize::Small));
        assert_eq!(implicit.generator_config(None), GeneratorConfig::local(LocalModelSize::Medium));
    }

    #[tokio::test]
    async fn hashing_embedder_needs_no_model() {
        let settings = parse(&["--embedding-model", "hashing"]);
        let provider = settings.embedding_provider().await.unwrap();
        assert_eq!(provider.name(), "hashing");
    }
}
