//! Backend selection for answer generation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RagError;

/// Default hosted chat model.
pub const DEFAULT_HOSTED_MODEL: &str = "gpt-3.5-turbo";

/// Default OpenAI-compatible API base.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Which generation backend to build. Chosen once, at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum GeneratorConfig {
    /// A hosted chat-completion API.
    Hosted(HostedConfig),
    /// A locally loaded sequence-to-sequence model.
    Local(LocalConfig),
}

impl GeneratorConfig {
    /// Hosted backend with the default model.
    pub fn hosted(api_key: impl Into<String>) -> Self {
        Self::Hosted(HostedConfig::new(api_key))
    }

    /// Local backend of the given size with default decoding.
    pub fn local(size: LocalModelSize) -> Self {
        Self::Local(LocalConfig { size, ..LocalConfig::default() })
    }

    /// Pick the backend from the environment.
    ///
    /// Uses the hosted backend when `OPENAI_API_KEY` is set and non-empty
    /// (model from `LLM_MODEL`, base URL from `OPENAI_BASE_URL`); otherwise
    /// the local backend, sized by `DOCQA_MODEL_SIZE` when that parses.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// [`GeneratorConfig::from_env`] over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let set = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        match set("OPENAI_API_KEY") {
            Some(key) => {
                let mut hosted = HostedConfig::new(key);
                if let Some(model) = set("LLM_MODEL") {
                    hosted.model = model;
                }
                if let Some(base_url) = set("OPENAI_BASE_URL") {
                    hosted.base_url = base_url;
                }
                Self::Hosted(hosted)
            }
            None => {
                let size = set("DOCQA_MODEL_SIZE").and_then(|size| size.parse().ok());
                Self::local(size.unwrap_or_default())
            }
        }
    }
}

/// Settings for a hosted chat-completion backend.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct HostedConfig {
    #[serde(skip_serializing, default)]
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl HostedConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_HOSTED_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.7,
            max_tokens: 500,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl fmt::Debug for HostedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostedConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// Settings for a local sequence-to-sequence backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LocalConfig {
    pub size: LocalModelSize,
    /// Overrides the checkpoint implied by `size`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(default)]
    pub decoding: DecodingParams,
}

impl LocalConfig {
    /// The checkpoint to load.
    pub fn model_id(&self) -> &str {
        self.model_id.as_deref().unwrap_or(self.size.model_id())
    }
}

/// Preset local model sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalModelSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl LocalModelSize {
    pub const ALL: [LocalModelSize; 3] = [Self::Small, Self::Medium, Self::Large];

    pub fn model_id(self) -> &'static str {
        match self {
            Self::Small => "t5-small",
            Self::Medium => "t5-base",
            Self::Large => "t5-large",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Small => "Fast but less accurate",
            Self::Medium => "Balanced performance",
            Self::Large => "More accurate but slower",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }
}

impl fmt::Display for LocalModelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocalModelSize {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "small" => Ok(Self::Small),
            "medium" => Ok(Self::Medium),
            "large" => Ok(Self::Large),
            other => Err(RagError::ConfigError(format!(
                "unknown model size '{other}' (expected small, medium or large)"
            ))),
        }
    }
}

/// Decoding parameters for local generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodingParams {
    /// Maximum number of generated tokens.
    pub max_length: usize,
    /// Prompts are truncated to this many tokens.
    pub max_input_tokens: usize,
    /// Sampling temperature; `0.0` selects greedy decoding.
    pub temperature: f64,
    /// Nucleus sampling threshold.
    pub top_p: f64,
    pub seed: u64,
}

impl Default for DecodingParams {
    fn default() -> Self {
        Self {
            max_length: 512,
            max_input_tokens: 1024,
            temperature: 0.7,
            top_p: 0.9,
            seed: 299_792_458,
        }
    }
}
