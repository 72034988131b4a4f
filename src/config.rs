use crate::error::{QaError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use url::Url;
use validator::{Validate, ValidationError};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 0;
pub const DEFAULT_K: usize = 4;
pub const DEFAULT_TOKEN_MAX: usize = 3000;
pub const DEFAULT_MAX_TOKENS_LIMIT: usize = 3375;

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub models: Vec<String>,
    pub api_url: String,
    pub api_key: Option<String>,
    pub temperature: f32,
}

impl ProviderConfig {
    pub fn from_env(provider: &str) -> Result<Self> {
        let prefix = provider.to_uppercase();

        let models = env::var(format!("{}_MODELS", prefix))
            .map(|m| m.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_else(|_| match provider {
                "openai" => vec!["gpt-3.5-turbo".to_string(), "gpt-4".to_string()],
                "deepseek" => vec!["deepseek-chat".to_string()],
                _ => vec![],
            });

        let api_url = env::var(format!("{}_API_URL", prefix))
            .unwrap_or_else(|_| match provider {
                "openai" => "https://api.openai.com/v1/chat/completions".to_string(),
                "deepseek" => "https://api.deepseek.com/v1/chat/completions".to_string(),
                _ => String::new(),
            });

        let api_key = env::var(format!("{}_API_KEY", prefix)).ok();

        // The QA chains expect deterministic answers unless told otherwise.
        let temperature = env::var(format!("{}_TEMPERATURE", prefix))
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(0.0);

        let config = Self {
            models,
            api_url,
            api_key,
            temperature,
        };
        config.validate(provider)?;
        Ok(config)
    }

    fn validate(&self, provider: &str) -> Result<()> {
        if self.models.is_empty() {
            return Err(QaError::InvalidConfiguration(format!(
                "no model configured for provider '{}'",
                provider
            )));
        }
        Url::parse(&self.api_url).map_err(|e| {
            QaError::InvalidConfiguration(format!(
                "invalid API URL '{}' for provider '{}': {}",
                self.api_url, provider, e
            ))
        })?;
        Ok(())
    }

    pub fn model(&self) -> &str {
        &self.models[0]
    }

    /// Base URL of an OpenAI-style API, i.e. the API URL without `/chat/completions`.
    pub fn api_base(&self) -> String {
        self.api_url
            .trim_end_matches('/')
            .trim_end_matches("/chat/completions")
            .to_string()
    }
}

fn validate_overlap(settings: &QaSettings) -> std::result::Result<(), ValidationError> {
    if settings.chunk_overlap >= settings.chunk_size {
        let mut error = ValidationError::new("chunk_overlap");
        error.message = Some(
            format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                settings.chunk_overlap, settings.chunk_size
            )
            .into(),
        );
        return Err(error);
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_overlap"))]
pub struct QaSettings {
    #[validate(range(min = 1))]
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    #[validate(range(min = 1))]
    pub k: usize,
    #[validate(range(min = 1))]
    pub token_max: usize,
    #[validate(range(min = 1))]
    pub max_tokens_limit: usize,
    pub reduce_k_below_max_tokens: bool,
}

impl Default for QaSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            k: DEFAULT_K,
            token_max: DEFAULT_TOKEN_MAX,
            max_tokens_limit: DEFAULT_MAX_TOKENS_LIMIT,
            reduce_k_below_max_tokens: false,
        }
    }
}

impl QaSettings {
    pub fn check(&self) -> Result<()> {
        Validate::validate(self).map_err(|e| QaError::InvalidConfiguration(e.to_string()))
    }
}
