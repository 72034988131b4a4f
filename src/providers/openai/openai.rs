use async_trait::async_trait;
use crate::config::ProviderConfig;
use crate::error::{QaError, Result};
use crate::providers::traits::{CompletionProvider, EmbeddingProvider};
use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs,
        CreateEmbeddingRequestArgs,
    },
    Client,
};
use std::env;

const SYSTEM_MESSAGE: &str = "You are a helpful assistant.";

fn client_for(config: &ProviderConfig) -> Result<Client<OpenAIConfig>> {
    let api_key = config
        .api_key
        .clone()
        .ok_or_else(|| QaError::InvalidConfiguration("OPENAI_API_KEY is not set".to_string()))?;
    let openai_config = OpenAIConfig::new()
        .with_api_key(api_key)
        .with_api_base(config.api_base());
    Ok(Client::with_config(openai_config))
}

#[derive(Clone)]
pub struct OpenAIProvider {
    client: Client<OpenAIConfig>,
    chat_model: String,
    temperature: f32,
}

impl OpenAIProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            client: client_for(config)?,
            chat_model: config.model().to_string(),
            temperature: config.temperature,
        })
    }

    fn chat_request(&self, prompt: &str) -> std::result::Result<CreateChatCompletionRequest, OpenAIError> {
        CreateChatCompletionRequestArgs::default()
            .model(&self.chat_model)
            .temperature(self.temperature)
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(SYSTEM_MESSAGE)
                    .build()?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()?
                    .into(),
            ])
            .build()
    }
}

#[async_trait]
impl CompletionProvider for OpenAIProvider {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = self
            .chat_request(prompt)
            .map_err(|e| QaError::LanguageModel(format!("Failed to build request: {}", e)))?;

        log::debug!("Sending {} char prompt to {}", prompt.len(), self.chat_model);
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| QaError::LanguageModel(e.to_string()))?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| QaError::LanguageModel("No response content".to_string()))
    }

    async fn get_model_info(&self) -> Result<String> {
        Ok(self.chat_model.clone())
    }

    fn temperature(&self) -> f32 {
        self.temperature
    }
}

#[derive(Clone)]
pub struct OpenAIEmbeddings {
    client: Client<OpenAIConfig>,
    embedding_model: String,
}

impl OpenAIEmbeddings {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let embedding_model = env::var("OPENAI_EMBEDDING_MODEL")
            .unwrap_or_else(|_| "text-embedding-3-small".to_string());
        Ok(Self {
            client: client_for(config)?,
            embedding_model,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddings {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.embedding_model)
            .input(texts.to_vec())
            .build()
            .map_err(|e| QaError::EmbeddingProvider(format!("Failed to build request: {}", e)))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| QaError::EmbeddingProvider(e.to_string()))?;

        let mut data = response.data;
        if data.len() != texts.len() {
            return Err(QaError::EmbeddingProvider(format!(
                "OpenAI returned {} embeddings for {} inputs",
                data.len(),
                texts.len()
            )));
        }
        data.sort_by_key(|entry| entry.index);
        Ok(data.into_iter().map(|entry| entry.embedding).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_documents(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| QaError::EmbeddingProvider("No embedding returned from OpenAI".to_string()))
    }
}
