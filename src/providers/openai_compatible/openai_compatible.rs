use async_trait::async_trait;
use crate::config::ProviderConfig;
use crate::error::{QaError, Result};
use crate::providers::traits::CompletionProvider;
use reqwest::Client;
use serde_json::{json, Value};

/// Chat-completions client for any endpoint speaking the OpenAI wire format
/// (DeepSeek, local gateways, ...).
#[derive(Clone)]
pub struct OpenAICompatibleProvider {
    api_key: String,
    api_url: String,
    client: Client,
    model: String,
    temperature: f32,
}

impl OpenAICompatibleProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            QaError::InvalidConfiguration(format!("missing API key for {}", config.api_url))
        })?;

        Ok(Self {
            api_key,
            api_url: config.api_url.clone(),
            client: Client::new(),
            model: config.model().to_string(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAICompatibleProvider {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let response = self.client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&json!({
                "model": self.model,
                "messages": [
                    {
                        "role": "user",
                        "content": prompt
                    }
                ],
                "temperature": self.temperature
            }))
            .send()
            .await
            .map_err(|e| QaError::LanguageModel(format!("Request to {} failed: {}", self.api_url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(QaError::LanguageModel(format!(
                "API request failed: Status {}, Body: {}",
                status, error_text
            )));
        }

        let response_json: Value = response
            .json()
            .await
            .map_err(|e| QaError::LanguageModel(format!("Malformed response body: {}", e)))?;

        if let Some(error) = response_json.get("error") {
            return Err(QaError::LanguageModel(format!("API returned error: {}", error)));
        }

        response_json
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                let debug_json = serde_json::to_string_pretty(&response_json).unwrap_or_default();
                QaError::LanguageModel(format!("Invalid response format. Response JSON: {}", debug_json))
            })
    }

    async fn get_model_info(&self) -> Result<String> {
        Ok(self.model.clone())
    }

    fn temperature(&self) -> f32 {
        self.temperature
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve_once;

    fn provider_for(base_url: String) -> OpenAICompatibleProvider {
        OpenAICompatibleProvider::new(&ProviderConfig {
            models: vec!["test-model".to_string()],
            api_url: format!("{}/v1/chat/completions", base_url),
            api_key: Some("secret".to_string()),
            temperature: 0.0,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_complete_extracts_first_choice() {
        let url = serve_once(
            "200 OK",
            r#"{"choices":[{"message":{"role":"assistant","content":"He honored his service.\nSOURCES: 0"}}]}"#,
        )
        .await;

        let answer = provider_for(url).complete("question").await.unwrap();
        assert_eq!(answer, "He honored his service.\nSOURCES: 0");
    }

    #[tokio::test]
    async fn test_http_error_is_language_model_error() {
        let url = serve_once("429 Too Many Requests", r#"{"error":"rate limited"}"#).await;

        match provider_for(url).complete("question").await {
            Err(QaError::LanguageModel(msg)) => assert!(msg.contains("429")),
            other => panic!("expected LanguageModel error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_payload_is_language_model_error() {
        let url = serve_once("200 OK", r#"{"choices":[]}"#).await;

        assert!(matches!(
            provider_for(url).complete("question").await,
            Err(QaError::LanguageModel(_))
        ));
    }

    #[test]
    fn test_missing_key_is_invalid_configuration() {
        let result = OpenAICompatibleProvider::new(&ProviderConfig {
            models: vec!["m".to_string()],
            api_url: "http://localhost/v1/chat/completions".to_string(),
            api_key: None,
            temperature: 0.0,
        });
        assert!(matches!(result, Err(QaError::InvalidConfiguration(_))));
    }
}
