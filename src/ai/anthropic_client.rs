//! Anthropic Claude Client
//!
//! Thin messages-API client supporting text and image content blocks.

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use super::ChatRequest;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("API error: status {status}: {body}")]
    Api { status: u16, body: String },
    #[error("no content in response")]
    EmptyResponse,
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::Network(e.to_string())
        }
    }
}

pub struct AnthropicClient {
    client: Client,
    api_key: String,
}

impl AnthropicClient {
    pub fn new(api_key: &str) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
        })
    }

    /// Run one completion. With an image attached the user turn becomes an
    /// image block followed by the text block; otherwise plain text content.
    pub async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        let content = match &request.image_base64 {
            Some(image) => serde_json::json!([
                {
                    "type": "image",
                    "source": {
                        "type": "base64",
                        "media_type": "image/png",
                        "data": image
                    }
                },
                {
                    "type": "text",
                    "text": request.prompt
                }
            ]),
            None => serde_json::json!(request.prompt),
        };

        let mut body = serde_json::json!({
            "model": request.model.id(),
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": [
                {"role": "user", "content": content}
            ],
        });

        if let Some(system) = &request.system {
            body["system"] = serde_json::json!(system);
        }

        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, body });
        }

        let response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        response
            .content
            .first()
            .map(|c| c.text.clone())
            .ok_or(ProviderError::EmptyResponse)
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    #[allow(dead_code)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    #[allow(dead_code)]
    block_type: String,
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::Model;

    #[test]
    fn test_client_creation() {
        let client = AnthropicClient::new("test-key");
        assert!(client.is_ok());
    }

    #[test]
    fn test_model_ids() {
        assert!(Model::Fast.id().contains("haiku"));
        assert!(Model::Reasoning.id().contains("sonnet"));
    }
}
