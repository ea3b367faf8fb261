/*!
 * Anthropic Messages API client.
 */

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{Completion, CompletionRequest, CompletionService, TokenUsage, status_error, transport_error};
use crate::errors::ProviderError;

const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// Anthropic client for interacting with the Anthropic API
pub struct Anthropic {
    model: String,
    api_key: String,
    messages_url: Url,
    client: Client,
}

// The API key never shows up in logs
impl std::fmt::Debug for Anthropic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Anthropic")
            .field("model", &self.model)
            .field("messages_url", &self.messages_url.as_str())
            .finish()
    }
}

/// Anthropic message request
#[derive(Debug, Serialize)]
pub struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    temperature: f32,
    max_tokens: u32,
}

/// Anthropic message format
#[derive(Debug, Serialize, Deserialize)]
pub struct AnthropicMessage {
    pub role: String,
    pub content: String,
}

/// Token usage information
#[derive(Debug, Deserialize)]
pub struct AnthropicUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Anthropic response
#[derive(Debug, Deserialize)]
pub struct AnthropicResponse {
    pub content: Vec<AnthropicContent>,
    pub usage: AnthropicUsage,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

/// Individual content block in an Anthropic response
#[derive(Debug, Deserialize)]
pub struct AnthropicContent {
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(default)]
    pub text: String,
}

impl AnthropicRequest {
    fn from_completion(model: &str, request: CompletionRequest) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: request.prompt,
            }],
            system: request.system_message,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

impl From<AnthropicResponse> for Completion {
    fn from(response: AnthropicResponse) -> Self {
        Self {
            text: Anthropic::extract_text_from_response(&response),
            token_usage: TokenUsage::new(response.usage.input_tokens, response.usage.output_tokens),
            finish_reason: response.stop_reason,
        }
    }
}

impl Anthropic {
    /// Create a new Anthropic client; an empty endpoint selects the public API
    pub fn new(
        model: impl Into<String>,
        api_key: impl Into<String>,
        endpoint: &str,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let base = if endpoint.trim().is_empty() {
            DEFAULT_ENDPOINT
        } else {
            endpoint.trim()
        };
        let messages_url = Url::parse(&format!("{}/v1/messages", base.trim_end_matches('/')))
            .map_err(|e| ProviderError::ConnectionError(format!("Invalid Anthropic endpoint '{}': {}", base, e)))?;

        Ok(Self {
            model: model.into(),
            api_key: api_key.into(),
            messages_url,
            client: Client::builder().timeout(timeout).build().unwrap_or_default(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Concatenate the text blocks of a response
    pub fn extract_text_from_response(response: &AnthropicResponse) -> String {
        response
            .content
            .iter()
            .filter(|c| c.content_type == "text")
            .map(|c| c.text.as_str())
            .collect()
    }
}

#[async_trait]
impl CompletionService for Anthropic {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        let body = AnthropicRequest::from_completion(&self.model, request);
        debug!("Sending Anthropic request (model {})", self.model);

        let response = self
            .client
            .post(self.messages_url.clone())
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("Anthropic", e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("Anthropic API error ({}): {}", status, error_text);
            return Err(status_error(status.as_u16(), error_text));
        }

        let parsed = response
            .json::<AnthropicResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(format!("Anthropic: {}", e)))?;
        Ok(Completion::from(parsed))
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}
