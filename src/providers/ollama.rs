/*!
 * Ollama client for a local LLM server.
 */

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{Completion, CompletionRequest, CompletionService, TokenUsage, status_error, transport_error};
use crate::errors::ProviderError;

/// Ollama client for interacting with the Ollama API
#[derive(Debug)]
pub struct Ollama {
    /// Model name to use for generation
    model: String,
    /// Full URL of the generate endpoint
    generate_url: Url,
    /// HTTP client for making requests
    client: Client,
}

/// Generate request for the Ollama API
#[derive(Debug, Serialize)]
pub struct GenerationRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    options: GenerationOptions,
    stream: bool,
}

/// Generation options for the Ollama API
#[derive(Debug, Serialize)]
pub struct GenerationOptions {
    temperature: f32,
    /// Maximum number of tokens to generate
    num_predict: u32,
}

/// Generation response from the Ollama API
#[derive(Debug, Deserialize)]
pub struct GenerationResponse {
    /// Generated text
    pub response: String,
    #[serde(default)]
    pub done_reason: Option<String>,
    /// Number of prompt tokens
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    /// Number of generated tokens
    #[serde(default)]
    pub eval_count: Option<u64>,
}

impl GenerationRequest {
    fn from_completion(model: &str, request: CompletionRequest) -> Self {
        Self {
            model: model.to_string(),
            prompt: request.prompt,
            system: request.system_message,
            options: GenerationOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
            stream: false,
        }
    }
}

impl From<GenerationResponse> for Completion {
    fn from(response: GenerationResponse) -> Self {
        Self {
            text: response.response,
            token_usage: TokenUsage::new(
                response.prompt_eval_count.unwrap_or(0),
                response.eval_count.unwrap_or(0),
            ),
            finish_reason: response.done_reason,
        }
    }
}

impl Ollama {
    /// Create a new Ollama client; `endpoint` is the server base URL
    pub fn new(model: impl Into<String>, endpoint: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let generate_url = generate_url(endpoint)?;
        Ok(Self {
            model: model.into(),
            generate_url,
            client: Client::builder()
                .timeout(timeout)
                // Ollama speaks HTTP/1.1
                .http1_only()
                .pool_idle_timeout(Duration::from_secs(90))
                .build()
                .unwrap_or_default(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> &Url {
        &self.generate_url
    }
}

/// Resolve the generate endpoint from a base URL, adding a scheme when missing
fn generate_url(endpoint: &str) -> Result<Url, ProviderError> {
    let endpoint = endpoint.trim();
    let with_scheme = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    };
    let base = Url::parse(&format!("{}/", with_scheme.trim_end_matches('/')))
        .map_err(|e| ProviderError::ConnectionError(format!("Invalid Ollama endpoint '{}': {}", endpoint, e)))?;
    base.join("api/generate")
        .map_err(|e| ProviderError::ConnectionError(format!("Invalid Ollama endpoint '{}': {}", endpoint, e)))
}

#[async_trait]
impl CompletionService for Ollama {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        let body = GenerationRequest::from_completion(&self.model, request);
        debug!("Sending Ollama request to {} (model {})", self.generate_url, self.model);

        let response = self
            .client
            .post(self.generate_url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("Ollama", e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("Ollama API error ({}): {}", status, error_text);
            return Err(status_error(status.as_u16(), error_text));
        }

        let text = response
            .text()
            .await
            .map_err(|e| transport_error("Ollama", e))?;
        parse_generation(&text).map(Completion::from)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Parse a generate response; streamed JSONL bodies are concatenated
fn parse_generation(body: &str) -> Result<GenerationResponse, ProviderError> {
    if let Ok(response) = serde_json::from_str::<GenerationResponse>(body) {
        return Ok(response);
    }

    let mut combined = GenerationResponse {
        response: String::new(),
        done_reason: None,
        prompt_eval_count: None,
        eval_count: None,
    };
    let mut parsed_any = false;
    for line in body.lines().filter(|l| !l.trim().is_empty()) {
        let chunk: GenerationResponse = serde_json::from_str(line)
            .map_err(|e| ProviderError::ParseError(format!("Invalid Ollama response line: {}", e)))?;
        combined.response.push_str(&chunk.response);
        combined.done_reason = chunk.done_reason.or(combined.done_reason);
        combined.prompt_eval_count = chunk.prompt_eval_count.or(combined.prompt_eval_count);
        combined.eval_count = chunk.eval_count.or(combined.eval_count);
        parsed_any = true;
    }

    if parsed_any {
        Ok(combined)
    } else {
        Err(ProviderError::ParseError("Empty Ollama response".to_string()))
    }
}
