/*!
 * Completion providers used by the translation pipeline.
 *
 * This module contains the abstract completion capability and its implementations:
 * - Ollama: Local LLM server
 * - Anthropic: Anthropic API integration
 * - Mock: Scripted provider for tests
 */

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::app_config::{TranslationConfig, TranslationProvider};
use crate::errors::ProviderError;

pub mod anthropic;
pub mod mock;
pub mod ollama;

pub use anthropic::Anthropic;
pub use mock::{MockBehavior, MockCompletion};
pub use ollama::Ollama;

/// A single text generation request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// User prompt
    pub prompt: String,
    /// Optional system message guiding the model
    pub system_message: Option<String>,
    /// Sampling temperature
    pub temperature: f32,
    /// Upper bound on generated tokens
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_message: None,
            temperature: 0.3,
            max_tokens: 4096,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system_message = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Token accounting reported by a provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    pub fn add(&mut self, other: TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
    }
}

/// Generated text plus provider metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub token_usage: TokenUsage,
    pub finish_reason: Option<String>,
}

impl Completion {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            token_usage: TokenUsage::default(),
            finish_reason: None,
        }
    }
}

/// Common trait for all completion providers
///
/// Implementations must be usable from several concurrent batches at once.
#[async_trait]
pub trait CompletionService: Send + Sync + Debug {
    /// Complete a request
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError>;

    /// Short provider name used in logs
    fn name(&self) -> &str;

    /// Test the connection to the provider with a tiny request
    async fn test_connection(&self) -> Result<(), ProviderError> {
        self.complete(CompletionRequest::new("Hello").with_max_tokens(10))
            .await
            .map(|_| ())
    }
}

/// Map a non-success HTTP status to a provider error
pub(crate) fn status_error(status: u16, body: String) -> ProviderError {
    match status {
        401 | 403 => ProviderError::AuthenticationError(body),
        429 => ProviderError::RateLimitExceeded(body),
        _ => ProviderError::ApiError {
            status_code: status,
            message: body,
        },
    }
}

/// Map a transport failure to a provider error
pub(crate) fn transport_error(provider: &str, error: reqwest::Error) -> ProviderError {
    if error.is_connect() || error.is_timeout() {
        ProviderError::ConnectionError(format!("{}: {}", provider, error))
    } else {
        ProviderError::RequestFailed(format!("{}: {}", provider, error))
    }
}

/// Build the provider selected by a translation config
pub fn create_service(config: &TranslationConfig) -> Result<Arc<dyn CompletionService>, ProviderError> {
    let timeout = Duration::from_secs(config.timeout_secs);
    match config.provider {
        TranslationProvider::Ollama => Ok(Arc::new(Ollama::new(
            config.get_model(),
            &config.get_endpoint(),
            timeout,
        )?)),
        TranslationProvider::Anthropic => {
            let api_key = config.get_api_key();
            if api_key.is_empty() {
                return Err(ProviderError::AuthenticationError(
                    "An API key is required for the Anthropic provider".to_string(),
                ));
            }
            Ok(Arc::new(Anthropic::new(
                config.get_model(),
                api_key,
                &config.get_endpoint(),
                timeout,
            )?))
        }
        TranslationProvider::Mock => Ok(Arc::new(MockCompletion::working())),
    }
}
