/*!
 * Mock completion provider for testing.
 *
 * This module provides a provider that simulates different behaviors:
 * - `MockCompletion::working()` - Answers numbered prompts line by line
 * - `MockCompletion::intermittent(n)` - Fails every nth request
 * - `MockCompletion::failing()` - Always fails with an error
 * - `MockCompletion::scripted(..)` - Replays queued replies, then works
 *
 * Clones share their request counter, recorded requests and script.
 */

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;

use super::{Completion, CompletionRequest, CompletionService, TokenUsage};
use crate::errors::ProviderError;

static NUMBERED_LINE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[(\d+)\] (.*)$").expect("Invalid numbered line regex"));

/// Custom reply generator
pub type Responder = Arc<dyn Fn(&CompletionRequest) -> Result<String, ProviderError> + Send + Sync>;

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds
    Working,
    /// Fails intermittently (every Nth request)
    Intermittent { fail_every: usize },
    /// Always fails with an error
    Failing,
    /// Returns empty text
    Empty,
}

/// Mock provider for testing translation behavior
#[derive(Clone)]
pub struct MockCompletion {
    behavior: MockBehavior,
    /// Delay applied to successful replies
    latency: Duration,
    request_count: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
    script: Arc<Mutex<VecDeque<Result<String, ProviderError>>>>,
    responder: Option<Responder>,
}

impl fmt::Debug for MockCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockCompletion")
            .field("behavior", &self.behavior)
            .field("latency", &self.latency)
            .field("request_count", &self.request_count())
            .field("custom_responder", &self.responder.is_some())
            .finish()
    }
}

impl MockCompletion {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            latency: Duration::ZERO,
            request_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            script: Arc::new(Mutex::new(VecDeque::new())),
            responder: None,
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every })
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    /// Replay the given replies in order, then behave like `working()`
    pub fn scripted(replies: Vec<Result<String, ProviderError>>) -> Self {
        let mock = Self::working();
        mock.script.lock().extend(replies);
        mock
    }

    /// Generate every reply with a custom function
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<String, ProviderError> + Send + Sync + 'static,
    {
        self.responder = Some(Arc::new(responder));
        self
    }

    /// Delay successful replies; failures return immediately
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Every request received so far, in arrival order
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.requests.lock().iter().map(|r| r.prompt.clone()).collect()
    }

    /// The deterministic "translation" produced by `working()`
    pub fn mock_translation(text: &str) -> String {
        format!("TR: {}", text)
    }

    /// Answer every `[n] text` prompt line with `[n] transform(text)`
    pub fn answer_numbered(prompt: &str, transform: impl Fn(&str) -> String) -> String {
        prompt
            .lines()
            .filter_map(|line| NUMBERED_LINE_REGEX.captures(line.trim_end()))
            .map(|caps| format!("[{}] {}", &caps[1], transform(&caps[2])))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn working_reply(request: &CompletionRequest) -> String {
        let answer = Self::answer_numbered(&request.prompt, Self::mock_translation);
        if answer.is_empty() {
            "OK".to_string()
        } else {
            answer
        }
    }

    fn reply(&self, count: usize, request: &CompletionRequest) -> Result<String, ProviderError> {
        if let Some(scripted) = self.script.lock().pop_front() {
            return scripted;
        }
        if let Some(responder) = &self.responder {
            return responder(request);
        }

        match self.behavior {
            MockBehavior::Working => Ok(Self::working_reply(request)),
            MockBehavior::Intermittent { fail_every } => {
                if fail_every > 0 && count % fail_every == fail_every - 1 {
                    Err(ProviderError::ApiError {
                        message: format!("Simulated intermittent failure (request #{})", count + 1),
                        status_code: 503,
                    })
                } else {
                    Ok(Self::working_reply(request))
                }
            }
            MockBehavior::Failing => Err(ProviderError::ApiError {
                message: "Simulated provider failure".to_string(),
                status_code: 500,
            }),
            MockBehavior::Empty => Ok(String::new()),
        }
    }
}

#[async_trait]
impl CompletionService for MockCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        let text = self.reply(count, &request)?;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        Ok(Completion {
            token_usage: TokenUsage::new(
                (request.prompt.len() / 4) as u64,
                (text.len() / 4) as u64,
            ),
            text,
            finish_reason: Some("stop".to_string()),
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}
