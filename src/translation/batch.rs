/*!
 * Batch translation processing.
 *
 * Items are grouped into bounded batches and each batch is sent as one numbered
 * prompt. Batches run concurrently up to a configured cap, failed attempts are
 * retried with exponential backoff, and the first batch that exhausts its attempts
 * cancels the whole run.
 */

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use log::{debug, error, info, warn};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;

use crate::errors::{Error, Result};
use crate::format;
use crate::language_utils::display_name;
use crate::providers::{CompletionRequest, CompletionService, TokenUsage};
use crate::terminology::{Terminology, format_terminology_directive};

static RESPONSE_LINE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\[(\d+)\]\s?(.*)$").expect("Invalid response line regex"));

/// A single text to translate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    pub key: String,
    pub source_text: String,
    /// Usage hint derived from the key path
    pub context: Option<String>,
}

impl BatchItem {
    pub fn new(key: impl Into<String>, source_text: impl Into<String>) -> Self {
        let key = key.into();
        let context = infer_context(&key);
        Self {
            key,
            source_text: source_text.into(),
            context,
        }
    }
}

/// An ordered group of items sent in one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Zero-based position of the batch in the run
    pub index: usize,
    pub items: Vec<BatchItem>,
}

impl Batch {
    /// One-based number used in messages
    pub fn number(&self) -> usize {
        self.index + 1
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Split items into ordered batches of at most `batch_size` items
pub fn create_batches(items: Vec<BatchItem>, batch_size: usize) -> Vec<Batch> {
    let batch_size = batch_size.max(1);
    let mut batches = Vec::with_capacity(items.len().div_ceil(batch_size));
    let mut current = Vec::with_capacity(batch_size);
    for item in items {
        current.push(item);
        if current.len() == batch_size {
            batches.push(Batch {
                index: batches.len(),
                items: std::mem::take(&mut current),
            });
        }
    }
    if !current.is_empty() {
        batches.push(Batch {
            index: batches.len(),
            items: current,
        });
    }
    batches
}

/// Split a key segment into lowercase words (`submitBtn` -> `submit`, `btn`)
fn words(segment: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut previous_lower = false;
    for c in segment.chars() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            previous_lower = false;
            continue;
        }
        if c.is_uppercase() && previous_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        previous_lower = c.is_lowercase() || c.is_numeric();
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

const CONTEXT_RULES: [(&[&str], &str); 9] = [
    (&["placeholder"], "placeholder text"),
    (&["tooltip", "hint"], "tooltip"),
    (&["error", "errors", "err", "invalid"], "error message"),
    (&["button", "btn", "action", "cta"], "button label"),
    (&["description", "desc", "subtitle", "summary", "body"], "description"),
    (&["title", "heading", "header", "headline"], "title"),
    (&["nav", "menu", "navigation", "breadcrumb"], "navigation item"),
    (&["label", "field", "form", "input"], "form label"),
    (&["message", "msg", "success", "notification", "toast"], "status message"),
];

/// Derive a short usage hint from a key path
///
/// The last segment is tried first, then the enclosing segments from the innermost
/// outwards. Keys with no recognizable word fall back to their parent path.
pub fn infer_context(key: &str) -> Option<String> {
    let segments: Vec<&str> = key
        .split('.')
        .map(|s| s.split('[').next().unwrap_or(s))
        .filter(|s| !s.is_empty())
        .collect();

    for segment in segments.iter().rev() {
        let segment_words = words(segment);
        for (keywords, hint) in CONTEXT_RULES.iter() {
            if segment_words.iter().any(|w| keywords.contains(&w.as_str())) {
                return Some(hint.to_string());
            }
        }
    }

    let parent = key.rsplit_once('.').map(|(parent, _)| parent)?;
    Some(format!("section: {}", parent))
}

/// Lifecycle of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Pending,
    InFlight { attempt: u32 },
    Retrying { attempt: u32 },
    Succeeded,
    Failed,
}

/// Progress notification emitted while batches run
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    Start {
        index: usize,
        size: usize,
        attempt: u32,
    },
    Retry {
        index: usize,
        size: usize,
        attempt: u32,
        delay: Duration,
        error: String,
    },
    Complete {
        index: usize,
        size: usize,
        attempts: u32,
        translated: usize,
        duration: Duration,
        token_usage: TokenUsage,
    },
    Error {
        index: usize,
        size: usize,
        attempts: u32,
        duration: Duration,
        error: String,
    },
}

impl BatchEvent {
    pub fn index(&self) -> usize {
        match self {
            Self::Start { index, .. }
            | Self::Retry { index, .. }
            | Self::Complete { index, .. }
            | Self::Error { index, .. } => *index,
        }
    }

    /// State the batch enters with this event
    pub fn state(&self) -> BatchState {
        match self {
            Self::Start { attempt, .. } => BatchState::InFlight { attempt: *attempt },
            Self::Retry { attempt, .. } => BatchState::Retrying { attempt: *attempt },
            Self::Complete { .. } => BatchState::Succeeded,
            Self::Error { .. } => BatchState::Failed,
        }
    }
}

/// Callback receiving batch events; runs in the dispatching task and must not block
pub type ProgressCallback<'a> = &'a (dyn Fn(&BatchEvent) + Send + Sync);

/// Per-run prompt parameters
#[derive(Debug, Clone, Copy)]
pub struct BatchRequest<'a> {
    pub source_language: &'a str,
    pub target_language: &'a str,
    pub terminology: Option<&'a Terminology>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Scheduling limits
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum number of batches in flight
    pub concurrency: usize,
    /// Total attempts per batch
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry
    pub retry_base_delay: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            max_retries: 3,
            retry_base_delay: Duration::from_secs(1),
        }
    }
}

impl SchedulerConfig {
    /// Backoff before the retry following a failed `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.retry_base_delay.saturating_mul(1u32 << exponent)
    }
}

/// Result of a fully successful scheduling run
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// `(key, translation)` pairs in batch and item order
    pub translations: Vec<(String, String)>,
    /// Keys a successful batch did not return
    pub missing_keys: Vec<String>,
    pub api_calls: usize,
    pub token_usage: TokenUsage,
    pub batches: usize,
}

#[derive(Debug, Default)]
struct RunCounters {
    api_calls: usize,
    token_usage: TokenUsage,
}

struct BatchSuccess {
    index: usize,
    translations: Vec<(String, String)>,
    missing_keys: Vec<String>,
}

/// Runs batches against a completion service
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    service: Arc<dyn CompletionService>,
    config: SchedulerConfig,
    cancelled: Arc<AtomicBool>,
}

impl BatchScheduler {
    pub fn new(service: Arc<dyn CompletionService>, config: SchedulerConfig) -> Self {
        Self {
            service,
            config,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share an externally owned cancellation flag
    pub fn with_cancel_flag(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    /// Flag that stops the run when raised
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Process all batches with bounded concurrency
    ///
    /// The first batch that fails permanently raises the cancel flag and its error is
    /// returned; batches not yet started are never sent and in-flight ones are dropped.
    pub async fn process_batches(
        &self,
        batches: &[Batch],
        request: &BatchRequest<'_>,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<BatchOutcome> {
        let counters = Mutex::new(RunCounters::default());
        let concurrency = self.config.concurrency.max(1);
        debug!(
            "Scheduling {} batches with up to {} in flight",
            batches.len(),
            concurrency
        );

        let mut results = stream::iter(batches.iter())
            .map(|batch| self.run_batch(batch, request, progress, &counters))
            .buffer_unordered(concurrency);

        let mut successes = Vec::with_capacity(batches.len());
        while let Some(result) = results.next().await {
            match result {
                Ok(success) => successes.push(success),
                Err(e) => {
                    self.cancelled.store(true, Ordering::SeqCst);
                    return Err(e);
                }
            }
        }
        drop(results);

        successes.sort_by_key(|s| s.index);
        let counters = counters.into_inner();
        let mut outcome = BatchOutcome {
            api_calls: counters.api_calls,
            token_usage: counters.token_usage,
            batches: batches.len(),
            ..Default::default()
        };
        for success in successes {
            outcome.translations.extend(success.translations);
            outcome.missing_keys.extend(success.missing_keys);
        }

        info!(
            "Translated {} items in {} batches ({} API calls, {} tokens)",
            outcome.translations.len(),
            outcome.batches,
            outcome.api_calls,
            outcome.token_usage.total()
        );
        Ok(outcome)
    }

    async fn run_batch(
        &self,
        batch: &Batch,
        request: &BatchRequest<'_>,
        progress: Option<ProgressCallback<'_>>,
        counters: &Mutex<RunCounters>,
    ) -> Result<BatchSuccess> {
        let emit = |event: BatchEvent| {
            if let Some(callback) = progress {
                callback(&event);
            }
        };

        if self.is_cancelled() {
            return Err(cancelled_error(batch));
        }

        let started = Instant::now();
        let prompt = build_batch_prompt(batch, request);
        let max_attempts = self.config.max_retries.max(1);

        let mut attempt = 1;
        loop {
            if self.is_cancelled() {
                return Err(cancelled_error(batch));
            }
            emit(BatchEvent::Start {
                index: batch.index,
                size: batch.len(),
                attempt,
            });

            match self.attempt(batch, &prompt, request, counters).await {
                Ok((parsed, token_usage)) => {
                    let success = collect_translations(batch, parsed);
                    emit(BatchEvent::Complete {
                        index: batch.index,
                        size: batch.len(),
                        attempts: attempt,
                        translated: success.translations.len(),
                        duration: started.elapsed(),
                        token_usage,
                    });
                    debug!(
                        "Batch {} completed in {:?} after {} attempt(s)",
                        batch.number(),
                        started.elapsed(),
                        attempt
                    );
                    return Ok(success);
                }
                Err(e) if attempt < max_attempts && e.is_retryable() => {
                    let delay = self.config.backoff(attempt);
                    debug!(
                        "Batch {} attempt {}/{} failed: {}. Retrying in {:?}",
                        batch.number(),
                        attempt,
                        max_attempts,
                        e,
                        delay
                    );
                    emit(BatchEvent::Retry {
                        index: batch.index,
                        size: batch.len(),
                        attempt,
                        delay,
                        error: e.to_string(),
                    });
                    if self.is_cancelled() {
                        return Err(cancelled_error(batch));
                    }
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(
                        "Batch {} ({} items) failed after {} attempt(s): {}",
                        batch.number(),
                        batch.len(),
                        attempt,
                        e
                    );
                    emit(BatchEvent::Error {
                        index: batch.index,
                        size: batch.len(),
                        attempts: attempt,
                        duration: started.elapsed(),
                        error: e.to_string(),
                    });
                    self.cancelled.store(true, Ordering::SeqCst);
                    return Err(Error::translation(format!(
                        "Batch {} ({} items) failed after {} attempt(s)",
                        batch.number(),
                        batch.len(),
                        attempt
                    ))
                    .with_cause(e)
                    .with_context("batch", batch.number())
                    .with_context("size", batch.len()));
                }
            }
        }
    }

    async fn attempt(
        &self,
        batch: &Batch,
        prompt: &str,
        request: &BatchRequest<'_>,
        counters: &Mutex<RunCounters>,
    ) -> Result<(BTreeMap<usize, String>, TokenUsage)> {
        let completion_request = CompletionRequest::new(prompt)
            .with_system(system_message(request))
            .with_temperature(request.temperature)
            .with_max_tokens(request.max_tokens);

        counters.lock().api_calls += 1;
        let completion = self.service.complete(completion_request).await?;
        counters.lock().token_usage.add(completion.token_usage);

        let parsed = parse_batch_response(&completion.text, batch.len());
        if parsed.is_empty() {
            return Err(Error::format("Response contained no numbered translations")
                .with_context("batch", batch.number()));
        }
        Ok((parsed, completion.token_usage))
    }
}

fn cancelled_error(batch: &Batch) -> Error {
    Error::translation("Translation cancelled").with_context("batch", batch.number())
}

fn collect_translations(batch: &Batch, mut parsed: BTreeMap<usize, String>) -> BatchSuccess {
    let mut success = BatchSuccess {
        index: batch.index,
        translations: Vec::with_capacity(batch.len()),
        missing_keys: Vec::new(),
    };

    for (position, item) in batch.items.iter().enumerate() {
        match parsed.remove(&(position + 1)) {
            Some(translation) => {
                if let Err(e) = format::validate(&item.source_text, &translation) {
                    warn!("Format check failed for '{}': {}", item.key, e.message());
                }
                success.translations.push((item.key.clone(), translation));
            }
            None => {
                warn!(
                    "Batch {} returned no translation for '{}'",
                    batch.number(),
                    item.key
                );
                success.missing_keys.push(item.key.clone());
            }
        }
    }
    success
}

fn escape_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\n', "\\n")
}

fn system_message(request: &BatchRequest<'_>) -> String {
    format!(
        "You are a professional software localization translator. You translate user interface \
         text from {} to {} and answer only in the requested line format.",
        display_name(request.source_language),
        display_name(request.target_language)
    )
}

/// Build the numbered prompt for one batch
pub fn build_batch_prompt(batch: &Batch, request: &BatchRequest<'_>) -> String {
    let mut prompt = format!(
        "Translate the following {} texts from {} to {}.\n\
         Answer with exactly one line per text in the form [n] translation, using the same numbers.\n\
         Write line breaks inside a translation as \\n. Do not add explanations.\n",
        batch.len(),
        display_name(request.source_language),
        display_name(request.target_language)
    );

    if let Some(directive) = request
        .terminology
        .and_then(|t| format_terminology_directive(t, request.target_language))
    {
        prompt.push('\n');
        prompt.push_str(&directive);
        prompt.push('\n');
    }

    let mut notes = Vec::new();
    for (position, item) in batch.items.iter().enumerate() {
        let mut values: Vec<String> = Vec::new();
        for element in format::extract(&item.source_text) {
            if !values.contains(&element.value) {
                values.push(element.value);
            }
        }
        let note = match (&item.context, values.is_empty()) {
            (Some(context), true) => format!("- Text {} is a {}", position + 1, context),
            (Some(context), false) => format!(
                "- Text {} is a {} and must keep exactly: {}",
                position + 1,
                context,
                values.join(", ")
            ),
            (None, false) => format!("- Text {} must keep exactly: {}", position + 1, values.join(", ")),
            (None, true) => continue,
        };
        notes.push(note);
    }
    if !notes.is_empty() {
        prompt.push_str("\nNotes:\n");
        prompt.push_str(&notes.join("\n"));
        prompt.push('\n');
    }

    prompt.push_str("\nTexts:\n");
    for (position, item) in batch.items.iter().enumerate() {
        prompt.push_str(&format!("[{}] {}\n", position + 1, escape_newlines(&item.source_text)));
    }
    prompt
}

/// Parse `[n] text` lines; out-of-range numbers, blank answers and other lines are ignored
///
/// The first line for a number wins. Escaped newlines are restored.
pub fn parse_batch_response(response: &str, item_count: usize) -> BTreeMap<usize, String> {
    let mut parsed = BTreeMap::new();
    for line in response.lines() {
        let Some(caps) = RESPONSE_LINE_REGEX.captures(line) else {
            continue;
        };
        let Ok(number) = caps[1].parse::<usize>() else {
            continue;
        };
        if number == 0 || number > item_count {
            continue;
        }
        let text = caps[2].trim_end().replace("\\n", "\n");
        if text.trim().is_empty() {
            continue;
        }
        parsed.entry(number).or_insert(text);
    }
    parsed
}
