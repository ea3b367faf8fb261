/*!
 * End-to-end translation of a text tree.
 *
 * The pipeline filters keys, works out which ones changed since the previous run,
 * optionally detects terminology, translates the remaining texts in concurrent
 * batches, reviews the result and finally rebuilds the target tree.
 */

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::Serialize;

use super::batch::{BatchEvent, BatchItem, BatchRequest, BatchScheduler, SchedulerConfig, create_batches};
use super::reflection::{QualityIssue, ReflectionEngine, ReflectionStats, TranslatedItem, should_reflect};
use crate::document::{
    FlatMap, IncrementalStats, LeafValue, TextTree, analyze_flat_diff, flatten, merge_diff,
    rebuild_json, should_translate,
};
use crate::errors::{Error, Result};
use crate::filter::{FilterStats, KeyFilter};
use crate::language_utils::validate_language_code;
use crate::providers::CompletionService;
use crate::terminology::{DetectionOptions, Terminology, detect_terminology};

/// Options for one pipeline run
#[derive(Debug, Clone)]
pub struct TranslateOptions {
    /// Maximum items per request
    pub batch_size: usize,
    /// Maximum batches in flight
    pub concurrency: usize,
    /// Total attempts per batch
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    /// Key patterns to translate; empty means every key
    pub include_patterns: Vec<String>,
    /// Key patterns to leave untouched
    pub exclude_patterns: Vec<String>,
    /// Translate every included key even when unchanged
    pub force: bool,
    pub skip_terminology_detection: bool,
    /// Review translations and request corrections
    pub reflection: bool,
    /// Current translation, reused for unchanged and excluded keys
    pub existing_target: Option<TextTree>,
    /// Source tree of the previous run
    pub previous_source: Option<TextTree>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            batch_size: 20,
            concurrency: 3,
            max_retries: 3,
            retry_base_delay: Duration::from_secs(1),
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            force: false,
            skip_terminology_detection: false,
            reflection: true,
            existing_target: None,
            previous_source: None,
            temperature: 0.3,
            max_tokens: 4096,
        }
    }
}

impl TranslateOptions {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::validation("Batch size must be at least 1"));
        }
        if self.concurrency == 0 {
            return Err(Error::validation("Concurrency must be at least 1"));
        }
        if self.max_retries == 0 {
            return Err(Error::validation("Max retries must be at least 1"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::validation(format!(
                "Temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(Error::validation("Max tokens must be at least 1"));
        }
        Ok(())
    }

    fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            concurrency: self.concurrency,
            max_retries: self.max_retries,
            retry_base_delay: self.retry_base_delay,
        }
    }
}

/// Counters for one pipeline run
#[derive(Debug, Clone, Default, Serialize)]
pub struct TranslationStats {
    /// Texts sent for translation
    pub total_items: usize,
    pub success_items: usize,
    pub failed_items: usize,
    /// Completion requests made, including detection and reflection
    pub api_calls: usize,
    pub total_tokens: u64,
    pub duration: Duration,
    pub filter_stats: Option<FilterStats>,
    pub incremental_stats: Option<IncrementalStats>,
    pub reflection: Option<ReflectionStats>,
}

/// Result of a successful pipeline run
#[derive(Debug)]
pub struct TranslationOutput {
    pub target: TextTree,
    pub stats: TranslationStats,
    /// Issues found by the quality review
    pub issues: Vec<QualityIssue>,
    /// Non-fatal failure of the correction request
    pub reflection_error: Option<Error>,
    /// Terminology detected during this run, if detection ran and found terms
    pub detected_terminology: Option<Terminology>,
}

type SharedProgress = Arc<dyn Fn(&BatchEvent) + Send + Sync>;

/// Translates text trees through a completion service
#[derive(Clone)]
pub struct TranslationPipeline {
    service: Arc<dyn CompletionService>,
    progress: Option<SharedProgress>,
    cancelled: Arc<AtomicBool>,
    detection: DetectionOptions,
}

impl std::fmt::Debug for TranslationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationPipeline")
            .field("service", &self.service)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl TranslationPipeline {
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self {
            service,
            progress: None,
            cancelled: Arc::new(AtomicBool::new(false)),
            detection: DetectionOptions::default(),
        }
    }

    /// Receive batch events while a run is in progress
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&BatchEvent) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    pub fn with_detection_options(mut self, options: DetectionOptions) -> Self {
        self.detection = options;
        self
    }

    /// Flag that aborts the current run when raised
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Translate `source` into `target_language`
    pub async fn translate(
        &self,
        source: &TextTree,
        source_language: &str,
        target_language: &str,
        terminology: Option<&Terminology>,
        options: TranslateOptions,
    ) -> Result<TranslationOutput> {
        let started = Instant::now();
        options.validate()?;
        validate_language_code(source_language)?;
        validate_language_code(target_language)?;
        self.cancelled.store(false, Ordering::SeqCst);

        let key_filter = KeyFilter::from_lists(&options.include_patterns, &options.exclude_patterns)?;
        let source_flat = flatten(source);
        let filtered = key_filter.apply(&source_flat);

        let mut stats = TranslationStats {
            filter_stats: (!key_filter.is_pass_through()).then_some(filtered.stats),
            ..Default::default()
        };

        let existing_flat = options.existing_target.as_ref().map(flatten);
        let previous_flat = options.previous_source.as_ref().map(flatten);
        let baseline = previous_flat.as_ref().or(existing_flat.as_ref());

        let mut diff = analyze_flat_diff(&filtered.included, baseline);
        // Unchanged keys are only reusable when a translation for them exists
        let (reusable, promoted): (Vec<String>, Vec<String>) = diff
            .unchanged
            .drain(..)
            .partition(|key| existing_flat.as_ref().is_some_and(|e| e.contains_key(key)));
        diff.unchanged = reusable;
        if !promoted.is_empty() {
            debug!("{} unchanged keys have no existing translation", promoted.len());
            diff.new.extend(promoted);
        }
        if baseline.is_some() {
            stats.incremental_stats = Some(diff.stats());
        }

        if !should_translate(&diff, options.force) {
            info!("Nothing changed since the previous run, keeping the existing translation");
            stats.duration = started.elapsed();
            let reused = reuse_unchanged(&diff.unchanged, existing_flat.as_ref(), &HashSet::new());
            let merged = merge_diff(&FlatMap::new(), &reused);
            let target = rebuild_json(&assemble(&source_flat, &filtered.excluded, &merged, existing_flat.as_ref()));
            return Ok(TranslationOutput {
                target,
                stats,
                issues: Vec::new(),
                reflection_error: None,
                detected_terminology: None,
            });
        }

        let to_translate: HashSet<&str> = if options.force {
            filtered.included.keys().map(String::as_str).collect()
        } else {
            diff.keys_to_translate()
        };

        // Leaves that need no model output keep their source value
        let mut copied = FlatMap::new();
        let mut items = Vec::new();
        for (key, value) in &filtered.included {
            if !to_translate.contains(key.as_str()) {
                continue;
            }
            match value.as_str() {
                Some(text) if value.is_translatable() => items.push(BatchItem::new(key.clone(), text)),
                _ => {
                    copied.insert(key.clone(), value.clone());
                }
            }
        }
        stats.total_items = items.len();

        let mut effective_terminology = terminology.cloned();
        let mut detected_terminology = None;
        let has_terminology = effective_terminology.as_ref().is_some_and(|t| !t.is_empty());
        if !has_terminology && !options.skip_terminology_detection && !items.is_empty() {
            let samples: Vec<&str> = items.iter().map(|i| i.source_text.as_str()).collect();
            stats.api_calls += 1;
            match detect_terminology(self.service.as_ref(), &samples, source_language, &self.detection).await {
                Ok(detected) if !detected.is_empty() => {
                    effective_terminology = Some(detected.clone());
                    detected_terminology = Some(detected);
                }
                Ok(_) => debug!("Terminology detection found no terms"),
                Err(e) => warn!("Terminology detection failed, continuing without it: {}", e),
            }
        }

        let mut translated = FlatMap::new();
        let mut issues = Vec::new();
        let mut reflection_error = None;
        if !items.is_empty() {
            let sources: Vec<(String, String)> = items
                .iter()
                .map(|i| (i.key.clone(), i.source_text.clone()))
                .collect();
            let batches = create_batches(items, options.batch_size);
            let scheduler = BatchScheduler::new(Arc::clone(&self.service), options.scheduler_config())
                .with_cancel_flag(Arc::clone(&self.cancelled));
            let request = BatchRequest {
                source_language,
                target_language,
                terminology: effective_terminology.as_ref(),
                temperature: options.temperature,
                max_tokens: options.max_tokens,
            };

            let outcome = scheduler
                .process_batches(&batches, &request, self.progress.as_deref())
                .await?;
            stats.api_calls += outcome.api_calls;
            stats.total_tokens += outcome.token_usage.total();
            stats.success_items = outcome.translations.len();
            stats.failed_items = outcome.missing_keys.len();

            let mut translations: Vec<TranslatedItem> = outcome
                .translations
                .into_iter()
                .filter_map(|(key, translation)| {
                    let source = sources.iter().find(|(k, _)| *k == key)?.1.clone();
                    Some(TranslatedItem::new(key, source, translation))
                })
                .collect();

            if options.reflection && should_reflect(&translations, effective_terminology.as_ref()) {
                let engine = ReflectionEngine::new(self.service.as_ref(), source_language, target_language)
                    .with_generation(options.temperature, options.max_tokens);
                let reflection = engine.reflect(translations, effective_terminology.as_ref()).await;
                stats.api_calls += reflection.api_calls;
                stats.total_tokens += reflection.token_usage.total();
                stats.reflection = Some(reflection.stats());
                issues = reflection.report.issues;
                reflection_error = reflection.error;
                translations = reflection.translations;
            }

            for item in translations {
                translated.insert(item.key, LeafValue::String(item.translation));
            }
        }

        let reused = reuse_unchanged(&diff.unchanged, existing_flat.as_ref(), &to_translate);
        let mut merged = merge_diff(&translated, &reused);
        for (key, value) in copied {
            merged.insert(key, value);
        }

        let final_flat = assemble(&source_flat, &filtered.excluded, &merged, existing_flat.as_ref());
        let target = rebuild_json(&final_flat);
        stats.duration = started.elapsed();

        info!(
            "Translated {}/{} items to {} ({} failed, {} API calls, {} tokens) in {:?}",
            stats.success_items,
            stats.total_items,
            target_language,
            stats.failed_items,
            stats.api_calls,
            stats.total_tokens,
            stats.duration
        );

        Ok(TranslationOutput {
            target,
            stats,
            issues,
            reflection_error,
            detected_terminology,
        })
    }
}

/// Existing translations of unchanged keys that are not being retranslated
fn reuse_unchanged(unchanged: &[String], existing: Option<&FlatMap>, to_translate: &HashSet<&str>) -> FlatMap {
    let mut reused = FlatMap::new();
    let Some(existing) = existing else {
        return reused;
    };
    for key in unchanged {
        if to_translate.contains(key.as_str()) {
            continue;
        }
        if let Some(value) = existing.get(key) {
            reused.insert(key.clone(), value.clone());
        }
    }
    reused
}

/// Lay out the final flat map in source order
///
/// Included keys take their merged value and are dropped when there is none.
/// Excluded keys keep their existing translation, falling back to the source value.
fn assemble(
    source_flat: &FlatMap,
    excluded: &FlatMap,
    merged: &FlatMap,
    existing: Option<&FlatMap>,
) -> FlatMap {
    let mut result = FlatMap::with_capacity(source_flat.len());
    for (key, source_value) in source_flat {
        let value = if excluded.contains_key(key) {
            existing
                .and_then(|e| e.get(key))
                .cloned()
                .unwrap_or_else(|| source_value.clone())
        } else {
            match merged.get(key) {
                Some(value) => value.clone(),
                None => continue,
            }
        };
        result.insert(key.clone(), value);
    }
    result
}
