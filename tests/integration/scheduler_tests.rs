/*!
 * Integration tests for batch scheduling: bounded concurrency, retries and fail-fast.
 */

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use treelingo::translation::{BatchEvent, TranslateOptions, TranslationPipeline};
use treelingo::{ErrorKind, MockCompletion, ProviderError};

use crate::common::mock_providers::failing_on;
use crate::common::{init_logging, quiet_options, tree};

fn three_batches() -> treelingo::TextTree {
    tree(json!({"first": "alpha text", "second": "bravo text", "third": "charlie text"}))
}

#[tokio::test]
async fn test_pipeline_whenOneBatchFails_shouldStopWithoutStartingOthers() {
    init_logging();
    let mock = failing_on("bravo", Duration::from_millis(100));
    let events = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&events);
    let pipeline = TranslationPipeline::new(Arc::new(mock.clone()))
        .with_progress(move |event| recorded.lock().unwrap().push(event.clone()));

    let error = pipeline
        .translate(
            &three_batches(),
            "en",
            "fr",
            None,
            TranslateOptions {
                batch_size: 1,
                concurrency: 2,
                max_retries: 2,
                ..quiet_options()
            },
        )
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Translation);
    assert!(error.message().starts_with("Batch 2 (1 items) failed after 2 attempt(s)"));
    assert_eq!(error.context_value("batch"), Some("2"));
    assert!(mock.prompts().iter().all(|p| !p.contains("charlie")));
    assert!(pipeline.cancel_handle().load(Ordering::SeqCst));

    let events = events.lock().unwrap();
    assert!(events.iter().all(|e| e.index() != 2));
    assert!(events.iter().any(|e| matches!(e, BatchEvent::Retry { index: 1, attempt: 1, .. })));
    assert!(events.iter().any(|e| matches!(e, BatchEvent::Error { index: 1, attempts: 2, .. })));
}

#[tokio::test]
async fn test_pipeline_withTransientFailures_shouldRetryAndSucceed() {
    let mock = MockCompletion::scripted(vec![
        Err(ProviderError::ConnectionError("connection reset".to_string())),
        Err(ProviderError::RateLimitExceeded("slow down".to_string())),
    ]);

    let output = TranslationPipeline::new(Arc::new(mock.clone()))
        .translate(&tree(json!({"a": "Hello"})), "en", "fr", None, quiet_options())
        .await
        .unwrap();

    assert_eq!(output.target.to_json_value(), json!({"a": "TR: Hello"}));
    assert_eq!(mock.request_count(), 3);
    assert_eq!(output.stats.api_calls, 3);
}

#[tokio::test]
async fn test_pipeline_withConcurrency_shouldRunBatchesInParallel() {
    let mock = MockCompletion::working().with_latency(Duration::from_millis(100));
    let source = tree(json!({"a": "One", "b": "Two", "c": "Three", "d": "Four"}));
    let started = std::time::Instant::now();

    let output = TranslationPipeline::new(Arc::new(mock.clone()))
        .translate(
            &source,
            "en",
            "fr",
            None,
            TranslateOptions {
                batch_size: 1,
                concurrency: 4,
                ..quiet_options()
            },
        )
        .await
        .unwrap();

    assert_eq!(output.stats.success_items, 4);
    assert_eq!(mock.request_count(), 4);
    assert!(started.elapsed() < Duration::from_millis(350));
}

#[tokio::test]
async fn test_pipeline_whenCancelled_shouldReturnOnlyTheError() {
    let mock = MockCompletion::working().with_latency(Duration::from_millis(50));
    let pipeline = TranslationPipeline::new(Arc::new(mock.clone()));
    let cancel = pipeline.cancel_handle();
    let source = tree(json!({"a": "One", "b": "Two", "c": "Three"}));

    let run = pipeline.translate(
        &source,
        "en",
        "fr",
        None,
        TranslateOptions {
            batch_size: 1,
            concurrency: 1,
            ..quiet_options()
        },
    );
    let cancel_soon = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.store(true, Ordering::SeqCst);
    };
    let (result, _) = tokio::join!(run, cancel_soon);

    let error = result.unwrap_err();
    assert_eq!(error.message(), "Translation cancelled");
    assert_eq!(mock.request_count(), 1);
}
