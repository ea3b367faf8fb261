/*!
 * Integration tests for stored and detected terminology.
 */

use std::sync::Arc;

use serde_json::json;
use treelingo::terminology::{JsonFileTerminologyRepository, Terminology, TerminologyRepository};
use treelingo::translation::{IssueKind, Severity, TranslateOptions, TranslationPipeline};
use treelingo::MockCompletion;

use crate::common::mock_providers::prefixing_mock;
use crate::common::{create_temp_dir, quiet_options, tree};

fn shop_terminology() -> Terminology {
    let mut terminology = Terminology::new("en");
    terminology.add_preserve_term("Acme");
    terminology.set_target_form("cart", "fr", "panier");
    terminology
}

#[tokio::test]
async fn test_storedTerminology_shouldReachPromptsAndReview() {
    let dir = create_temp_dir().unwrap();
    let repository = JsonFileTerminologyRepository::new(dir.path());
    repository.save("shop", &shop_terminology()).unwrap();
    let terminology = repository.load("shop").unwrap().unwrap();

    // Translates literally, ignoring the terminology
    let mock = prefixing_mock("FR ");
    let output = TranslationPipeline::new(Arc::new(mock.clone()))
        .translate(
            &tree(json!({"title": "Acme cart", "empty": "Your cart is empty"})),
            "en",
            "fr",
            Some(&terminology),
            TranslateOptions {
                reflection: true,
                ..quiet_options()
            },
        )
        .await
        .unwrap();

    let prompts = mock.prompts();
    assert!(prompts[0].contains("Terminology rules:"));
    assert!(prompts[0].contains("Acme"));
    assert!(prompts[0].contains("cart → panier"));

    let missing_forms: Vec<&str> = output
        .issues
        .iter()
        .filter(|i| i.kind == IssueKind::Terminology && i.severity == Severity::High)
        .map(|i| i.key.as_str())
        .collect();
    assert_eq!(missing_forms, vec!["title", "empty"]);
    assert_eq!(output.stats.reflection.unwrap().high_issues, 2);
    assert!(output.detected_terminology.is_none());
}

#[tokio::test]
async fn test_detectedTerminology_shouldBeReturnedForPersistence() {
    let dir = create_temp_dir().unwrap();
    let repository = JsonFileTerminologyRepository::new(dir.path().join("terms"));
    let mock = MockCompletion::working().with_responder(|request| {
        if request.prompt.contains("PRESERVE:") {
            Ok("PRESERVE: Acme Cloud\nCONSISTENT: invoice\nPRESERVE: Nowhere".to_string())
        } else {
            Ok(MockCompletion::answer_numbered(&request.prompt, MockCompletion::mock_translation))
        }
    });

    let output = TranslationPipeline::new(Arc::new(mock.clone()))
        .translate(
            &tree(json!({"a": "Open Acme Cloud", "b": "Download the invoice"})),
            "en",
            "fr",
            None,
            TranslateOptions {
                skip_terminology_detection: false,
                ..quiet_options()
            },
        )
        .await
        .unwrap();

    let detected = output.detected_terminology.unwrap();
    assert_eq!(detected.preserve_terms, vec!["Acme Cloud"]);
    assert!(detected.consistent_terms.contains_key("invoice"));
    assert_eq!(output.stats.api_calls, 2);

    repository.save("cloud", &detected).unwrap();
    assert_eq!(repository.load("cloud").unwrap(), Some(detected));
}

#[tokio::test]
async fn test_detectionFailure_shouldNotStopTranslation() {
    let mock = MockCompletion::scripted(vec![Err(treelingo::ProviderError::ApiError {
        status_code: 500,
        message: "detector down".to_string(),
    })]);

    let output = TranslationPipeline::new(Arc::new(mock.clone()))
        .translate(
            &tree(json!({"a": "Hello"})),
            "en",
            "fr",
            None,
            TranslateOptions {
                skip_terminology_detection: false,
                ..quiet_options()
            },
        )
        .await
        .unwrap();

    assert_eq!(output.target.to_json_value(), json!({"a": "TR: Hello"}));
    assert!(output.detected_terminology.is_none());
    assert_eq!(mock.request_count(), 2);
}
