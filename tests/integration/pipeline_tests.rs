/*!
 * Integration tests for the full translation pipeline.
 *
 * Runs the pipeline the way the command line does: documents on disk, a snapshot
 * of the previous source and an existing translation.
 */

use std::sync::Arc;

use serde_json::json;
use treelingo::document::{load_tree, load_tree_if_exists, save_tree};
use treelingo::translation::{TranslateOptions, TranslationPipeline};
use treelingo::{ErrorKind, MockCompletion};

use crate::common::mock_providers::{prefixing_mock, translating_with};
use crate::common::{create_json_file, create_temp_dir, init_logging, quiet_options, sample_locale, tree};

#[tokio::test]
async fn test_pipeline_incrementalRuns_shouldOnlySendChangedKeys() {
    init_logging();
    let dir = create_temp_dir().unwrap();
    let source_path = create_json_file(dir.path(), "en.json", &sample_locale()).unwrap();
    let target_path = dir.path().join("fr.json");
    let snapshot_path = dir.path().join(".treelingo").join("fr.json");

    // First run translates everything
    let first_mock = prefixing_mock("FR ");
    let pipeline = TranslationPipeline::new(Arc::new(first_mock.clone()));
    let source = load_tree(&source_path).unwrap();
    let output = pipeline
        .translate(&source, "en", "fr", None, quiet_options())
        .await
        .unwrap();
    save_tree(&target_path, &output.target).unwrap();
    save_tree(&snapshot_path, &source).unwrap();

    assert_eq!(output.stats.total_items, 7);
    assert_eq!(output.stats.success_items, 7);
    assert_eq!(first_mock.request_count(), 1);
    assert_eq!(output.target.to_json_value()["version"], json!(3));
    assert_eq!(output.target.to_json_value()["cart"]["items"], json!("FR You have {{count}} items"));

    // Second run after editing one key and adding another
    let mut edited = sample_locale();
    edited["cart"]["empty"] = json!("Nothing in your cart yet");
    edited["settings"]["language"] = json!("Language");
    let source_path = create_json_file(dir.path(), "en.json", &edited).unwrap();

    let second_mock = prefixing_mock("FR2 ");
    let pipeline = TranslationPipeline::new(Arc::new(second_mock.clone()));
    let output = pipeline
        .translate(
            &load_tree(&source_path).unwrap(),
            "en",
            "fr",
            None,
            TranslateOptions {
                existing_target: load_tree_if_exists(&target_path).unwrap(),
                previous_source: load_tree_if_exists(&snapshot_path).unwrap(),
                ..quiet_options()
            },
        )
        .await
        .unwrap();

    let prompt = &second_mock.prompts()[0];
    assert!(prompt.contains("[1] Nothing in your cart yet"));
    assert!(prompt.contains("[2] Language"));
    assert!(!prompt.contains("My Shop"));

    let target = output.target.to_json_value();
    assert_eq!(target["cart"]["empty"], json!("FR2 Nothing in your cart yet"));
    assert_eq!(target["settings"]["language"], json!("FR2 Language"));
    assert_eq!(target["app"]["title"], json!("FR My Shop"));

    let incremental = output.stats.incremental_stats.unwrap();
    assert_eq!(
        (incremental.new_keys, incremental.modified_keys, incremental.unchanged_keys),
        (1, 1, 7)
    );
}

#[tokio::test]
async fn test_pipeline_withIncludePatterns_shouldKeepOtherKeysFromTarget() {
    let mock = prefixing_mock("DE ");
    let source = tree(sample_locale());
    let existing = tree(json!({"app": {"title": "Mein Laden"}}));

    let output = TranslationPipeline::new(Arc::new(mock.clone()))
        .translate(
            &source,
            "en",
            "de",
            None,
            TranslateOptions {
                include_patterns: vec!["settings.*".to_string()],
                existing_target: Some(existing),
                ..quiet_options()
            },
        )
        .await
        .unwrap();

    let target = output.target.to_json_value();
    assert_eq!(target["settings"]["title"], json!("DE Settings"));
    assert_eq!(target["app"]["title"], json!("Mein Laden"));
    assert_eq!(target["app"]["welcome"], json!("Welcome back, {name}!"));
    let filter_stats = output.stats.filter_stats.unwrap();
    assert_eq!((filter_stats.included_keys, filter_stats.excluded_keys), (2, 6));
}

#[tokio::test]
async fn test_pipeline_withForce_shouldRetranslateUnchangedKeys() {
    let mock = prefixing_mock("NEW ");
    let source = tree(json!({"a": "Hello", "b": "World"}));

    let output = TranslationPipeline::new(Arc::new(mock.clone()))
        .translate(
            &source,
            "en",
            "fr",
            None,
            TranslateOptions {
                force: true,
                previous_source: Some(source.clone()),
                existing_target: Some(tree(json!({"a": "Bonjour", "b": "Monde"}))),
                ..quiet_options()
            },
        )
        .await
        .unwrap();

    assert_eq!(output.target.to_json_value(), json!({"a": "NEW Hello", "b": "NEW World"}));
}

#[tokio::test]
async fn test_pipeline_withReflection_shouldCorrectLostPlaceholders() {
    // Drops placeholders in batches, then answers the correction request
    let mock = MockCompletion::working().with_responder(|request| {
        if request.prompt.contains("Current translation:") {
            return Ok("greet: Hola {name}".to_string());
        }
        Ok(MockCompletion::answer_numbered(&request.prompt, |text| match text {
            "Hello {name}" => "Hola".to_string(),
            other => format!("ES {}", other),
        }))
    });
    let source = tree(json!({"greet": "Hello {name}", "a": "One", "b": "Two"}));

    let output = TranslationPipeline::new(Arc::new(mock.clone()))
        .translate(
            &source,
            "en",
            "es",
            None,
            TranslateOptions {
                reflection: true,
                ..quiet_options()
            },
        )
        .await
        .unwrap();

    assert_eq!(output.target.to_json_value()["greet"], json!("Hola {name}"));
    assert_eq!(mock.request_count(), 2);
    assert_eq!(output.stats.api_calls, 2);
    let reflection = output.stats.reflection.unwrap();
    assert_eq!((reflection.critical_issues, reflection.corrected_items), (1, 1));
    assert!(output.reflection_error.is_none());
}

#[tokio::test]
async fn test_pipeline_withMissingAnswers_shouldOmitFailedKeys() {
    let mock = translating_with(|text| {
        if text == "Skip me" {
            String::new()
        } else {
            format!("IT {}", text)
        }
    });
    let source = tree(json!({"a": "Keep me", "b": "Skip me"}));

    let output = TranslationPipeline::new(Arc::new(mock))
        .translate(&source, "en", "it", None, quiet_options())
        .await
        .unwrap();

    assert_eq!(output.target.to_json_value(), json!({"a": "IT Keep me"}));
    assert_eq!((output.stats.success_items, output.stats.failed_items), (1, 1));
}

#[tokio::test]
async fn test_pipeline_withInvalidLanguage_shouldFailValidation() {
    let mock = MockCompletion::working();

    let error = TranslationPipeline::new(Arc::new(mock.clone()))
        .translate(&tree(json!({"a": "b"})), "en", "xx", None, quiet_options())
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Validation);
    assert_eq!(mock.request_count(), 0);
}

#[tokio::test]
async fn test_pipeline_withRemovedKeyOnly_shouldDropItWithoutCalls() {
    let mock = MockCompletion::working();
    let mut edited = sample_locale();
    edited["settings"].as_object_mut().unwrap().remove("help");

    let output = TranslationPipeline::new(Arc::new(mock.clone()))
        .translate(
            &tree(edited),
            "en",
            "fr",
            None,
            TranslateOptions {
                previous_source: Some(tree(sample_locale())),
                existing_target: Some(tree(sample_locale())),
                ..quiet_options()
            },
        )
        .await
        .unwrap();

    let target = output.target.to_json_value();
    assert!(target["settings"].get("help").is_none());
    assert_eq!(target["settings"]["title"], sample_locale()["settings"]["title"]);
    assert_eq!(output.stats.incremental_stats.unwrap().deleted_keys, 1);
    assert_eq!(mock.request_count(), 0);
}

#[tokio::test]
async fn test_pipeline_withRemovedAndModifiedKeys_shouldDropRemovedKey() {
    let mock = prefixing_mock("FR ");
    let previous = tree(json!({"a": "Hello", "b": "World", "old": "Gone"}));
    let existing = tree(json!({"a": "Bonjour", "b": "Monde", "old": "Parti"}));

    let output = TranslationPipeline::new(Arc::new(mock.clone()))
        .translate(
            &tree(json!({"a": "Hello", "b": "Earth"})),
            "en",
            "fr",
            None,
            TranslateOptions {
                previous_source: Some(previous),
                existing_target: Some(existing),
                ..quiet_options()
            },
        )
        .await
        .unwrap();

    assert_eq!(output.target.to_json_value(), json!({"a": "Bonjour", "b": "FR Earth"}));
    let incremental = output.stats.incremental_stats.unwrap();
    assert_eq!((incremental.modified_keys, incremental.deleted_keys), (1, 1));
    assert_eq!(mock.request_count(), 1);
}
