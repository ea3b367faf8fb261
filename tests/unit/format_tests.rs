/*!
 * Tests for protected element extraction and validation
 */

use treelingo::ErrorKind;
use treelingo::format::{FormatClass, build_format_instructions, extract, validate, validation_report};

#[test]
fn test_validate_withDroppedPlaceholder_shouldFail() {
    let error = validate("Hello {name}", "你好").unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Format);
    assert!(error.message().contains("{name}"));
    assert!(validate("Hello {name}", "你好 {name}").is_ok());
}

#[test]
fn test_extract_shouldFindEveryClassInOrder() {
    let text = "Hi %s, read <a>**the docs**</a> at https://example.com/docs.";

    let elements = extract(text);
    let classes: Vec<FormatClass> = elements.iter().map(|e| e.class).collect();

    assert_eq!(
        classes,
        vec![FormatClass::Placeholder, FormatClass::Markup, FormatClass::Markdown, FormatClass::Markup, FormatClass::Url]
    );
    assert_eq!(elements.last().unwrap().value, "https://example.com/docs");
}

#[test]
fn test_validationReport_shouldCountRepeatedElements() {
    let report = validation_report("{{count}} of {{count}}", "{{count}} sur");

    assert!(!report.is_valid);
    assert_eq!(report.missing.len(), 1);
    assert_eq!((report.missing[0].expected, report.missing[0].found), (2, 1));
}

#[test]
fn test_validationReport_shouldTolerateExtraElements() {
    let report = validation_report("Save", "<b>Enregistrer</b>");

    assert!(report.is_valid);
    assert_eq!(report.extra.len(), 2);
}

#[test]
fn test_buildFormatInstructions_shouldGroupByClass() {
    let instructions = build_format_instructions("Go to <b>{page}</b> or {page}");

    assert!(instructions.starts_with("Keep these elements exactly as written:"));
    assert!(instructions.contains("- Placeholders: {page}"));
    assert!(instructions.contains("- Markup tags: <b>, </b>"));
    assert!(build_format_instructions("Plain text").is_empty());
}
