/*!
 * Tests for the quality review heuristics
 */

use treelingo::Terminology;
use treelingo::translation::{IssueKind, Severity, TranslatedItem, analyze, should_reflect};

fn items(pairs: &[(&str, &str, &str)]) -> Vec<TranslatedItem> {
    pairs
        .iter()
        .map(|(key, source, translation)| TranslatedItem::new(*key, *source, *translation))
        .collect()
}

#[test]
fn test_shouldReflect_dependsOnSizeAndTerminology() {
    let two = items(&[("a", "Hello", "Hola"), ("b", "Bye", "Adiós")]);
    let mut terminology = Terminology::new("en");
    terminology.add_preserve_term("Acme");

    assert!(!should_reflect(&two, None));
    assert!(should_reflect(&two, Some(&terminology)));
    assert!(!should_reflect(&two, Some(&Terminology::new("en"))));
}

#[test]
fn test_analyze_withLostPlaceholder_shouldReportCriticalFormatIssue() {
    let report = analyze(&items(&[("greet", "Hello {name}", "Hola")]), None, "es");

    assert!(report.reflection_needed);
    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.issues[0].key, "greet");
    assert_eq!(report.issues[0].kind, IssueKind::Format);
    assert_eq!(report.issues[0].severity, Severity::Critical);
    assert_eq!(report.flagged_keys(), vec!["greet"]);
}

#[test]
fn test_analyze_withCleanTranslations_shouldNotNeedReflection() {
    let report = analyze(
        &items(&[
            ("a", "Welcome back, {name}!", "Bon retour, {name} !"),
            ("b", "Your cart is empty", "Votre panier est vide"),
        ]),
        None,
        "fr",
    );

    assert!(report.issues.is_empty());
    assert!(!report.reflection_needed);
}

#[test]
fn test_analyze_withOnlyLowIssues_shouldNotNeedReflection() {
    let report = analyze(&items(&[("ok", "OK", "D'accord")]), None, "fr");

    assert_eq!(report.count(Severity::Low), 1);
    assert!(!report.reflection_needed);
    assert!(report.flagged_keys().is_empty());
}
