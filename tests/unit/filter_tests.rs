/*!
 * Tests for key patterns and key filtering
 */

use serde_json::json;
use treelingo::ErrorKind;
use treelingo::filter::{KeyFilter, KeyPattern, PatternKind, filter_keys, parse_patterns, rebuild_json};

use crate::common::{sample_locale, tree};

fn pattern(raw: &str) -> KeyPattern {
    KeyPattern::parse(raw).unwrap()
}

#[test]
fn test_patterns_shouldMatchAtSegmentBoundaries() {
    let exact = pattern("a.b");
    assert!(exact.matches("a.b"));
    assert!(!exact.matches("a.bc"));
    assert!(!exact.matches("a.b.c"));

    let single = pattern("a.*");
    assert!(single.matches("a.b"));
    assert!(!single.matches("a.b.c"));
    assert!(!single.matches("a"));

    let recursive = pattern("a.**");
    assert!(recursive.matches("a.b"));
    assert!(recursive.matches("a.b.c.d"));
    assert!(!recursive.matches("a"));
    assert!(!recursive.matches("x.b"));

    let positional = pattern("*.b");
    assert!(positional.matches("x.b"));
    assert!(positional.matches("y.b"));
    assert!(!positional.matches("x.y.b"));
}

#[test]
fn test_patternKind_shouldFollowWildcards() {
    assert_eq!(pattern("a.b").kind(), PatternKind::Exact);
    assert_eq!(pattern("a.*").kind(), PatternKind::SingleWildcard);
    assert_eq!(pattern("a.**").kind(), PatternKind::RecursiveWildcard);
    assert_eq!(pattern("*.title").kind(), PatternKind::PositionalWildcard);
}

#[test]
fn test_parsePatterns_withEmptySegment_shouldFail() {
    let error = parse_patterns("app.*, cart..items").unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Validation);
    assert_eq!(error.context_value("pattern"), Some("cart..items"));
}

#[test]
fn test_filterKeys_withSettingsWildcard_shouldSplitKeys() {
    let source = tree(json!({
        "settings": {"title": "Settings", "desc": "Your preferences"},
        "other": {"x": "Other"}
    }));

    let result = filter_keys(&source, &[pattern("settings.*")], &[]);

    assert_eq!(
        result.included.keys().collect::<Vec<_>>(),
        vec!["settings.title", "settings.desc"]
    );
    assert_eq!(result.excluded.keys().collect::<Vec<_>>(), vec!["other.x"]);
    assert_eq!(result.stats.total_keys, 3);
    assert_eq!(
        rebuild_json(&result.included).to_json_value(),
        json!({"settings": {"title": "Settings", "desc": "Your preferences"}})
    );
}

#[test]
fn test_keyFilter_excludeShouldWinOverInclude() {
    let filter = KeyFilter::from_lists(&["cart.**", "app.title"], &["cart.checkout"]).unwrap();

    let result = filter.apply(&treelingo::flatten(&tree(sample_locale())));

    assert_eq!(
        result.included.keys().collect::<Vec<_>>(),
        vec!["app.title", "cart.empty", "cart.items"]
    );
    assert_eq!(result.stats.included_keys, 3);
    assert_eq!(result.stats.excluded_keys, 5);
    assert!(!filter.is_pass_through());
    assert!(KeyFilter::default().is_pass_through());
}
