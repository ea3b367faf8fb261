/*!
 * Tests for tree flattening, rebuilding, change detection and document files
 */

use serde_json::json;
use treelingo::document::{
    LeafValue, analyze_diff, flatten, load_tree, load_tree_if_exists, merge_diff, rebuild_json,
    save_tree, should_translate,
};
use treelingo::ErrorKind;

use crate::common::{create_json_file, create_temp_dir, sample_locale, tree};

#[test]
fn test_flattenThenRebuild_shouldRestoreTree() {
    let original = tree(json!({
        "menu": {"items": ["Open", {"label": "Save", "shortcut": "Ctrl+S"}], "enabled": true},
        "count": 2,
        "note": null
    }));

    let flat = flatten(&original);

    assert_eq!(
        flat.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["menu.items[0]", "menu.items[1].label", "menu.items[1].shortcut", "menu.enabled", "count", "note"]
    );
    assert_eq!(rebuild_json(&flat), original);
}

#[test]
fn test_analyzeDiff_againstItself_shouldBeAllUnchanged() {
    let source = tree(sample_locale());

    let fresh = analyze_diff(&source, None);
    let same = analyze_diff(&source, Some(&source));

    assert_eq!(fresh.new.len(), 8);
    assert!(fresh.unchanged.is_empty());
    assert_eq!(same.unchanged.len(), 8);
    assert!(!should_translate(&same, false));
    assert!(should_translate(&same, true));
}

#[test]
fn test_analyzeDiff_shouldClassifyEveryKey() {
    let previous = tree(json!({"a": "Hello", "b": "World", "gone": "Bye", "n": 42}));
    let current = tree(json!({"a": "Hello", "b": "Earth", "c": "New", "n": "42"}));

    let diff = analyze_diff(&current, Some(&previous));

    assert_eq!(diff.unchanged, vec!["a", "n"]);
    assert_eq!(diff.modified, vec!["b"]);
    assert_eq!(diff.new, vec!["c"]);
    assert_eq!(diff.deleted, vec!["gone"]);
    let stats = diff.stats();
    assert_eq!((stats.new_keys, stats.modified_keys, stats.deleted_keys), (1, 1, 1));
}

#[test]
fn test_mergeDiff_shouldPreferTranslatedValues() {
    let mut translated = flatten(&tree(json!({"a": "Bonjour"})));
    translated.insert("b".to_string(), LeafValue::from("Monde"));
    let unchanged = flatten(&tree(json!({"a": "Salut", "c": "Reste"})));

    let merged = merge_diff(&translated, &unchanged);

    assert_eq!(merged.get("a"), Some(&LeafValue::from("Bonjour")));
    assert_eq!(merged.get("b"), Some(&LeafValue::from("Monde")));
    assert_eq!(merged.get("c"), Some(&LeafValue::from("Reste")));
}

#[test]
fn test_rebuildJson_withConflictingPaths_shouldKeepFirst() {
    let mut flat = flatten(&tree(json!({"a": "leaf"})));
    flat.insert("a.b".to_string(), LeafValue::from("child"));

    let rebuilt = rebuild_json(&flat);

    assert_eq!(rebuilt.to_json_value(), json!({"a": "leaf"}));
}

#[test]
fn test_saveTree_thenLoad_shouldPreserveKeyOrder() {
    let dir = create_temp_dir().unwrap();
    let path = dir.path().join("nested").join("fr.json");
    let document = tree(json!({"zeta": "Z", "alpha": {"beta": "B"}}));

    save_tree(&path, &document).unwrap();
    let content = std::fs::read_to_string(&path).unwrap();

    assert!(content.ends_with("}\n"));
    assert!(content.find("zeta").unwrap() < content.find("alpha").unwrap());
    assert_eq!(load_tree(&path).unwrap(), document);
}

#[test]
fn test_loadTree_withInvalidJson_shouldReportPath() {
    let dir = create_temp_dir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{\"a\": ").unwrap();

    let error = load_tree(&path).unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Validation);
    assert!(error.context_value("path").unwrap().ends_with("broken.json"));
}

#[test]
fn test_loadTreeIfExists_shouldDistinguishMissingFiles() {
    let dir = create_temp_dir().unwrap();
    let path = create_json_file(dir.path(), "en.json", &json!({"a": "b"})).unwrap();

    assert!(load_tree_if_exists(&path).unwrap().is_some());
    assert!(load_tree_if_exists(dir.path().join("missing.json")).unwrap().is_none());
}
