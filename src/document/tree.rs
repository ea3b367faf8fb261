/*!
 * Text tree model and the flattening / rebuilding between trees and flat maps.
 *
 * A flat key addresses one leaf: object fields are joined with `.`, array
 * elements are addressed with `[index]` (`menu.items[0].label`). Keys that
 * themselves contain `.` or `[` cannot be told apart from nesting and are
 * not supported.
 */

use std::borrow::Cow;
use std::fmt;

use indexmap::IndexMap;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered mapping of flat key to leaf value, in document order
pub type FlatMap = IndexMap<String, LeafValue>;

/// A scalar value at the bottom of a text tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LeafValue {
    String(String),
    Number(serde_json::Number),
    Bool(bool),
    Null,
}

impl LeafValue {
    /// Textual form used for change detection.
    ///
    /// Equality on this form is deliberately loose: the string `"42"` and the
    /// number `42` compare equal.
    pub fn canonical(&self) -> Cow<'_, str> {
        match self {
            LeafValue::String(s) => Cow::Borrowed(s.as_str()),
            LeafValue::Number(n) => Cow::Owned(n.to_string()),
            LeafValue::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
            LeafValue::Null => Cow::Borrowed("null"),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            LeafValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Only non-blank strings are sent for translation
    pub fn is_translatable(&self) -> bool {
        matches!(self, LeafValue::String(s) if !s.trim().is_empty())
    }
}

impl fmt::Display for LeafValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl From<&str> for LeafValue {
    fn from(value: &str) -> Self {
        LeafValue::String(value.to_string())
    }
}

impl From<String> for LeafValue {
    fn from(value: String) -> Self {
        LeafValue::String(value)
    }
}

/// Recursive document model: a leaf, an object or an array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextTree {
    Leaf(LeafValue),
    Object(IndexMap<String, TextTree>),
    Array(Vec<TextTree>),
}

impl TextTree {
    pub fn empty_object() -> Self {
        TextTree::Object(IndexMap::new())
    }

    /// Convenience constructor for a string leaf
    pub fn text(value: impl Into<String>) -> Self {
        TextTree::Leaf(LeafValue::String(value.into()))
    }

    /// Number of leaves in the tree
    pub fn leaf_count(&self) -> usize {
        match self {
            TextTree::Leaf(_) => 1,
            TextTree::Object(map) => map.values().map(TextTree::leaf_count).sum(),
            TextTree::Array(items) => items.iter().map(TextTree::leaf_count).sum(),
        }
    }

    pub fn to_json_value(&self) -> Value {
        match self {
            TextTree::Leaf(LeafValue::String(s)) => Value::String(s.clone()),
            TextTree::Leaf(LeafValue::Number(n)) => Value::Number(n.clone()),
            TextTree::Leaf(LeafValue::Bool(b)) => Value::Bool(*b),
            TextTree::Leaf(LeafValue::Null) => Value::Null,
            TextTree::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json_value()))
                    .collect(),
            ),
            TextTree::Array(items) => {
                Value::Array(items.iter().map(TextTree::to_json_value).collect())
            }
        }
    }
}

impl From<Value> for TextTree {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => TextTree::Leaf(LeafValue::String(s)),
            Value::Number(n) => TextTree::Leaf(LeafValue::Number(n)),
            Value::Bool(b) => TextTree::Leaf(LeafValue::Bool(b)),
            Value::Null => TextTree::Leaf(LeafValue::Null),
            Value::Object(map) => {
                TextTree::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
            Value::Array(items) => TextTree::Array(items.into_iter().map(Into::into).collect()),
        }
    }
}

/// Flatten a tree into a path → leaf mapping.
///
/// Empty objects and arrays contribute no keys. A bare leaf at the root is
/// recorded under the empty key.
pub fn flatten(tree: &TextTree) -> FlatMap {
    let mut out = FlatMap::new();
    flatten_into(tree, "", &mut out);
    out
}

fn flatten_into(tree: &TextTree, prefix: &str, out: &mut FlatMap) {
    match tree {
        TextTree::Leaf(value) => {
            out.insert(prefix.to_string(), value.clone());
        }
        TextTree::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_into(child, &path, out);
            }
        }
        TextTree::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_into(child, &format!("{}[{}]", prefix, index), out);
            }
        }
    }
}

/// One step of a flat key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathToken {
    Key(String),
    Index(usize),
}

/// Split a flat key into object keys and array indices
pub fn parse_path(path: &str) -> Vec<PathToken> {
    let mut tokens = Vec::new();
    if path.is_empty() {
        return tokens;
    }

    for segment in path.split('.') {
        let (name, indices) = split_indices(segment);
        if !name.is_empty() {
            tokens.push(PathToken::Key(name.to_string()));
        }
        tokens.extend(indices.into_iter().map(PathToken::Index));
    }
    tokens
}

/// Split `items[0][1]` into `items` and `[0, 1]`; malformed brackets stay part of the name
fn split_indices(segment: &str) -> (&str, Vec<usize>) {
    let mut indices = Vec::new();
    let mut rest = segment;

    while rest.ends_with(']') {
        let Some(open) = rest.rfind('[') else { break };
        match rest[open + 1..rest.len() - 1].parse::<usize>() {
            Ok(index) => {
                indices.push(index);
                rest = &rest[..open];
            }
            Err(_) => break,
        }
    }

    if indices.is_empty() {
        return (segment, indices);
    }
    indices.reverse();
    (rest, indices)
}

/// Rebuild a nested tree from a flat map.
///
/// Intermediate objects and arrays are created on demand and array gaps are
/// filled with `null`. A path that would be both a leaf and a container prefix
/// of another path is dropped with a warning; this discards data without
/// failing the rebuild.
pub fn rebuild_json(flat: &FlatMap) -> TextTree {
    let mut root: Option<TextTree> = None;

    for (path, value) in flat {
        let tokens = parse_path(path);
        let assigned = match root.as_mut() {
            None => {
                root = Some(build(&tokens, value.clone()));
                true
            }
            Some(node) => !tokens.is_empty() && assign(node, &tokens, value.clone()),
        };

        if !assigned {
            warn!("Skipping key '{}': it conflicts with an existing leaf or container", path);
        }
    }

    root.unwrap_or_else(TextTree::empty_object)
}

fn build(tokens: &[PathToken], value: LeafValue) -> TextTree {
    let Some((head, rest)) = tokens.split_first() else {
        return TextTree::Leaf(value);
    };
    match head {
        PathToken::Key(key) => {
            let mut map = IndexMap::new();
            map.insert(key.clone(), build(rest, value));
            TextTree::Object(map)
        }
        PathToken::Index(index) => {
            let mut items = vec![TextTree::Leaf(LeafValue::Null); *index];
            items.push(build(rest, value));
            TextTree::Array(items)
        }
    }
}

fn assign(node: &mut TextTree, tokens: &[PathToken], value: LeafValue) -> bool {
    let Some((head, rest)) = tokens.split_first() else {
        return false;
    };

    match (node, head) {
        (TextTree::Object(map), PathToken::Key(key)) => match map.get_mut(key) {
            Some(child) => descend(child, rest, value),
            None => {
                map.insert(key.clone(), build(rest, value));
                true
            }
        },
        (TextTree::Array(items), PathToken::Index(index)) => {
            if let Some(child) = items.get_mut(*index) {
                descend(child, rest, value)
            } else {
                items.resize(*index, TextTree::Leaf(LeafValue::Null));
                items.push(build(rest, value));
                true
            }
        }
        _ => false,
    }
}

fn descend(child: &mut TextTree, rest: &[PathToken], value: LeafValue) -> bool {
    if !rest.is_empty() {
        return assign(child, rest, value);
    }
    if matches!(child, TextTree::Leaf(_)) {
        *child = TextTree::Leaf(value);
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(value: Value) -> TextTree {
        TextTree::from(value)
    }

    #[test]
    fn test_flatten_withNestedObjectsAndArrays_shouldProducePaths() {
        let source = tree(json!({
            "menu": {"title": "Menu", "items": [{"label": "Open"}, "Close"]},
            "count": 3
        }));

        let flat = flatten(&source);
        let keys: Vec<&str> = flat.keys().map(String::as_str).collect();

        assert_eq!(
            keys,
            vec!["menu.title", "menu.items[0].label", "menu.items[1]", "count"]
        );
        assert_eq!(flat["count"].canonical(), "3");
    }

    #[test]
    fn test_rebuild_ofFlatten_shouldRoundTrip() {
        let source = tree(json!({
            "app": {"name": "Demo", "enabled": true, "ratio": 1.5, "nothing": null},
            "steps": [["a", "b"], {"text": "c"}],
            "footer": "Bye"
        }));

        assert_eq!(rebuild_json(&flatten(&source)), source);
    }

    #[test]
    fn test_rebuild_withRootArray_shouldRebuildArray() {
        let source = tree(json!(["one", {"two": "2"}]));

        assert_eq!(rebuild_json(&flatten(&source)), source);
    }

    #[test]
    fn test_rebuild_withGap_shouldFillWithNull() {
        let mut flat = FlatMap::new();
        flat.insert("list[2]".to_string(), "third".into());

        let rebuilt = rebuild_json(&flat);

        assert_eq!(rebuilt, tree(json!({"list": [null, null, "third"]})));
    }

    #[test]
    fn test_rebuild_withLeafNamespaceConflict_shouldDropConflictingPath() {
        let mut flat = FlatMap::new();
        flat.insert("a".to_string(), "leaf".into());
        flat.insert("a.b".to_string(), "nested".into());
        flat.insert("c.d".to_string(), "nested".into());
        flat.insert("c".to_string(), "leaf".into());

        let rebuilt = rebuild_json(&flat);

        assert_eq!(rebuilt, tree(json!({"a": "leaf", "c": {"d": "nested"}})));
    }

    #[test]
    fn test_parsePath_shouldSplitKeysAndIndices() {
        assert_eq!(
            parse_path("a.items[0][1].b"),
            vec![
                PathToken::Key("a".to_string()),
                PathToken::Key("items".to_string()),
                PathToken::Index(0),
                PathToken::Index(1),
                PathToken::Key("b".to_string()),
            ]
        );
        assert_eq!(parse_path("weird[x]"), vec![PathToken::Key("weird[x]".to_string())]);
        assert!(parse_path("").is_empty());
    }

    #[test]
    fn test_leafValue_canonical_shouldBeLoose() {
        let number = LeafValue::Number(42.into());
        let text = LeafValue::String("42".to_string());

        assert_eq!(number.canonical(), text.canonical());
        assert_eq!(LeafValue::Null.canonical(), "null");
        assert!(!LeafValue::String("  ".to_string()).is_translatable());
        assert!(!number.is_translatable());
    }

    #[test]
    fn test_textTree_deserialize_shouldPreserveKeyOrder() {
        let parsed: TextTree = serde_json::from_str(r#"{"z": "1", "a": {"m": 2, "b": [true]}}"#).unwrap();

        let keys: Vec<String> = flatten(&parsed).keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a.m", "a.b[0]"]);
        assert_eq!(parsed.leaf_count(), 3);
    }
}
