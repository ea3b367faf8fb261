/*!
 * Change detection between a source tree and a prior tree.
 */

use std::collections::HashSet;

use serde::Serialize;

use super::tree::{FlatMap, TextTree, flatten};

/// Classification of source keys against a prior flattening
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffResult {
    /// Keys absent from the prior tree
    pub new: Vec<String>,
    /// Keys whose canonical value differs from the prior tree
    pub modified: Vec<String>,
    /// Keys whose canonical value matches the prior tree
    pub unchanged: Vec<String>,
    /// Keys present only in the prior tree
    pub deleted: Vec<String>,
}

/// Counters reported for incremental runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IncrementalStats {
    pub new_keys: usize,
    pub modified_keys: usize,
    pub unchanged_keys: usize,
    pub deleted_keys: usize,
}

impl DiffResult {
    /// Keys that need a fresh translation
    pub fn keys_to_translate(&self) -> HashSet<&str> {
        self.new
            .iter()
            .chain(self.modified.iter())
            .map(String::as_str)
            .collect()
    }

    pub fn total_source_keys(&self) -> usize {
        self.new.len() + self.modified.len() + self.unchanged.len()
    }

    pub fn stats(&self) -> IncrementalStats {
        IncrementalStats {
            new_keys: self.new.len(),
            modified_keys: self.modified.len(),
            unchanged_keys: self.unchanged.len(),
            deleted_keys: self.deleted.len(),
        }
    }
}

/// Classify every source leaf against an optional prior tree
pub fn analyze_diff(source: &TextTree, target: Option<&TextTree>) -> DiffResult {
    let source_flat = flatten(source);
    let target_flat = target.map(flatten);
    analyze_flat_diff(&source_flat, target_flat.as_ref())
}

/// Same as [`analyze_diff`] on already flattened maps
pub fn analyze_flat_diff(source: &FlatMap, target: Option<&FlatMap>) -> DiffResult {
    let Some(target) = target else {
        return DiffResult {
            new: source.keys().cloned().collect(),
            ..Default::default()
        };
    };

    let mut result = DiffResult::default();
    for (key, value) in source {
        match target.get(key) {
            None => result.new.push(key.clone()),
            Some(previous) if previous.canonical() != value.canonical() => {
                result.modified.push(key.clone())
            }
            Some(_) => result.unchanged.push(key.clone()),
        }
    }

    result.deleted = target
        .keys()
        .filter(|key| !source.contains_key(*key))
        .cloned()
        .collect();

    result
}

/// Whether a run has anything to translate
pub fn should_translate(diff: &DiffResult, force: bool) -> bool {
    force || !diff.new.is_empty() || !diff.modified.is_empty()
}

/// Union of translated and unchanged entries; translated entries win on collision
pub fn merge_diff(translated: &FlatMap, unchanged: &FlatMap) -> FlatMap {
    let mut merged = unchanged.clone();
    for (key, value) in translated {
        merged.insert(key.clone(), value.clone());
    }
    merged
}
