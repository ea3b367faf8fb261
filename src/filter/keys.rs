/*!
 * Partitioning of flattened keys into included and excluded sets.
 */

use log::debug;
use serde::Serialize;

use super::pattern::{KeyPattern, matches_any, parse_pattern_list};
use crate::document::{FlatMap, TextTree, flatten};
use crate::errors::Result;

/// Counters reported by a filtering pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterStats {
    pub total_keys: usize,
    pub included_keys: usize,
    pub excluded_keys: usize,
}

/// Outcome of filtering a flattened tree
#[derive(Debug, Clone, Default)]
pub struct FilterResult {
    pub included: FlatMap,
    pub excluded: FlatMap,
    pub stats: FilterStats,
}

/// Include/exclude pattern sets; exclusion always wins
#[derive(Debug, Clone, Default)]
pub struct KeyFilter {
    includes: Vec<KeyPattern>,
    excludes: Vec<KeyPattern>,
}

impl KeyFilter {
    pub fn new(includes: Vec<KeyPattern>, excludes: Vec<KeyPattern>) -> Self {
        Self { includes, excludes }
    }

    /// Parse include and exclude lists; each entry may be comma-separated
    pub fn from_lists<S: AsRef<str>>(includes: &[S], excludes: &[S]) -> Result<Self> {
        Ok(Self::new(
            parse_pattern_list(includes)?,
            parse_pattern_list(excludes)?,
        ))
    }

    /// Whether no pattern restricts the key set
    pub fn is_pass_through(&self) -> bool {
        self.includes.is_empty() && self.excludes.is_empty()
    }

    pub fn is_included(&self, key: &str) -> bool {
        let included = self.includes.is_empty() || matches_any(&self.includes, key);
        included && !matches_any(&self.excludes, key)
    }

    /// Split a flat map into included and excluded entries, keeping order
    pub fn apply(&self, flat: &FlatMap) -> FilterResult {
        let mut result = FilterResult::default();
        for (key, value) in flat {
            if self.is_included(key) {
                result.included.insert(key.clone(), value.clone());
            } else {
                result.excluded.insert(key.clone(), value.clone());
            }
        }

        result.stats = FilterStats {
            total_keys: flat.len(),
            included_keys: result.included.len(),
            excluded_keys: result.excluded.len(),
        };
        debug!(
            "Key filter: {} of {} keys included, {} excluded",
            result.stats.included_keys, result.stats.total_keys, result.stats.excluded_keys
        );
        result
    }
}

/// Flatten a tree and partition its keys by include and exclude patterns
pub fn filter_keys(tree: &TextTree, includes: &[KeyPattern], excludes: &[KeyPattern]) -> FilterResult {
    KeyFilter::new(includes.to_vec(), excludes.to_vec()).apply(&flatten(tree))
}
