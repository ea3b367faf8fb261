/*!
 * Key selection by glob-like path patterns.
 *
 * - `pattern`: pattern grammar, classification and compiled matchers
 * - `keys`: partitioning of flattened keys into included/excluded sets
 */

pub mod keys;
pub mod pattern;

pub use keys::{FilterResult, FilterStats, KeyFilter, filter_keys};
pub use pattern::{KeyPattern, PatternKind, matches_any, parse_pattern_list, parse_patterns};

// Trees are rebuilt from the filtered flat maps
pub use crate::document::rebuild_json;
