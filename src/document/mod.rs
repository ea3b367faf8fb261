/*!
 * Document model for JSON-like key-value trees.
 *
 * - `tree`: the `TextTree` sum type, flattening to flat keys and rebuilding
 * - `diff`: change detection between a source tree and a prior tree
 * - `io`: JSON load/save helpers
 */

pub mod diff;
pub mod io;
pub mod tree;

pub use diff::{
    DiffResult, IncrementalStats, analyze_diff, analyze_flat_diff, merge_diff, should_translate,
};
pub use io::{load_tree, load_tree_if_exists, parse_tree, save_tree};
pub use tree::{FlatMap, LeafValue, PathToken, TextTree, flatten, parse_path, rebuild_json};
