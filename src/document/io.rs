/*!
 * Loading and saving text trees as JSON documents.
 */

use std::fs;
use std::path::Path;

use log::debug;

use super::tree::TextTree;
use crate::errors::{Error, Result};

/// Parse a JSON document into a text tree
pub fn parse_tree(content: &str) -> Result<TextTree> {
    let value: serde_json::Value = serde_json::from_str(content)?;
    Ok(TextTree::from(value))
}

/// Load a JSON document from disk
pub fn load_tree<P: AsRef<Path>>(path: P) -> Result<TextTree> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        Error::io(format!("Failed to read {}", path.display()))
            .with_cause(e)
            .with_context("path", path.display())
    })?;
    debug!("Loaded {} ({} bytes)", path.display(), content.len());
    parse_tree(&content).map_err(|e| e.with_context("path", path.display()))
}

/// Load a JSON document if the file exists
pub fn load_tree_if_exists<P: AsRef<Path>>(path: P) -> Result<Option<TextTree>> {
    let path = path.as_ref();
    if !path.is_file() {
        return Ok(None);
    }
    load_tree(path).map(Some)
}

/// Save a text tree as pretty-printed JSON with a trailing newline
pub fn save_tree<P: AsRef<Path>>(path: P, tree: &TextTree) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut content = serde_json::to_string_pretty(&tree.to_json_value())?;
    content.push('\n');
    fs::write(path, content).map_err(|e| {
        Error::io(format!("Failed to write {}", path.display()))
            .with_cause(e)
            .with_context("path", path.display())
    })?;
    debug!("Saved {}", path.display());
    Ok(())
}
