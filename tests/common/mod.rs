/*!
 * Common test utilities for the treelingo test suite
 */

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde_json::Value;
use tempfile::TempDir;
use treelingo::TextTree;
use treelingo::translation::TranslateOptions;

pub mod mock_providers;

/// Route library logs to the test output
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Writes a JSON document with the given content in the specified directory
pub fn create_json_file(dir: &Path, filename: &str, content: &Value) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, serde_json::to_string_pretty(content)?)?;
    Ok(file_path)
}

pub fn tree(value: Value) -> TextTree {
    TextTree::from(value)
}

/// Options without detection or reflection and with near-instant retries
pub fn quiet_options() -> TranslateOptions {
    TranslateOptions {
        skip_terminology_detection: true,
        reflection: false,
        retry_base_delay: Duration::from_millis(1),
        ..TranslateOptions::default()
    }
}

/// A small localization file used across tests
pub fn sample_locale() -> Value {
    serde_json::json!({
        "app": {
            "title": "My Shop",
            "welcome": "Welcome back, {name}!"
        },
        "cart": {
            "empty": "Your cart is empty",
            "items": "You have {{count}} items",
            "checkout": "<b>Checkout</b> now"
        },
        "settings": {
            "title": "Settings",
            "help": "See https://example.com/help for details"
        },
        "version": 3
    })
}
