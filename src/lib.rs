/*!
 * # treelingo
 *
 * A Rust library for incremental translation of structured text trees (JSON
 * localization files and similar documents) with LLMs.
 *
 * ## Features
 *
 * - Translate only keys that changed since the previous run
 * - Restrict translation to keys matching glob-like patterns (`settings.*`, `brand.**`)
 * - Keep placeholders, markup, URLs and markdown intact
 * - Batch texts into few requests and process batches concurrently with retries
 * - Review translations locally and request corrections in a single extra call
 * - Detect, persist and enforce terminology
 * - Providers:
 *   - Ollama (local LLM)
 *   - Anthropic API
 *   - A scripted mock for tests and dry runs
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `document`: text tree model, flattening, rebuilding, change detection and JSON I/O
 * - `filter`: key patterns and key filtering
 * - `format`: protected element extraction and validation
 * - `terminology`: terminology model, detection and repositories
 * - `translation`: AI-powered translation:
 *   - `translation::batch`: batching and the concurrent scheduler
 *   - `translation::reflection`: quality review and corrections
 *   - `translation::pipeline`: the end-to-end orchestrator
 * - `providers`: completion service trait and its implementations
 * - `app_config`: configuration management
 * - `language_utils`: ISO language code utilities
 * - `errors`: error types for the library
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

pub mod app_config;
pub mod document;
pub mod errors;
pub mod filter;
pub mod format;
pub mod language_utils;
pub mod providers;
pub mod terminology;
pub mod translation;

pub use app_config::Config;
pub use document::{TextTree, analyze_diff, flatten, load_tree, rebuild_json, save_tree};
pub use errors::{Error, ErrorKind, ProviderError, Result};
pub use filter::{KeyFilter, KeyPattern, filter_keys};
pub use language_utils::{get_language_name, language_codes_match};
pub use providers::{CompletionService, MockCompletion, create_service};
pub use terminology::{JsonFileTerminologyRepository, Terminology, TerminologyRepository};
pub use translation::{TranslateOptions, TranslationOutput, TranslationPipeline};
