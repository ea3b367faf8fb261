use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::translation::TranslateOptions;

/// Application configuration module
/// This module handles loading, validating and saving the `treelingo.json` settings
/// and turning them into pipeline options.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Source language code (ISO)
    pub source_language: String,

    /// Target language code (ISO)
    pub target_language: String,

    /// Translation config
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Key patterns restricting which keys are translated
    #[serde(default)]
    pub filter: FilterConfig,

    /// Directory holding `<id>.json` terminology files
    #[serde(default)]
    pub terminology_dir: Option<PathBuf>,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    #[default]
    Ollama,
    Anthropic,
    /// Offline provider that echoes prefixed source texts
    Mock,
}

impl TranslationProvider {
    pub fn display_name(&self) -> &str {
        match self {
            Self::Ollama => "Ollama",
            Self::Anthropic => "Anthropic",
            Self::Mock => "Mock",
        }
    }

    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::Anthropic)
    }
}

impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Ollama => "ollama",
            Self::Anthropic => "anthropic",
            Self::Mock => "mock",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "anthropic" => Ok(Self::Anthropic),
            "mock" => Ok(Self::Mock),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Translation provider to use
    #[serde(default)]
    pub provider: TranslationProvider,

    /// Model name, empty for the provider default
    #[serde(default)]
    pub model: String,

    /// Service URL, empty for the provider default
    #[serde(default)]
    pub endpoint: String,

    /// API key, required by Anthropic
    #[serde(default)]
    pub api_key: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum texts per request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum number of concurrent requests
    #[serde(default = "default_concurrent_requests")]
    pub concurrent_requests: usize,

    /// Attempts per batch before the run fails
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff base for retries (in milliseconds), doubled on each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Temperature parameter for text generation (0.0 to 2.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Review translations and request one round of corrections
    #[serde(default = "default_true")]
    pub reflection: bool,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            model: String::new(),
            endpoint: String::new(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
            batch_size: default_batch_size(),
            concurrent_requests: default_concurrent_requests(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            reflection: true,
        }
    }
}

impl TranslationConfig {
    /// Get the model, falling back to the provider default
    pub fn get_model(&self) -> String {
        if !self.model.is_empty() {
            return self.model.clone();
        }
        match self.provider {
            TranslationProvider::Ollama => default_ollama_model(),
            TranslationProvider::Anthropic => default_anthropic_model(),
            TranslationProvider::Mock => "mock".to_string(),
        }
    }

    /// Get the endpoint, falling back to the provider default
    pub fn get_endpoint(&self) -> String {
        if !self.endpoint.is_empty() {
            return self.endpoint.clone();
        }
        match self.provider {
            TranslationProvider::Ollama => default_ollama_endpoint(),
            TranslationProvider::Anthropic => default_anthropic_endpoint(),
            TranslationProvider::Mock => String::new(),
        }
    }

    /// Get the API key, preferring the configured one over `TREELINGO_API_KEY`
    pub fn get_api_key(&self) -> String {
        if !self.api_key.is_empty() {
            return self.api_key.clone();
        }
        std::env::var(API_KEY_ENV).unwrap_or_default()
    }
}

/// Environment variable consulted when no API key is configured
pub const API_KEY_ENV: &str = "TREELINGO_API_KEY";

/// Key filter configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct FilterConfig {
    /// Patterns of keys to translate; empty means all keys
    #[serde(default)]
    pub include: Vec<String>,

    /// Patterns of keys to leave untouched
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "treelingo.json";

fn default_timeout_secs() -> u64 {
    60
}

fn default_batch_size() -> usize {
    20
}

fn default_concurrent_requests() -> usize {
    3
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_true() -> bool {
    true
}

fn default_ollama_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_anthropic_endpoint() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}

fn default_ollama_model() -> String {
    "llama3.2:3b".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-haiku-20240307".to_string()
}

impl Config {
    /// Load the configuration, writing a default file first when none exists
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::warn!("Config file not found at '{}', creating default config.", path.display());
            let config = Config::default();
            config.save(path)?;
            return Ok(config);
        }
        Self::load(path)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to open config file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;
        fs::write(path, json + "\n")
            .with_context(|| format!("Failed to write config to file: {}", path.display()))
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        crate::language_utils::validate_language_code(&self.source_language)?;
        crate::language_utils::validate_language_code(&self.target_language)?;

        let translation = &self.translation;
        if translation.batch_size == 0 {
            return Err(anyhow!("Batch size must be at least 1"));
        }
        if translation.concurrent_requests == 0 {
            return Err(anyhow!("Concurrent requests must be at least 1"));
        }
        if translation.max_retries == 0 {
            return Err(anyhow!("Max retries must be at least 1"));
        }
        if !(0.0..=2.0).contains(&translation.temperature) {
            return Err(anyhow!("Temperature must be between 0.0 and 2.0"));
        }
        if translation.provider.requires_api_key() && translation.get_api_key().is_empty() {
            return Err(anyhow!(
                "Translation API key is required for {} provider (set it in the config or {})",
                translation.provider.display_name(),
                API_KEY_ENV
            ));
        }

        crate::filter::KeyFilter::from_lists(&self.filter.include, &self.filter.exclude)?;
        Ok(())
    }

    /// Pipeline options carrying this configuration's settings
    pub fn translate_options(&self) -> TranslateOptions {
        let translation = &self.translation;
        TranslateOptions {
            batch_size: translation.batch_size,
            concurrency: translation.concurrent_requests,
            max_retries: translation.max_retries,
            retry_base_delay: Duration::from_millis(translation.retry_backoff_ms),
            include_patterns: self.filter.include.clone(),
            exclude_patterns: self.filter.exclude.clone(),
            reflection: translation.reflection,
            temperature: translation.temperature,
            max_tokens: translation.max_tokens,
            ..TranslateOptions::default()
        }
    }

    /// Directory for terminology files: the configured one or the user data directory
    pub fn terminology_dir(&self) -> PathBuf {
        self.terminology_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("treelingo")
                .join("terminology")
        })
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: "en".to_string(),
            target_language: "fr".to_string(),
            translation: TranslationConfig::default(),
            filter: FilterConfig::default(),
            terminology_dir: None,
            log_level: LogLevel::default(),
        }
    }
}
