#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, debug, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

use treelingo::app_config::{self, API_KEY_ENV, Config, DEFAULT_CONFIG_FILE, TranslationProvider};
use treelingo::document::{load_tree, load_tree_if_exists, save_tree};
use treelingo::providers::create_service;
use treelingo::terminology::{JsonFileTerminologyRepository, Terminology, TerminologyRepository};
use treelingo::translation::{BatchEvent, TranslationPipeline};

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliTranslationProvider {
    Ollama,
    Anthropic,
    Mock,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Ollama => TranslationProvider::Ollama,
            CliTranslationProvider::Anthropic => TranslationProvider::Anthropic,
            CliTranslationProvider::Mock => TranslationProvider::Mock,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate a JSON document
    Translate(TranslateArgs),

    /// Show or edit a stored terminology
    Terms(TermsArgs),
}

#[derive(Parser, Debug)]
struct TranslateArgs {
    /// Source JSON document
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Translated document; defaults to `<target>.json` next to the input
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Source language code (e.g., 'en', 'es', 'fr')
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language code (e.g., 'en', 'es', 'fr')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Only translate keys matching these patterns (comma separated)
    #[arg(short, long, value_delimiter = ',')]
    include: Vec<String>,

    /// Never translate keys matching these patterns (comma separated)
    #[arg(short, long, value_delimiter = ',')]
    exclude: Vec<String>,

    /// Translate every included key, even unchanged ones
    #[arg(short, long)]
    force: bool,

    /// Snapshot of the previously translated source; defaults to `.treelingo/<output name>`
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Terminology identifier to load and update
    #[arg(long, default_value = "default")]
    terminology: String,

    /// Do not ask the model for terminology when none is stored
    #[arg(long)]
    skip_terminology_detection: bool,

    /// Disable the quality review pass
    #[arg(long)]
    no_reflection: bool,

    /// Translation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// API key for providers that need one
    #[arg(long, env = API_KEY_ENV, hide_env_values = true)]
    api_key: Option<String>,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Parser, Debug)]
struct TermsArgs {
    /// Terminology identifier
    #[arg(default_value = "default")]
    id: String,

    /// Add terms that must never be translated
    #[arg(long, value_delimiter = ',')]
    preserve: Vec<String>,

    /// Add terms that must be translated consistently
    #[arg(long, value_delimiter = ',')]
    consistent: Vec<String>,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Parser, Debug)]
struct CommonArgs {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config_path: PathBuf,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

/// treelingo - incremental translation of JSON text trees with AI
#[derive(Parser, Debug)]
#[command(name = "treelingo")]
#[command(version)]
#[command(about = "Incremental, format-safe translation of JSON documents")]
#[command(long_about = "treelingo translates JSON localization files with LLM providers, only sending keys that changed since the previous run.

EXAMPLES:
    treelingo translate locales/en.json -t fr                 # Translate to locales/fr.json
    treelingo translate en.json -t de -i 'settings.**'        # Only translate settings
    treelingo translate en.json -t es -e 'brand.*' --force    # Retranslate everything but brand names
    treelingo terms shop --preserve 'Acme,Acme Cloud'         # Store terms that are never translated

CONFIGURATION:
    Configuration is stored in treelingo.json by default. If the config file doesn't
    exist, a default one will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,
}

// Timestamped logger writing colored lines to stderr; filtering follows `log::max_level`
struct CustomLogger;

impl CustomLogger {
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger))?;
        log::set_max_level(level);
        Ok(())
    }

    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "1;31",
            Level::Warn => "1;33",
            Level::Info => "1;32",
            Level::Debug => "1;36",
            Level::Trace => "1;35",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "\x1B[{}m{} {:<5} {}\x1B[0m",
                Self::color_for_level(record.level()),
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Info until the configuration says otherwise
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();
    match cli.command {
        Commands::Translate(args) => run_translate(args).await,
        Commands::Terms(args) => run_terms(args),
    }
}

fn load_config(common: &CommonArgs) -> Result<Config> {
    let mut config = Config::load_or_create(&common.config_path)?;
    if let Some(level) = common.log_level {
        config.log_level = level.into();
    }
    log::set_max_level(config.log_level.into());
    Ok(config)
}

async fn run_translate(args: TranslateArgs) -> Result<()> {
    let mut config = load_config(&args.common)?;

    // Command line options override the config file
    if let Some(provider) = args.provider {
        config.translation.provider = provider.into();
    }
    if let Some(model) = &args.model {
        config.translation.model = model.clone();
    }
    if let Some(api_key) = &args.api_key {
        config.translation.api_key = api_key.clone();
    }
    if let Some(source_language) = &args.source_language {
        config.source_language = source_language.clone();
    }
    if let Some(target_language) = &args.target_language {
        config.target_language = target_language.clone();
    }
    if !args.include.is_empty() {
        config.filter.include = args.include.clone();
    }
    if !args.exclude.is_empty() {
        config.filter.exclude = args.exclude.clone();
    }
    if args.no_reflection {
        config.translation.reflection = false;
    }
    config.validate().context("Configuration validation failed")?;

    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.input, &config.target_language));
    let snapshot_path = args
        .snapshot
        .clone()
        .unwrap_or_else(|| default_snapshot_path(&output_path));

    let source = load_tree(&args.input)?;
    let existing_target = load_tree_if_exists(&output_path)?;
    let previous_source = load_tree_if_exists(&snapshot_path)?;
    if previous_source.is_none() && existing_target.is_some() {
        debug!("No snapshot at {}, comparing against the existing output", snapshot_path.display());
    }

    let repository = JsonFileTerminologyRepository::new(config.terminology_dir());
    let stored_terminology = repository.load(&args.terminology)?;

    let service = create_service(&config.translation)
        .map_err(|e| anyhow!("Failed to create {} provider: {}", config.translation.provider, e))?;
    info!(
        "treelingo: {} - {} ({} → {})",
        config.translation.provider.display_name(),
        config.translation.get_model(),
        config.source_language,
        config.target_language
    );

    let progress_bar = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} texts ({percent}%) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress_bar.set_style(style.progress_chars("█▓▒░"));

    let bar = progress_bar.clone();
    let pipeline = TranslationPipeline::new(service).with_progress(move |event| match event {
        BatchEvent::Start { size, attempt: 1, .. } => bar.inc_length(*size as u64),
        BatchEvent::Start { .. } => {}
        BatchEvent::Retry { index, attempt, error, .. } => {
            bar.set_message(format!("batch {} retry {} ({})", index + 1, attempt, error));
        }
        BatchEvent::Complete { size, .. } => bar.inc(*size as u64),
        BatchEvent::Error { index, .. } => bar.set_message(format!("batch {} failed", index + 1)),
    });

    let cancel = pipeline.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling remaining batches");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let mut options = config.translate_options();
    options.force = args.force;
    options.skip_terminology_detection = args.skip_terminology_detection;
    options.existing_target = existing_target;
    options.previous_source = previous_source;

    let output = pipeline
        .translate(
            &source,
            &config.source_language,
            &config.target_language,
            stored_terminology.as_ref(),
            options,
        )
        .await;
    progress_bar.finish_and_clear();
    let output = output?;

    save_tree(&output_path, &output.target)?;
    save_tree(&snapshot_path, &source)?;

    if let Some(detected) = &output.detected_terminology {
        let mut terminology = stored_terminology.unwrap_or_else(|| Terminology::new(&config.source_language));
        terminology.merge(detected);
        repository.save(&args.terminology, &terminology)?;
        info!(
            "Saved {} detected terms to terminology '{}'",
            detected.source_terms().len(),
            args.terminology
        );
    }

    for issue in &output.issues {
        warn!("{} [{}] {}: {}", issue.key, issue.severity, issue.kind, issue.description);
    }
    if let Some(e) = &output.reflection_error {
        warn!("Quality corrections were skipped: {}", e);
    }
    if output.stats.failed_items > 0 {
        warn!("{} texts could not be translated and were left out", output.stats.failed_items);
    }

    info!(
        "Success: {} ({} translated, {} API calls, {} tokens, {:.1}s)",
        output_path.display(),
        output.stats.success_items,
        output.stats.api_calls,
        output.stats.total_tokens,
        output.stats.duration.as_secs_f64()
    );
    Ok(())
}

fn run_terms(args: TermsArgs) -> Result<()> {
    let config = load_config(&args.common)?;
    let repository = JsonFileTerminologyRepository::new(config.terminology_dir());
    let mut terminology = repository
        .load(&args.id)?
        .unwrap_or_else(|| Terminology::new(&config.source_language));

    if !args.preserve.is_empty() || !args.consistent.is_empty() {
        for term in &args.preserve {
            terminology.add_preserve_term(term.trim());
        }
        for term in &args.consistent {
            terminology.add_consistent_term(term.trim());
        }
        repository.save(&args.id, &terminology)?;
        info!("Updated terminology '{}' in {}", args.id, repository.dir().display());
    }

    println!("{}", serde_json::to_string_pretty(&terminology)?);
    Ok(())
}

/// `en.json` becomes `fr.json`; other names get the language inserted (`app.fr.json`)
fn default_output_path(input: &Path, target_language: &str) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
    let is_language_named = treelingo::language_utils::validate_language_code(stem).is_ok();
    let file_name = if is_language_named {
        format!("{}.json", target_language)
    } else {
        format!("{}.{}.json", stem, target_language)
    };
    input.with_file_name(file_name)
}

fn default_snapshot_path(output: &Path) -> PathBuf {
    let file_name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "snapshot.json".into());
    output
        .parent()
        .unwrap_or(Path::new("."))
        .join(".treelingo")
        .join(file_name)
}
