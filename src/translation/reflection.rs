/*!
 * Quality review of finished translations.
 *
 * Every translation is checked locally for lost formatting, terminology violations
 * and suspicious length. When a critical or high severity issue is found, the flagged
 * items are sent back in a single consolidated correction request.
 */

use std::collections::HashSet;
use std::fmt;

use log::{debug, info, warn};
use serde::Serialize;

use crate::errors::{Error, Result};
use crate::format;
use crate::language_utils::display_name;
use crate::providers::{CompletionRequest, CompletionService, TokenUsage};
use crate::terminology::{Terminology, format_terminology_directive};

/// Sources this short are exempt from length-ratio checks
const SHORT_SOURCE_CHARS: usize = 10;
/// Minimum translated/source character ratio before a translation looks truncated
const MIN_LENGTH_RATIO: f64 = 0.2;
/// Maximum translated/source character ratio before a translation looks padded
const MAX_LENGTH_RATIO: f64 = 3.0;

/// Category of a quality issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueKind {
    Terminology,
    Format,
    Context,
    Naturalness,
    Completeness,
}

/// Severity of a quality issue, most severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    /// Whether the issue is worth a correction request
    pub fn is_actionable(&self) -> bool {
        matches!(self, Severity::Critical | Severity::High)
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Terminology => "terminology",
            Self::Format => "format",
            Self::Context => "context",
            Self::Naturalness => "naturalness",
            Self::Completeness => "completeness",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        };
        f.write_str(name)
    }
}

/// A problem found in one translation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualityIssue {
    pub key: String,
    pub kind: IssueKind,
    pub severity: Severity,
    pub description: String,
}

impl QualityIssue {
    fn new(key: &str, kind: IssueKind, severity: Severity, description: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            kind,
            severity,
            description: description.into(),
        }
    }
}

/// A source text and its current translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedItem {
    pub key: String,
    pub source: String,
    pub translation: String,
}

impl TranslatedItem {
    pub fn new(key: impl Into<String>, source: impl Into<String>, translation: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            source: source.into(),
            translation: translation.into(),
        }
    }
}

/// Issues found by the local checks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReflectionReport {
    pub issues: Vec<QualityIssue>,
    /// True when any critical or high severity issue exists
    pub reflection_needed: bool,
}

impl ReflectionReport {
    /// Keys with at least one actionable issue, in first-seen order
    pub fn flagged_keys(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.issues
            .iter()
            .filter(|i| i.severity.is_actionable())
            .map(|i| i.key.as_str())
            .filter(|k| seen.insert(*k))
            .collect()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }
}

/// Counters reported for the reflection step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReflectionStats {
    pub issues_found: usize,
    pub critical_issues: usize,
    pub high_issues: usize,
    pub corrected_items: usize,
    pub api_calls: usize,
}

/// Whether a run is worth reviewing at all
pub fn should_reflect(translations: &[TranslatedItem], terminology: Option<&Terminology>) -> bool {
    terminology.is_some_and(|t| !t.is_empty()) || translations.len() >= 3
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn check_item(
    item: &TranslatedItem,
    terminology: Option<&Terminology>,
    target_language: &str,
    issues: &mut Vec<QualityIssue>,
) {
    let key = item.key.as_str();

    let report = format::validation_report(&item.source, &item.translation);
    if !report.is_valid {
        issues.push(QualityIssue::new(
            key,
            IssueKind::Format,
            Severity::Critical,
            report.messages.join("; "),
        ));
    }

    if let Some(terminology) = terminology {
        for term in &terminology.preserve_terms {
            if contains_ignore_case(&item.source, term) && !contains_ignore_case(&item.translation, term) {
                issues.push(QualityIssue::new(
                    key,
                    IssueKind::Terminology,
                    Severity::Critical,
                    format!("Term '{}' must be kept untranslated", term),
                ));
            }
        }
        for (term, form) in terminology.consistent_pairs(target_language) {
            let Some(form) = form else { continue };
            if contains_ignore_case(&item.source, term) && !contains_ignore_case(&item.translation, form) {
                issues.push(QualityIssue::new(
                    key,
                    IssueKind::Terminology,
                    Severity::High,
                    format!("Term '{}' must be translated as '{}'", term, form),
                ));
            }
        }
    }

    let source_chars = item.source.trim().chars().count();
    let translated_chars = item.translation.trim().chars().count();
    if translated_chars == 0 {
        issues.push(QualityIssue::new(
            key,
            IssueKind::Completeness,
            Severity::Critical,
            "Translation is empty",
        ));
        return;
    }

    if source_chars > SHORT_SOURCE_CHARS {
        let ratio = translated_chars as f64 / source_chars as f64;
        if ratio < MIN_LENGTH_RATIO {
            issues.push(QualityIssue::new(
                key,
                IssueKind::Completeness,
                Severity::High,
                format!(
                    "Translation looks truncated ({} characters for a {} character source)",
                    translated_chars, source_chars
                ),
            ));
        }
        if item.translation.trim() == item.source.trim() {
            issues.push(QualityIssue::new(
                key,
                IssueKind::Naturalness,
                Severity::Medium,
                "Translation is identical to the source",
            ));
        }
    }

    if source_chars > 0 && translated_chars as f64 > source_chars as f64 * MAX_LENGTH_RATIO {
        issues.push(QualityIssue::new(
            key,
            IssueKind::Completeness,
            Severity::Low,
            format!(
                "Translation is much longer than the source ({} vs {} characters)",
                translated_chars, source_chars
            ),
        ));
    }
}

/// Run the local checks over every translation
pub fn analyze(
    translations: &[TranslatedItem],
    terminology: Option<&Terminology>,
    target_language: &str,
) -> ReflectionReport {
    let mut issues = Vec::new();
    for item in translations {
        check_item(item, terminology, target_language, &mut issues);
    }
    let reflection_needed = issues.iter().any(|i| i.severity.is_actionable());
    debug!(
        "Quality review found {} issues in {} translations",
        issues.len(),
        translations.len()
    );
    ReflectionReport {
        issues,
        reflection_needed,
    }
}

/// Result of a reflection pass
#[derive(Debug, Default)]
pub struct ReflectionOutcome {
    /// All translations, with accepted corrections applied
    pub translations: Vec<TranslatedItem>,
    pub report: ReflectionReport,
    pub corrected_keys: Vec<String>,
    pub api_calls: usize,
    pub token_usage: TokenUsage,
    /// Non-fatal failure of the correction request
    pub error: Option<Error>,
}

impl ReflectionOutcome {
    pub fn stats(&self) -> ReflectionStats {
        ReflectionStats {
            issues_found: self.report.issues.len(),
            critical_issues: self.report.count(Severity::Critical),
            high_issues: self.report.count(Severity::High),
            corrected_items: self.corrected_keys.len(),
            api_calls: self.api_calls,
        }
    }
}

/// Issues a single correction request for flagged translations
#[derive(Debug, Clone, Copy)]
pub struct ReflectionEngine<'a> {
    service: &'a dyn CompletionService,
    source_language: &'a str,
    target_language: &'a str,
    temperature: f32,
    max_tokens: u32,
}

impl<'a> ReflectionEngine<'a> {
    pub fn new(
        service: &'a dyn CompletionService,
        source_language: &'a str,
        target_language: &'a str,
    ) -> Self {
        Self {
            service,
            source_language,
            target_language,
            temperature: 0.2,
            max_tokens: 4096,
        }
    }

    pub fn with_generation(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    /// Analyze the translations and correct flagged items with at most one request
    pub async fn reflect(
        &self,
        translations: Vec<TranslatedItem>,
        terminology: Option<&Terminology>,
    ) -> ReflectionOutcome {
        let report = analyze(&translations, terminology, self.target_language);
        let mut outcome = ReflectionOutcome {
            translations,
            report,
            ..Default::default()
        };
        if !outcome.report.reflection_needed {
            return outcome;
        }

        match self.request_corrections(&outcome.translations, &outcome.report, terminology).await {
            Ok((corrections, usage)) => {
                outcome.api_calls = 1;
                outcome.token_usage = usage;
                for item in outcome.translations.iter_mut() {
                    if let Some(corrected) = corrections.iter().find(|(k, _)| *k == item.key) {
                        item.translation = corrected.1.clone();
                        outcome.corrected_keys.push(item.key.clone());
                    }
                }
                info!(
                    "Reflection corrected {} of {} flagged translations",
                    outcome.corrected_keys.len(),
                    outcome.report.flagged_keys().len()
                );
            }
            Err(e) => {
                outcome.api_calls = 1;
                warn!("Reflection request failed, keeping original translations: {}", e);
                outcome.error = Some(e);
            }
        }
        outcome
    }

    async fn request_corrections(
        &self,
        translations: &[TranslatedItem],
        report: &ReflectionReport,
        terminology: Option<&Terminology>,
    ) -> Result<(Vec<(String, String)>, TokenUsage)> {
        let flagged = report.flagged_keys();
        let prompt = build_reflection_prompt(
            translations,
            report,
            terminology,
            self.source_language,
            self.target_language,
        );
        let request = CompletionRequest::new(prompt)
            .with_system("You are a meticulous localization reviewer. You fix translations without changing their meaning.")
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);

        let completion = self.service.complete(request).await.map_err(|e| {
            Error::translation("Reflection request failed")
                .with_cause(e)
                .with_context("flagged", flagged.len())
        })?;
        Ok((parse_corrections(&completion.text, &flagged), completion.token_usage))
    }
}

/// Build the consolidated correction prompt for all flagged items
pub fn build_reflection_prompt(
    translations: &[TranslatedItem],
    report: &ReflectionReport,
    terminology: Option<&Terminology>,
    source_language: &str,
    target_language: &str,
) -> String {
    let mut prompt = format!(
        "The following translations from {} to {} have problems.\n\
         Fix each of them and answer with one line per item in the form KEY: corrected translation.\n\
         Write line breaks inside a translation as \\n. Only answer for the keys listed below.\n",
        display_name(source_language),
        display_name(target_language)
    );

    if let Some(directive) = terminology.and_then(|t| format_terminology_directive(t, target_language)) {
        prompt.push('\n');
        prompt.push_str(&directive);
        prompt.push('\n');
    }

    for key in report.flagged_keys() {
        let Some(item) = translations.iter().find(|t| t.key == key) else {
            continue;
        };
        prompt.push_str(&format!(
            "\nItem {}\nSource: {}\nCurrent translation: {}\nProblems:\n",
            key,
            item.source.replace('\n', "\\n"),
            item.translation.replace('\n', "\\n")
        ));
        for issue in report.issues.iter().filter(|i| i.key == key) {
            prompt.push_str(&format!("- [{}] {}: {}\n", issue.severity, issue.kind, issue.description));
        }
        let instructions = format::build_format_instructions(&item.source);
        if !instructions.is_empty() {
            prompt.push_str(&instructions);
            prompt.push('\n');
        }
    }
    prompt
}

/// Parse `KEY: text` lines, accepting only flagged keys
///
/// Keys may themselves contain colons; the longest flagged key followed by a colon wins.
/// Otherwise the line is split on its first colon, ignoring spaces and backtick or
/// asterisk decoration around the key.
pub fn parse_corrections(response: &str, flagged: &[&str]) -> Vec<(String, String)> {
    let mut corrections: Vec<(String, String)> = Vec::new();
    for line in response.lines() {
        let line = line.trim().trim_start_matches("- ");
        let Some((key, rest)) = match_flagged_prefix(line, flagged).or_else(|| split_loose(line, flagged))
        else {
            continue;
        };

        let text = rest.trim().replace("\\n", "\n");
        if text.is_empty() || corrections.iter().any(|(k, _)| k == key) {
            continue;
        }
        corrections.push((key.to_string(), text));
    }
    corrections
}

fn match_flagged_prefix<'a, 'k>(line: &'a str, flagged: &[&'k str]) -> Option<(&'k str, &'a str)> {
    flagged
        .iter()
        .filter_map(|key| {
            let rest = line.strip_prefix(*key)?.strip_prefix(':')?;
            Some((*key, rest))
        })
        .max_by_key(|(key, _)| key.len())
}

fn split_loose<'a, 'k>(line: &'a str, flagged: &[&'k str]) -> Option<(&'k str, &'a str)> {
    let (raw_key, rest) = line.split_once(':')?;
    let key = raw_key.trim().trim_matches(|c| c == '`' || c == '*').trim();
    let key = flagged.iter().find(|k| **k == key)?;
    // The decoration may close after the colon, as in `**greet:** text`
    Some((*key, rest.trim_start_matches(|c| c == '`' || c == '*')))
}
