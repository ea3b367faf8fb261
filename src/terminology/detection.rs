/*!
 * Terminology detection through the completion service.
 */

use log::{debug, info};

use super::Terminology;
use crate::errors::{Error, Result};
use crate::language_utils::get_language_name;
use crate::providers::{CompletionRequest, CompletionService};

/// Limits for a detection call
#[derive(Debug, Clone)]
pub struct DetectionOptions {
    /// Maximum number of sample texts sent to the model
    pub max_samples: usize,
    /// Maximum characters of sample text sent to the model
    pub max_sample_chars: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self {
            max_samples: 100,
            max_sample_chars: 6000,
            temperature: 0.0,
            max_tokens: 1024,
        }
    }
}

/// Ask the completion service which terms should be preserved or kept consistent
///
/// Only terms that literally occur in the samples are kept.
pub async fn detect_terminology(
    service: &dyn CompletionService,
    samples: &[&str],
    source_language: &str,
    options: &DetectionOptions,
) -> Result<Terminology> {
    let selected = select_samples(samples, options);
    if selected.is_empty() {
        return Ok(Terminology::new(source_language));
    }

    let prompt = build_detection_prompt(&selected, source_language);
    let request = CompletionRequest::new(prompt)
        .with_system("You identify product names, brand names and domain terms in UI text.")
        .with_temperature(options.temperature)
        .with_max_tokens(options.max_tokens);

    let completion = service.complete(request).await.map_err(|e| {
        Error::terminology("Terminology detection request failed")
            .with_cause(e)
            .with_context("samples", selected.len())
    })?;

    let terminology = parse_detection_response(&completion.text, &selected, source_language);
    info!(
        "Detected {} preserved and {} consistent terms from {} samples",
        terminology.preserve_terms.len(),
        terminology.source_terms().len(),
        selected.len()
    );
    Ok(terminology)
}

fn select_samples<'a>(samples: &[&'a str], options: &DetectionOptions) -> Vec<&'a str> {
    let mut selected = Vec::new();
    let mut chars = 0;
    for sample in samples.iter().filter(|s| !s.trim().is_empty()) {
        let len = sample.chars().count();
        if selected.len() >= options.max_samples || (chars + len > options.max_sample_chars && !selected.is_empty()) {
            break;
        }
        chars += len;
        selected.push(*sample);
    }
    selected
}

fn build_detection_prompt(samples: &[&str], source_language: &str) -> String {
    let language = get_language_name(source_language).unwrap_or_else(|_| source_language.to_string());
    let mut prompt = format!(
        "Below are {} texts from a software interface written in {}.\n\
         List the terms that need special handling when translating them:\n\
         - PRESERVE: <term> for brand names, product names and identifiers that must never be translated\n\
         - CONSISTENT: <term> for domain terms that must always be translated the same way\n\
         Answer with one term per line and nothing else. Answer NONE if there are no such terms.\n\nTexts:\n",
        samples.len(),
        language
    );
    for sample in samples {
        prompt.push_str("- ");
        prompt.push_str(&sample.replace('\n', " "));
        prompt.push('\n');
    }
    prompt
}

/// Parse `PRESERVE: term` and `CONSISTENT: term` lines, keeping terms found in the samples
pub fn parse_detection_response(response: &str, samples: &[&str], source_language: &str) -> Terminology {
    let haystack: Vec<String> = samples.iter().map(|s| s.to_lowercase()).collect();
    let occurs = |term: &str| {
        let needle = term.to_lowercase();
        haystack.iter().any(|s| s.contains(&needle))
    };

    let mut terminology = Terminology::new(source_language);
    for line in response.lines() {
        let line = line.trim().trim_start_matches(['-', '*', ' ']);
        let Some((label, term)) = line.split_once(':') else {
            continue;
        };
        let term = term.trim().trim_matches(['"', '\'', '`']).trim();
        if term.is_empty() {
            continue;
        }
        if !occurs(term) {
            debug!("Ignoring detected term '{}': not found in the samples", term);
            continue;
        }

        match label.trim().to_uppercase().as_str() {
            "PRESERVE" => terminology.add_preserve_term(term),
            "CONSISTENT" => {
                terminology.add_consistent_term(term);
            }
            _ => {}
        }
    }
    terminology
}
