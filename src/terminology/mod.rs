/*!
 * Terminology handling.
 *
 * A [`Terminology`] lists terms that must stay untranslated and terms that must be
 * translated the same way everywhere. Consistent terms are stored per language in
 * index-aligned lists: entry `i` of every language list names the same concept.
 *
 * - `detection`: asks the completion service for candidate terms
 * - `repository`: persistence of terminologies by identifier
 */

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub mod detection;
pub mod repository;

pub use detection::{DetectionOptions, detect_terminology, parse_detection_response};
pub use repository::{
    JsonFileTerminologyRepository, MemoryTerminologyRepository, TerminologyRepository,
};

/// Terms to preserve or translate consistently
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Terminology {
    /// Language the consistent terms were detected in
    #[serde(default)]
    pub source_language: String,
    /// Terms that must appear verbatim in every translation
    #[serde(default)]
    pub preserve_terms: Vec<String>,
    /// Index-aligned term lists keyed by language code
    #[serde(default)]
    pub consistent_terms: BTreeMap<String, Vec<String>>,
}

impl Terminology {
    pub fn new(source_language: impl Into<String>) -> Self {
        Self {
            source_language: source_language.into(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.preserve_terms.is_empty() && self.source_terms().is_empty()
    }

    /// Consistent terms in the source language
    pub fn source_terms(&self) -> &[String] {
        self.consistent_terms
            .get(&self.source_language)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn add_preserve_term(&mut self, term: impl Into<String>) {
        let term = term.into();
        if !contains_ignore_case(&self.preserve_terms, &term) {
            self.preserve_terms.push(term);
        }
    }

    /// Register a source-language term; returns its index
    pub fn add_consistent_term(&mut self, term: impl Into<String>) -> usize {
        let term = term.into();
        let list = self
            .consistent_terms
            .entry(self.source_language.clone())
            .or_default();
        if let Some(index) = position_ignore_case(list, &term) {
            return index;
        }
        list.push(term);
        list.len() - 1
    }

    /// Record the agreed translation of a source term; the term is added when unknown
    pub fn set_target_form(&mut self, term: &str, language: &str, form: impl Into<String>) {
        let index = self.add_consistent_term(term);
        let list = self.consistent_terms.entry(language.to_string()).or_default();
        if list.len() <= index {
            list.resize(index + 1, String::new());
        }
        list[index] = form.into();
    }

    /// Known translation of a source term, if one was recorded
    pub fn target_form(&self, term: &str, target_language: &str) -> Option<&str> {
        let index = position_ignore_case(self.source_terms(), term)?;
        self.consistent_terms
            .get(target_language)?
            .get(index)
            .map(String::as_str)
            .filter(|form| !form.is_empty())
    }

    /// Source terms paired with their known target forms
    pub fn consistent_pairs(&self, target_language: &str) -> Vec<(&str, Option<&str>)> {
        self.source_terms()
            .iter()
            .map(|term| (term.as_str(), self.target_form(term, target_language)))
            .collect()
    }

    /// Add the terms of another terminology that are not known yet
    pub fn merge(&mut self, other: &Terminology) {
        for term in &other.preserve_terms {
            self.add_preserve_term(term.clone());
        }
        for (index, term) in other.source_terms().iter().enumerate() {
            self.add_consistent_term(term.clone());
            for (language, forms) in &other.consistent_terms {
                if *language == other.source_language {
                    continue;
                }
                if let Some(form) = forms.get(index).filter(|f| !f.is_empty()) {
                    if self.target_form(term, language).is_none() {
                        self.set_target_form(term, language, form.clone());
                    }
                }
            }
        }
    }
}

fn position_ignore_case(list: &[String], term: &str) -> Option<usize> {
    let needle = term.to_lowercase();
    list.iter().position(|t| t.to_lowercase() == needle)
}

fn contains_ignore_case(list: &[String], term: &str) -> bool {
    position_ignore_case(list, term).is_some()
}

/// Dictionary block included in translation prompts, `None` when there is nothing to say
pub fn format_terminology_directive(terminology: &Terminology, target_language: &str) -> Option<String> {
    if terminology.is_empty() {
        return None;
    }

    let mut directive = String::from("Terminology rules:");
    if !terminology.preserve_terms.is_empty() {
        directive.push_str(&format!(
            "\n- Keep these terms exactly as written, do not translate them: {}",
            terminology.preserve_terms.join(", ")
        ));
    }

    let pairs = terminology.consistent_pairs(target_language);
    if !pairs.is_empty() {
        directive.push_str("\n- Translate these terms consistently:");
        for (term, form) in pairs {
            match form {
                Some(form) => directive.push_str(&format!("\n  - {} → {}", term, form)),
                None => directive.push_str(&format!("\n  - {} (use one translation everywhere)", term)),
            }
        }
    }
    Some(directive)
}
