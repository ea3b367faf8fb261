/*!
 * Format preservation checks for translated text.
 *
 * Protected tokens are pulled out of a text by four independent rules:
 * - placeholders (`{x}`, `{{x}}`, `%s`, `%d`, `%(name)s`)
 * - markup tags (`<b>`, `</a>`, `<br/>`)
 * - absolute URLs (`http://`, `https://`)
 * - markdown spans (`**bold**`, `*italic*`, `__bold__`, `_italic_`, `[text](url)`)
 *
 * A translation preserves formatting when, for every `(class, value)` group, it
 * contains at least as many occurrences as the original.
 */

use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::{Error, Result};

static PLACEHOLDER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{[^{}]*\}\}|\{[^{}\s]+\}|%\([A-Za-z_][A-Za-z0-9_]*\)[sd]|%[sd]")
        .expect("Invalid placeholder regex")
});

static MARKUP_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</?[A-Za-z][^<>]*>").expect("Invalid markup regex"));

static URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https?://[^\s<>()"']*[^\s<>()"'.,;:!?]"#).expect("Invalid URL regex")
});

static MARKDOWN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\*\*[^*\n]+\*\*|__[^_\n]+__|\[[^\]\n]+\]\([^)\s]+\)|\*[^*\s][^*\n]*\*|\b_[^_\s][^_\n]*_\b",
    )
    .expect("Invalid markdown regex")
});

/// Class of a protected token
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FormatClass {
    Placeholder,
    Markup,
    Url,
    Markdown,
}

impl FormatClass {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Placeholder => "placeholder",
            Self::Markup => "markup tag",
            Self::Url => "URL",
            Self::Markdown => "markdown span",
        }
    }

    fn heading(&self) -> &'static str {
        match self {
            Self::Placeholder => "Placeholders",
            Self::Markup => "Markup tags",
            Self::Url => "URLs",
            Self::Markdown => "Markdown formatting",
        }
    }

    fn regex(&self) -> &'static Regex {
        match self {
            Self::Placeholder => &PLACEHOLDER_REGEX,
            Self::Markup => &MARKUP_REGEX,
            Self::Url => &URL_REGEX,
            Self::Markdown => &MARKDOWN_REGEX,
        }
    }

    const ALL: [FormatClass; 4] = [Self::Placeholder, Self::Markup, Self::Url, Self::Markdown];
}

impl fmt::Display for FormatClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A protected token found in a text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatElement {
    pub class: FormatClass,
    pub value: String,
    /// Byte offset in the text it was extracted from
    pub position: usize,
}

/// Count difference for one `(class, value)` group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatShortfall {
    pub class: FormatClass,
    pub value: String,
    pub expected: usize,
    pub found: usize,
}

/// Detailed comparison of an original text and its translation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatReport {
    pub is_valid: bool,
    /// Groups with fewer occurrences in the translation
    pub missing: Vec<FormatShortfall>,
    /// Groups with more occurrences in the translation (tolerated)
    pub extra: Vec<FormatShortfall>,
    pub messages: Vec<String>,
}

/// Extract every protected token, ordered by position
pub fn extract(text: &str) -> Vec<FormatElement> {
    let mut elements: Vec<FormatElement> = FormatClass::ALL
        .iter()
        .flat_map(|class| {
            class.regex().find_iter(text).map(move |m| FormatElement {
                class: *class,
                value: m.as_str().to_string(),
                position: m.start(),
            })
        })
        .collect();
    elements.sort_by_key(|e| (e.position, e.class));
    elements
}

fn count_groups(text: &str) -> BTreeMap<(FormatClass, String), usize> {
    let mut counts = BTreeMap::new();
    for element in extract(text) {
        *counts.entry((element.class, element.value)).or_insert(0) += 1;
    }
    counts
}

/// Compare the protected tokens of an original text and its translation
pub fn validation_report(original: &str, translated: &str) -> FormatReport {
    let expected = count_groups(original);
    let found = count_groups(translated);

    let mut report = FormatReport::default();
    for ((class, value), &expected_count) in &expected {
        let found_count = found.get(&(*class, value.clone())).copied().unwrap_or(0);
        if found_count < expected_count {
            report.messages.push(format!(
                "Missing {} {} '{}' (expected {}, found {})",
                expected_count - found_count,
                class,
                value,
                expected_count,
                found_count
            ));
            report.missing.push(FormatShortfall {
                class: *class,
                value: value.clone(),
                expected: expected_count,
                found: found_count,
            });
        }
    }

    for ((class, value), &found_count) in &found {
        let expected_count = expected.get(&(*class, value.clone())).copied().unwrap_or(0);
        if found_count > expected_count {
            report.extra.push(FormatShortfall {
                class: *class,
                value: value.clone(),
                expected: expected_count,
                found: found_count,
            });
        }
    }

    report.is_valid = report.missing.is_empty();
    report
}

/// Fail with a format error when the translation lost a protected token
pub fn validate(original: &str, translated: &str) -> Result<()> {
    let report = validation_report(original, translated);
    if report.is_valid {
        return Ok(());
    }
    Err(Error::format(report.messages.join("; ")).with_context("missing", report.missing.len()))
}

/// Instruction text listing the tokens a translation must keep, empty when there are none
pub fn build_format_instructions(text: &str) -> String {
    let elements = extract(text);
    if elements.is_empty() {
        return String::new();
    }

    let mut grouped: BTreeMap<FormatClass, Vec<String>> = BTreeMap::new();
    for element in elements {
        let values = grouped.entry(element.class).or_default();
        if !values.contains(&element.value) {
            values.push(element.value);
        }
    }

    let mut instructions = String::from("Keep these elements exactly as written:");
    for (class, values) in grouped {
        instructions.push_str(&format!("\n- {}: {}", class.heading(), values.join(", ")));
    }
    instructions
}
