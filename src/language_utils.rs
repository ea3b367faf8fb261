/*!
 * Language code handling.
 *
 * Accepts ISO 639-1 (`fr`), ISO 639-2/T (`fra`) and the ISO 639-2/B variants that
 * differ from 639-2/T (`fre`), optionally followed by a region or script subtag
 * (`zh-CN`, `pt_BR`, `zh-Hant`).
 */

use isolang::Language;

use crate::errors::{Error, Result};

/// ISO 639-2/B codes that differ from their 639-2/T form
const BIBLIOGRAPHIC_CODES: [(&str, &str); 18] = [
    ("fre", "fra"),
    ("ger", "deu"),
    ("dut", "nld"),
    ("gre", "ell"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("ice", "isl"),
    ("alb", "sqi"),
    ("arm", "hye"),
    ("baq", "eus"),
    ("bur", "mya"),
    ("per", "fas"),
    ("geo", "kat"),
    ("may", "msa"),
    ("mac", "mkd"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("wel", "cym"),
];

/// Split a code into its lowercase primary language and optional subtag
fn split_code(code: &str) -> (String, Option<&str>) {
    let code = code.trim();
    match code.split_once(['-', '_']) {
        Some((primary, subtag)) if !subtag.is_empty() => (primary.to_lowercase(), Some(subtag)),
        Some((primary, _)) => (primary.to_lowercase(), None),
        None => (code.to_lowercase(), None),
    }
}

/// Resolve a language code to its ISO language
pub fn resolve_language(code: &str) -> Result<Language> {
    let (primary, _) = split_code(code);
    let language = match primary.len() {
        2 => Language::from_639_1(&primary),
        3 => Language::from_639_3(&primary).or_else(|| {
            BIBLIOGRAPHIC_CODES
                .iter()
                .find(|(b, _)| *b == primary)
                .and_then(|(_, t)| Language::from_639_3(t))
        }),
        _ => None,
    };
    language.ok_or_else(|| {
        Error::validation(format!("Invalid language code: {}", code)).with_context("language", code)
    })
}

/// Validate a language code
pub fn validate_language_code(code: &str) -> Result<()> {
    resolve_language(code).map(|_| ())
}

/// English name of a language, with the subtag appended (`Chinese (CN)`)
pub fn get_language_name(code: &str) -> Result<String> {
    let language = resolve_language(code)?;
    let (_, subtag) = split_code(code);
    Ok(match subtag {
        Some(subtag) => format!("{} ({})", language.to_name(), subtag),
        None => language.to_name().to_string(),
    })
}

/// Language name for prompts, falling back to the raw code
pub fn display_name(code: &str) -> String {
    get_language_name(code).unwrap_or_else(|_| code.trim().to_string())
}

/// Whether two codes name the same language and subtag
pub fn language_codes_match(a: &str, b: &str) -> bool {
    match (resolve_language(a), resolve_language(b)) {
        (Ok(left), Ok(right)) => {
            let left_subtag = split_code(a).1.map(str::to_lowercase);
            let right_subtag = split_code(b).1.map(str::to_lowercase);
            left == right && left_subtag == right_subtag
        }
        _ => a.trim().eq_ignore_ascii_case(b.trim()),
    }
}
