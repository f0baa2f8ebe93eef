//! Automatic token normalizers applied when witnesses are registered

use crate::CollationError;

/// Maps a word's text to the form used for comparison.
pub trait Normalizer: Send + Sync {
    fn name(&self) -> &'static str;
    fn normalize(&self, text: &str) -> String;
}

pub struct ToLowerCase;

impl Normalizer for ToLowerCase {
    fn name(&self) -> &'static str {
        "toLowerCase"
    }

    fn normalize(&self, text: &str) -> String {
        text.to_lowercase()
    }
}

/// Removes the Arabic tatweel (kashida) used for justification.
pub struct RemoveTatwil;

impl Normalizer for RemoveTatwil {
    fn name(&self) -> &'static str {
        "removeTatwil"
    }

    fn normalize(&self, text: &str) -> String {
        text.chars().filter(|&c| c != '\u{0640}').collect()
    }
}

/// Drops isolated hamza so that spellings with and without it compare equal.
pub struct IgnoreIsolatedHamza;

impl Normalizer for IgnoreIsolatedHamza {
    fn name(&self) -> &'static str {
        "ignoreIsolatedHamza"
    }

    fn normalize(&self, text: &str) -> String {
        let stripped: String = text.chars().filter(|&c| c != '\u{0621}').collect();
        if stripped.is_empty() {
            // A lone hamza is still a reading.
            text.to_string()
        } else {
            stripped
        }
    }
}

pub const NORMALIZER_NAMES: &[&str] = &["toLowerCase", "removeTatwil", "ignoreIsolatedHamza"];

/// Resolve a normalizer by its name.
pub fn normalizer_by_name(name: &str) -> crate::Result<Box<dyn Normalizer>> {
    match name {
        "toLowerCase" => Ok(Box::new(ToLowerCase)),
        "removeTatwil" => Ok(Box::new(RemoveTatwil)),
        "ignoreIsolatedHamza" => Ok(Box::new(IgnoreIsolatedHamza)),
        _ => Err(CollationError::UnknownNormalizer(name.to_string())),
    }
}

/// Names of the normalizers applied by default for a language.
pub fn standard_normalizer_names(lang: &str) -> &'static [&'static str] {
    match lang {
        "la" => &["toLowerCase"],
        "ar" => &["removeTatwil", "ignoreIsolatedHamza"],
        _ => &[],
    }
}

/// Build the normalizer chain for `names`, or the standard set for `lang`
/// when `names` is empty.
pub fn resolve_normalizers(lang: &str, names: &[String]) -> crate::Result<Vec<Box<dyn Normalizer>>> {
    if names.is_empty() {
        return standard_normalizer_names(lang)
            .iter()
            .map(|name| normalizer_by_name(name))
            .collect();
    }
    names.iter().map(|name| normalizer_by_name(name)).collect()
}

/// Run every normalizer in order.
pub fn apply_all(normalizers: &[Box<dyn Normalizer>], text: &str) -> String {
    normalizers
        .iter()
        .fold(text.to_string(), |acc, n| n.normalize(&acc))
}
