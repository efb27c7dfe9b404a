//! Prefix predictions served from the last resolved suggestions.
//!
//! The predictor never queries the package index. It reads the cache the
//! resolver fills and clears it once the user accepts a command line.

use crate::resolver::SuggestionCache;
use std::sync::Arc;

pub struct Predictor {
    cache: Arc<SuggestionCache>,
}

impl Predictor {
    pub fn new(cache: Arc<SuggestionCache>) -> Self {
        Self { cache }
    }

    /// Cached suggestions starting with `input`, ignoring case, in cache order.
    pub fn predict(&self, input: &str) -> Vec<String> {
        self.cache
            .snapshot()
            .into_iter()
            .filter(|candidate| starts_with_ignore_case(candidate, input))
            .collect()
    }

    pub fn on_accepted(&self) {
        self.cache.clear();
    }
}

/// Case-insensitive `starts_with` that folds per character, so prefixes
/// whose lowercase form has a different byte length still compare correctly.
pub fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    let mut text_chars = text.chars().flat_map(char::to_lowercase);
    prefix
        .chars()
        .flat_map(char::to_lowercase)
        .all(|expected| text_chars.next() == Some(expected))
}
