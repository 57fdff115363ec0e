//! Fuzzy Matching Engine using nucleo-matcher
//!
//! Subsequence ("all characters") matching is delegated to the nucleo-matcher
//! crate; this module only adapts strings to and from its API.

use nucleo_matcher::{Config, Matcher, Utf32String};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Match result with score and position information
#[derive(Debug, Clone)]
pub struct FuzzyMatch {
    /// Raw nucleo score
    pub score: u16,
    /// Sorted char positions of matched characters in the haystack
    pub positions: Vec<u32>,
}

impl FuzzyMatch {
    /// First matched char position
    pub fn start(&self) -> u32 {
        self.positions.first().copied().unwrap_or(0)
    }

    /// Number of chars from the first to the last matched position, inclusive
    pub fn span(&self) -> u32 {
        match (self.positions.first(), self.positions.last()) {
            (Some(first), Some(last)) => last - first + 1,
            _ => 0,
        }
    }
}

/// Fuzzy matcher with configuration
pub struct FuzzyMatcher {
    matcher: Matcher,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl FuzzyMatcher {
    /// Create a new fuzzy matcher with default configuration
    pub fn new() -> Self {
        Self::with_config(Config::DEFAULT)
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            matcher: Matcher::new(config),
        }
    }

    /// Match every char of `needle`, in order, somewhere in `haystack`.
    ///
    /// Returns None when the needle is empty or not a subsequence.
    pub fn fuzzy_match(&mut self, haystack: &str, needle: &str) -> Option<FuzzyMatch> {
        if needle.is_empty() {
            return None;
        }

        let haystack_utf32 = Utf32String::from(normalize_for_matching(haystack).as_str());
        let needle_utf32 = Utf32String::from(normalize_for_matching(needle).as_str());

        let mut positions = Vec::new();
        let score = self.matcher.fuzzy_indices(
            haystack_utf32.slice(..),
            needle_utf32.slice(..),
            &mut positions,
        )?;

        positions.sort_unstable();
        positions.dedup();

        Some(FuzzyMatch { score, positions })
    }
}

/// Unicode NFC normalization
pub fn normalize_for_matching(text: &str) -> String {
    text.nfc().collect::<String>()
}

/// Strip combining marks so `café` compares equal to `cafe`
pub fn fold_diacritics(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .nfc()
        .collect::<String>()
}
