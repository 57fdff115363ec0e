//! Ranking & Scoring System
//!
//! Scores one query word against one item key. Rules are tried from most to
//! least specific and the first rule that matches decides the score, so a
//! prefix match always outranks a scattered subsequence match.

use super::fuzzy::{fold_diacritics, FuzzyMatcher};
use std::ops::{BitOr, BitXor};

/// Set of match rules a filter is allowed to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOn(u8);

impl MatchOn {
    /// Key starts with the query
    pub const STARTSWITH: Self = Self(1);
    /// Query is a prefix of the key's capital letters and digits
    pub const CAPITALS: Self = Self(1 << 1);
    /// Query equals a whole word of the key
    pub const ATOM: Self = Self(1 << 2);
    /// Query is a prefix of the key's word initials
    pub const INITIALS_STARTSWITH: Self = Self(1 << 3);
    /// Query appears anywhere in the key's word initials
    pub const INITIALS_CONTAIN: Self = Self(1 << 4);
    /// Query appears anywhere in the key
    pub const SUBSTRING: Self = Self(1 << 5);
    /// Every query char appears in the key, in order
    pub const ALLCHARS: Self = Self(1 << 6);

    pub const ALL: Self = Self(0x7f);

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for MatchOn {
    fn default() -> Self {
        Self::ALL
    }
}

impl BitOr for MatchOn {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitXor for MatchOn {
    type Output = Self;

    fn bitxor(self, rhs: Self) -> Self {
        Self(self.0 ^ rhs.0)
    }
}

/// The rule that produced a score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    StartsWith,
    Capitals,
    Atom,
    InitialsStartsWith,
    InitialsContain,
    Substring,
    AllChars,
}

/// Score of a single word against a single key
#[derive(Debug, Clone, PartialEq)]
pub struct MatchScore {
    pub score: f64,
    pub rule: MatchRule,
}

impl MatchScore {
    fn new(rule: MatchRule, base: f64, haystack_len: usize, needle_len: usize) -> Self {
        Self {
            score: base - haystack_len as f64 / needle_len as f64,
            rule,
        }
    }

    /// Score `word` (already lower-cased, non-empty) against `value`.
    pub fn calculate(
        value: &str,
        word: &str,
        match_on: MatchOn,
        matcher: &mut FuzzyMatcher,
    ) -> Option<Self> {
        let folded;
        let value = if word.is_ascii() {
            folded = fold_diacritics(value);
            folded.as_str()
        } else {
            value
        };
        let lower = value.to_lowercase();
        let needle_len = word.chars().count();
        let value_len = lower.chars().count();

        // every char of the word must occur somewhere in the value
        if !word.chars().all(|c| lower.contains(c)) {
            return None;
        }

        if match_on.contains(MatchOn::STARTSWITH) && lower.starts_with(word) {
            return Some(Self::new(MatchRule::StartsWith, 100.0, value_len, needle_len));
        }

        if match_on.contains(MatchOn::CAPITALS) {
            let capitals: String = value
                .chars()
                .filter(|c| c.is_uppercase() || c.is_ascii_digit())
                .collect::<String>()
                .to_lowercase();
            if !capitals.is_empty() && capitals.starts_with(word) {
                let len = capitals.chars().count();
                return Some(Self::new(MatchRule::Capitals, 100.0, len, needle_len));
            }
        }

        let atoms = split_atoms(&lower);
        let initials: String = atoms.iter().filter_map(|a| a.chars().next()).collect();
        let initials_len = initials.chars().count();

        if match_on.contains(MatchOn::ATOM) && atoms.contains(&word) {
            return Some(Self::new(MatchRule::Atom, 100.0, value_len, needle_len));
        }

        if match_on.contains(MatchOn::INITIALS_STARTSWITH) && initials.starts_with(word) {
            return Some(Self::new(
                MatchRule::InitialsStartsWith,
                100.0,
                initials_len,
                needle_len,
            ));
        }

        if match_on.contains(MatchOn::INITIALS_CONTAIN) && initials.contains(word) {
            return Some(Self::new(
                MatchRule::InitialsContain,
                95.0,
                initials_len,
                needle_len,
            ));
        }

        if match_on.contains(MatchOn::SUBSTRING) && lower.contains(word) {
            return Some(Self::new(MatchRule::Substring, 90.0, value_len, needle_len));
        }

        if match_on.contains(MatchOn::ALLCHARS) {
            let fuzzy = matcher.fuzzy_match(&lower, word)?;
            let score =
                100.0 / ((1.0 + fuzzy.start() as f64) * (fuzzy.span() as f64 + 1.0));
            return Some(Self {
                score,
                rule: MatchRule::AllChars,
            });
        }

        None
    }
}

/// Words of a key, split on anything that is not alphanumeric
fn split_atoms(value: &str) -> Vec<&str> {
    value
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(value: &str, word: &str) -> Option<MatchScore> {
        MatchScore::calculate(value, word, MatchOn::ALL, &mut FuzzyMatcher::new())
    }

    #[test]
    fn test_match_on_contains() {
        assert!(MatchOn::ALL.contains(MatchOn::SUBSTRING));
        assert!((MatchOn::INITIALS_STARTSWITH | MatchOn::INITIALS_CONTAIN)
            .contains(MatchOn::INITIALS_CONTAIN));
        assert!(!MatchOn::STARTSWITH.contains(MatchOn::SUBSTRING));
        let no_fuzzy = MatchOn::ALL ^ MatchOn::ALLCHARS;
        assert!(!no_fuzzy.contains(MatchOn::ALLCHARS));
        assert!(no_fuzzy.contains(MatchOn::STARTSWITH | MatchOn::ATOM));
    }

    #[test]
    fn test_startswith() {
        let m = score("web-server", "web").unwrap();
        assert_eq!(m.rule, MatchRule::StartsWith);
    }

    #[test]
    fn test_capitals() {
        let m = score("OmniFocus", "of").unwrap();
        assert_eq!(m.rule, MatchRule::Capitals);
    }

    #[test]
    fn test_atom() {
        let m = score("prod-api-gateway", "api").unwrap();
        assert_eq!(m.rule, MatchRule::Atom);
    }

    #[test]
    fn test_initials() {
        let m = score("prod api gateway", "pag").unwrap();
        assert_eq!(m.rule, MatchRule::InitialsStartsWith);
        let m = score("prod api gateway", "ag").unwrap();
        assert_eq!(m.rule, MatchRule::InitialsContain);
    }

    #[test]
    fn test_substring() {
        let m = score("production", "duct").unwrap();
        assert_eq!(m.rule, MatchRule::Substring);
    }

    #[test]
    fn test_allchars() {
        let m = score("production", "pdn").unwrap();
        assert_eq!(m.rule, MatchRule::AllChars);
        assert!(m.score > 0.0);
    }

    #[test]
    fn test_no_match() {
        assert!(score("production", "xyz").is_none());
    }

    #[test]
    fn test_restricted_rules() {
        let mut matcher = FuzzyMatcher::new();
        let m = MatchScore::calculate("i-0abc123", "i-0a", MatchOn::STARTSWITH, &mut matcher);
        assert_eq!(m.unwrap().rule, MatchRule::StartsWith);
        let m = MatchScore::calculate("i-0abc123", "abc", MatchOn::STARTSWITH, &mut matcher);
        assert!(m.is_none());
    }

    #[test]
    fn test_startswith_outranks_substring() {
        let prefix = score("api-gateway", "api").unwrap();
        let inner = score("legacyapi", "api").unwrap();
        assert!(prefix.score > inner.score);
    }

    #[test]
    fn test_shorter_key_ranks_higher() {
        let short = score("web", "web").unwrap();
        let long = score("web-frontend-canary", "web").unwrap();
        assert!(short.score > long.score);
    }

    #[test]
    fn test_diacritics_folded_for_ascii_query() {
        let m = score("Café", "cafe").unwrap();
        assert_eq!(m.rule, MatchRule::StartsWith);
    }
}
