//! Search Engine Integration
//!
//! Ties together query parsing, rule-based ranking and facet filtering to
//! narrow a list of records for one launcher query.

use super::fuzzy::FuzzyMatcher;
use super::parser::Facets;
use super::ranking::{MatchOn, MatchScore};
use std::cmp::Ordering;
use tracing::debug;

/// Search result with item and summed score
#[derive(Debug, Clone)]
pub struct SearchResult<T> {
    /// The matched item
    pub item: T,
    /// Sum of the per-word scores
    pub score: f64,
}

/// Records that expose a facet lookup by lower-cased key
pub trait Faceted {
    /// Facet value, or the empty string when the record has none
    fn facet(&self, key: &str) -> &str;
}

/// Identifier field matched by prefix when the query is a raw resource id
pub struct IdentifierKey<T> {
    /// Id convention, e.g. `i-` for EC2 instances
    pub prefix: &'static str,
    pub key: fn(&T) -> String,
}

/// Which record fields free-text terms are matched against
pub struct TermKeys<T> {
    /// Display name
    pub name: fn(&T) -> String,
    pub identifier: Option<IdentifierKey<T>>,
}

impl<T> TermKeys<T> {
    pub fn by_name(name: fn(&T) -> String) -> Self {
        Self {
            name,
            identifier: None,
        }
    }

    pub fn with_identifier(mut self, prefix: &'static str, key: fn(&T) -> String) -> Self {
        self.identifier = Some(IdentifierKey { prefix, key });
        self
    }
}

/// Search engine that combines matching and ranking
pub struct SearchEngine {
    fuzzy_matcher: FuzzyMatcher,
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchEngine {
    /// Create a new search engine with default configuration
    pub fn new() -> Self {
        Self {
            fuzzy_matcher: FuzzyMatcher::new(),
        }
    }

    /// Rank `items` against `query`.
    ///
    /// The query is lower-cased and split on whitespace; every word has to
    /// match the item key and the per-word scores are summed. Results are
    /// sorted by score, highest first, keeping input order for ties. An
    /// empty query returns every item in input order with a zero score.
    pub fn search<T, F>(
        &mut self,
        query: &str,
        items: Vec<T>,
        key: F,
        match_on: MatchOn,
    ) -> Vec<SearchResult<T>>
    where
        F: Fn(&T) -> String,
    {
        let query = query.trim();
        if query.is_empty() {
            return items
                .into_iter()
                .map(|item| SearchResult { item, score: 0.0 })
                .collect();
        }

        let query = query.to_lowercase();
        let words: Vec<&str> = query.split_whitespace().collect();

        let mut results = Vec::new();
        for item in items {
            let value = key(&item);
            let value = value.trim();
            if value.is_empty() {
                continue;
            }

            if let Some(score) = self.score_words(value, &words, match_on) {
                results.push(SearchResult { item, score });
            }
        }

        // sort_by is stable, so equal scores keep their listing order
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

        match results.first() {
            Some(best) => debug!(
                "{} results for {:?}, best score {:.2}",
                results.len(),
                query,
                best.score
            ),
            None => debug!("no results for {:?}", query),
        }
        results
    }

    /// Like [`search`](Self::search) but returns only the items
    pub fn filter<T, F>(&mut self, query: &str, items: Vec<T>, key: F, match_on: MatchOn) -> Vec<T>
    where
        F: Fn(&T) -> String,
    {
        self.search(query, items, key, match_on)
            .into_iter()
            .map(|r| r.item)
            .collect()
    }

    fn score_words(&mut self, value: &str, words: &[&str], match_on: MatchOn) -> Option<f64> {
        let mut total = 0.0;
        for word in words {
            let score = MatchScore::calculate(value, word, match_on, &mut self.fuzzy_matcher)?;
            total += score.score;
        }
        Some(total)
    }

    /// Narrow records by free-text terms.
    ///
    /// A single term that looks like a raw resource id is prefix-matched
    /// against the identifier field; otherwise all terms are joined with a
    /// space and matched against the display name.
    pub fn apply_terms<T>(
        &mut self,
        records: Vec<T>,
        terms: &[String],
        keys: &TermKeys<T>,
    ) -> Vec<T> {
        if terms.is_empty() {
            return records;
        }

        if let ([term], Some(identifier)) = (terms, &keys.identifier) {
            if term.starts_with(identifier.prefix) {
                return self.filter(term, records, identifier.key, MatchOn::STARTSWITH);
            }
        }

        self.filter(&terms.join(" "), records, keys.name, MatchOn::ALL)
    }

    /// Narrow records by each non-empty facet in turn (logical AND)
    pub fn apply_facets<T: Faceted>(&mut self, records: Vec<T>, facets: &Facets) -> Vec<T> {
        if facets.is_empty() {
            return records;
        }

        debug!("{} facets", facets.len());
        facets.active().fold(records, |matches, (key, value)| {
            self.filter(value, matches, |r| r.facet(key).to_string(), MatchOn::ALL)
        })
    }
}
