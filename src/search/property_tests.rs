use proptest::prelude::*;
use super::engine::{Faceted, SearchEngine, TermKeys};
use super::parser::{Facets, QueryParser};

#[derive(Debug, Clone, PartialEq)]
struct Record {
    name: String,
    env: String,
}

impl Faceted for Record {
    fn facet(&self, key: &str) -> &str {
        match key {
            "name" => &self.name,
            "env" => &self.env,
            _ => "",
        }
    }
}

fn records() -> impl Strategy<Value = Vec<Record>> {
    proptest::collection::vec(
        ("[a-z0-9-]{0,12}", "[a-z]{0,6}").prop_map(|(name, env)| Record { name, env }),
        0..12,
    )
}

// Property test: tokenizing never panics and yields a single parse
proptest! {
    #[test]
    fn parse_is_total(query in any::<String>()) {
        let parsed = QueryParser::parse(&query);
        prop_assert_eq!(parsed.original, query);
    }
}

// Property test: parsing the same query twice gives the same result
proptest! {
    #[test]
    fn parse_is_deterministic(query in r#"[a-z :,"' \\]{0,40}"#) {
        prop_assert_eq!(QueryParser::parse(&query), QueryParser::parse(&query));
    }
}

// Property test: plain words without quotes or colons all become terms
proptest! {
    #[test]
    fn plain_words_become_terms(words in proptest::collection::vec("[a-z0-9]{1,8}", 0..6)) {
        let parsed = QueryParser::parse(&words.join(" "));
        prop_assert_eq!(parsed.terms, words);
        prop_assert!(parsed.facets.is_empty());
    }
}

// Property test: a single key:value atom always becomes one facet
proptest! {
    #[test]
    fn key_value_becomes_facet(key in "[A-Za-z]{1,8}", value in "[a-z0-9]{0,8}") {
        let parsed = QueryParser::parse(&format!("{}:{}", key, value));
        prop_assert!(parsed.terms.is_empty());
        prop_assert_eq!(parsed.facets.get(&key), Some(value.as_str()));
    }
}

// Property test: apostrophes inside words never hide a key:value atom
proptest! {
    #[test]
    fn apostrophe_words_keep_facets(
        before in proptest::collection::vec("[a-z][a-z']{0,7}", 0..4),
        after in proptest::collection::vec("[a-z][a-z']{0,7}", 0..4),
        key in "[a-z]{1,8}",
        value in "[a-z0-9]{1,8}",
    ) {
        let query = format!("{} {}:{} {}", before.join(" "), key, value, after.join(" "));
        let parsed = QueryParser::parse(&query);
        prop_assert_eq!(parsed.facets.get(&key), Some(value.as_str()));
        prop_assert!(parsed.malformed.is_empty());
        let words: Vec<String> = before.iter().chain(&after).cloned().collect();
        prop_assert_eq!(parsed.terms, words);
    }
}

// Property test: facets with only empty values never filter anything
proptest! {
    #[test]
    fn blank_facets_are_identity(
        input in records(),
        keys in proptest::collection::vec("[a-z]{1,6}", 0..4),
    ) {
        let facets: Facets = keys.iter().map(|k| (k.as_str(), "")).collect();
        let mut engine = SearchEngine::new();
        prop_assert_eq!(engine.apply_facets(input.clone(), &facets), input);
    }
}

// Property test: zero terms never filter anything
proptest! {
    #[test]
    fn zero_terms_are_identity(input in records()) {
        let mut engine = SearchEngine::new();
        let keys = TermKeys::by_name(|r: &Record| r.name.clone());
        prop_assert_eq!(engine.apply_terms(input.clone(), &[], &keys), input);
    }
}

// Property test: facet filtering only ever removes records
proptest! {
    #[test]
    fn facets_only_narrow(input in records(), value in "[a-z]{1,3}") {
        let facets: Facets = [("env", value.as_str())].into_iter().collect();
        let mut engine = SearchEngine::new();
        let out = engine.apply_facets(input.clone(), &facets);
        prop_assert!(out.len() <= input.len());
        for record in &out {
            prop_assert!(input.contains(record));
            prop_assert!(!record.env.is_empty());
        }
    }
}
