//! Query pipeline: tokenize, match terms, then narrow by facets

pub mod engine;
pub mod fuzzy;
pub mod parser;
pub mod ranking;

#[cfg(test)]
mod property_tests;

pub use engine::{Faceted, SearchEngine, TermKeys};
pub use parser::{ParsedQuery, QueryParser};
pub use ranking::MatchOn;
