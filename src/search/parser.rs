//! Query Parser
//!
//! Splits a launcher query into free-text terms and `key:value` facet
//! filters. Quoted spans are kept together, so `name:"web server"` is one
//! facet and `"a:b"` is one term.
//!
//! Double quotes open a span anywhere. A single quote only opens a span at
//! the start of an atom or right after a colon, and only closes at the end
//! of a word, so apostrophes inside words (`o'brien`, `it's`) stay literal.

use tracing::debug;

/// Insertion-ordered facet mapping with case-insensitive keys.
///
/// Keys are stored lower-cased. Inserting an existing key replaces its value
/// but keeps its original position, which is the order facet filters run in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Facets {
    entries: Vec<(String, String)>,
}

impl Facets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        let key = key.as_ref().to_lowercase();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Facets that actually narrow results (non-empty values only)
    pub fn active(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter(|(_, v)| !v.is_empty())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
impl Facets {
    pub fn get(&self, key: &str) -> Option<&str> {
        let key = key.to_lowercase();
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Facets {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut facets = Facets::new();
        for (k, v) in iter {
            facets.insert(k, v);
        }
        facets
    }
}

/// Parsed search query
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuery {
    /// Original unmodified query
    pub original: String,
    /// Free-text terms in query order, unquoted
    pub terms: Vec<String>,
    /// `key:value` filters
    pub facets: Facets,
    /// Atoms with more than one unquoted colon
    pub malformed: Vec<String>,
}

impl ParsedQuery {
    pub fn is_malformed(&self) -> bool {
        !self.malformed.is_empty()
    }
}

/// How a single atom was classified
#[derive(Debug, Clone, PartialEq, Eq)]
enum Atom<'a> {
    Term(&'a str),
    Facet { key: &'a str, value: &'a str },
    Malformed(&'a str),
}

/// Query tokenizer
pub struct QueryParser;

impl QueryParser {
    /// Parse a query into terms and facets. Never fails: atoms that cannot
    /// be classified are reported in `malformed`.
    pub fn parse(query: &str) -> ParsedQuery {
        let mut terms = Vec::new();
        let mut facets = Facets::new();
        let mut malformed = Vec::new();

        for atom in Self::atoms(query) {
            match Self::classify(atom) {
                Atom::Term(term) => {
                    // a bare `""` carries nothing but its delimiters
                    let term = unquote(term, &['"']);
                    if !term.is_empty() {
                        terms.push(term);
                    }
                }
                Atom::Facet { key, value } => facets.insert(key, unquote(value, &['"', '\''])),
                Atom::Malformed(raw) => malformed.push(raw.to_string()),
            }
        }

        debug!("parsed query {:?}", query);
        debug!("terms: {:?}", terms);
        debug!("facets: {:?}", facets);

        ParsedQuery {
            original: query.to_string(),
            terms,
            facets,
            malformed,
        }
    }

    /// Split the query into atoms, discarding whitespace and commas
    fn atoms(query: &str) -> Vec<&str> {
        let mut atoms = Vec::new();
        let mut start: Option<usize> = None;
        let mut boundary = true;
        let mut i = 0;

        while let Some(c) = query[i..].chars().next() {
            if start.is_none() {
                if is_separator(c) {
                    i += c.len_utf8();
                    continue;
                }
                start = Some(i);
                boundary = true;
            }

            if let Some(end) = quoted_span_end(query, i, boundary) {
                i = end;
                boundary = false;
            } else if is_separator(c) {
                atoms.extend(start.take().map(|s| &query[s..i]));
                i += c.len_utf8();
            } else {
                boundary = c == ':';
                i += c.len_utf8();
            }
        }
        atoms.extend(start.map(|s| &query[s..]));
        atoms
    }

    fn classify(atom: &str) -> Atom<'_> {
        let colons = unquoted_colons(atom);
        match colons.as_slice() {
            [] => Atom::Term(atom),
            [pos] => Atom::Facet {
                key: &atom[..*pos],
                value: &atom[pos + 1..],
            },
            _ => Atom::Malformed(atom),
        }
    }
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || c == ','
}

/// If a quoted span opens at byte `i` of `text`, the byte offset just past its
/// closing quote. `boundary` says whether `i` is at the start of an atom or
/// right after a colon, the only places a single quote may open a span.
fn quoted_span_end(text: &str, i: usize, boundary: bool) -> Option<usize> {
    let quote = text[i..].chars().next()?;
    let word_end = match quote {
        '"' => false,
        '\'' if boundary => true,
        _ => return None,
    };

    let body = i + 1;
    let mut escaped = false;
    for (offset, c) in text[body..].char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            let after = body + offset + 1;
            let closes = !word_end || text[after..].chars().next().map_or(true, is_separator);
            if closes {
                return Some(after);
            }
        }
    }
    None
}

/// Byte offsets of every colon that is not inside a quoted span
fn unquoted_colons(atom: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut boundary = true;
    let mut i = 0;

    while let Some(c) = atom[i..].chars().next() {
        if let Some(end) = quoted_span_end(atom, i, boundary) {
            i = end;
            boundary = false;
            continue;
        }
        if c == ':' {
            positions.push(i);
        }
        boundary = c == ':';
        i += c.len_utf8();
    }

    positions
}

/// Remove surrounding quotes. A fully quoted span also has its escapes
/// resolved; anything else just loses leading and trailing `stray` quotes.
fn unquote(text: &str, stray: &[char]) -> String {
    match quoted_span_end(text, 0, true) {
        Some(end) if end == text.len() => unescape(&text[1..end - 1]),
        _ => text.trim_matches(stray).to_string(),
    }
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) => out.push(next),
                None => out.push(c),
            }
        } else {
            out.push(c);
        }
    }
    out
}
