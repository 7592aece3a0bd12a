//! Symbol mining from advisory prose.
//!
//! Most advisories carry no machine-readable list of affected functions, so
//! candidate names are pulled out of the summary and details text. The
//! patterns favour precision: a missed symbol only costs a fall back to
//! package-wide matching, a noisy one produces false reachability.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::advisory::Advisory;

/// `name()` in running text.
static CALL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)\s*\(\)").expect("call pattern"));

/// `` `name` `` in markdown.
static BACKTICK_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"`([A-Za-z_][A-Za-z0-9_]*)`").expect("backtick pattern"));

/// `name function`
static FUNCTION_WORD_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b([A-Za-z_][A-Za-z0-9_]*)\b\s+function").expect("function word pattern")
});

/// `'name'` or `"name"`
static QUOTED_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"['"]([A-Za-z_][A-Za-z0-9_]*)['"]"#).expect("quoted pattern"));

const DOMAIN_MARKERS: &[&str] = &[
    "github.com",
    ".com",
    ".io",
    ".rs",
    ".md",
    ".png",
    ".aarch64",
    ".x86_64",
    "e.g",
];

const BLOCKED_KEYWORDS: &[&str] = &[
    ".com",
    ".org",
    ".rs",
    ".io",
    ".md",
    ".txt",
    ".png",
    ".html",
    ".exe",
    ".zip",
    ".cr",
    "http",
    "www.",
    "docs.",
    "lists.",
    "datatracker.",
    "main.ts",
    "go.mod",
    "core.rs",
    "faq.",
    "readme",
    "e.g",
    "i.e",
];

const STOPWORDS: &[&str] = &[
    "true",
    "false",
    "none",
    "object",
    "the",
    "previous",
    "vulnerable",
];

/// Every identifier-shaped candidate mentioned in `text` that survives the
/// noise filters.
pub fn extract_mentioned_symbols(text: &str) -> BTreeSet<String> {
    let mut candidates = BTreeSet::new();

    for pattern in [
        &*CALL_PATTERN,
        &*BACKTICK_PATTERN,
        &*FUNCTION_WORD_PATTERN,
        &*QUOTED_PATTERN,
    ] {
        for captures in pattern.captures_iter(text) {
            if let Some(symbol) = captures.get(1) {
                candidates.insert(symbol.as_str().to_string());
            }
        }
    }

    candidates.retain(|candidate| is_plausible_symbol(candidate));
    candidates
}

/// Candidate symbols from an advisory's prose, minus the package's own name.
pub fn extract_possible_symbols(package_name: &str, summary: &str, details: &str) -> Vec<String> {
    let text = format!("{} {}", summary, details);
    extract_mentioned_symbols(&text)
        .into_iter()
        .filter(|symbol| !is_package_name(symbol, package_name))
        .collect()
}

fn is_plausible_symbol(candidate: &str) -> bool {
    if DOMAIN_MARKERS.iter().any(|marker| candidate.contains(marker)) {
        return false;
    }

    let lower = candidate.to_lowercase();
    if BLOCKED_KEYWORDS.iter().any(|keyword| lower.contains(keyword)) {
        return false;
    }
    if STOPWORDS.contains(&lower.as_str()) {
        return false;
    }

    // snake_case slugs are almost always config keys or file names
    !(candidate.contains('_') && lower == candidate)
}

fn is_package_name(symbol: &str, package_name: &str) -> bool {
    if symbol.eq_ignore_ascii_case(package_name) {
        return true;
    }
    package_name
        .rsplit('/')
        .next()
        .is_some_and(|base| base != package_name && symbol.eq_ignore_ascii_case(base))
}

/// Where a symbol in a [`SymbolSet`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolProvenance {
    Structured,
    TextMined,
    Both,
}

impl SymbolProvenance {
    fn merge(self, other: SymbolProvenance) -> SymbolProvenance {
        if self == other {
            self
        } else {
            SymbolProvenance::Both
        }
    }
}

/// Case-folded union of structured and text-mined advisory symbols.
///
/// An empty set means "affected symbols unknown" and makes the matcher
/// treat the whole package as vulnerable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolSet {
    symbols: BTreeMap<String, SymbolProvenance>,
}

impl SymbolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the set for one advisory queried under `package_name`.
    pub fn for_advisory(advisory: &Advisory, package_name: &str) -> Self {
        let mined =
            extract_possible_symbols(package_name, &advisory.summary, &advisory.details);
        Self::from_sources(advisory.structured_symbols(), mined, package_name)
    }

    pub fn from_sources<S, M>(structured: S, mined: M, package_name: &str) -> Self
    where
        S: IntoIterator,
        S::Item: AsRef<str>,
        M: IntoIterator,
        M::Item: AsRef<str>,
    {
        let mut set = Self::new();

        for symbol in structured {
            let symbol = symbol.as_ref();
            set.insert(symbol, SymbolProvenance::Structured);
            // `Type.Method` symbols are called as `x.Method`
            if let Some((_, method)) = symbol.rsplit_once('.') {
                set.insert(method, SymbolProvenance::Structured);
            }
        }
        for symbol in mined {
            set.insert(symbol.as_ref(), SymbolProvenance::TextMined);
        }

        set.remove_package_name(package_name);
        set
    }

    pub fn insert(&mut self, symbol: &str, provenance: SymbolProvenance) {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return;
        }
        self.symbols
            .entry(symbol.to_lowercase())
            .and_modify(|existing| *existing = existing.merge(provenance))
            .or_insert(provenance);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(&name.to_lowercase())
    }

    pub fn provenance(&self, name: &str) -> Option<SymbolProvenance> {
        self.symbols.get(&name.to_lowercase()).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Symbols in case-folded, sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.symbols.keys().map(String::as_str)
    }

    fn remove_package_name(&mut self, package_name: &str) {
        self.symbols
            .retain(|symbol, _| !is_package_name(symbol, package_name));
    }
}

impl<S: AsRef<str>> FromIterator<S> for SymbolSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = SymbolSet::new();
        for symbol in iter {
            set.insert(symbol.as_ref(), SymbolProvenance::Structured);
        }
        set
    }
}
