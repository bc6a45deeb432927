// src/scorer/overrides.rs

//! Override-term registry
//!
//! Override terms are vocabulary that legitimately appears in only some
//! variations: acronyms, product codes, registered domain terms. They are
//! exempt from spelling-consistency penalties and always count as
//! consistent tokens.
//!
//! Two built-in shapes match without registration:
//! - acronyms: two or more consecutive uppercase letters ("ELA", "OCR")
//! - alphanumeric codes: tokens mixing letters and digits ("A4", "ISO9001")

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static ACRONYM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z]{2,}$").expect("valid regex"));

/// Case-insensitive exact terms plus the built-in acronym/code patterns
#[derive(Debug, Clone, Default)]
pub struct OverrideTerms {
    terms: BTreeSet<String>,
}

impl OverrideTerms {
    /// Empty registry; the built-in patterns still apply
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from an iterator of terms
    pub fn with_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = Self::new();
        for term in terms {
            registry.register(term.as_ref());
        }
        registry
    }

    /// Register a term; matching is case-insensitive
    pub fn register(&mut self, term: &str) {
        let term = term.trim();
        if !term.is_empty() {
            self.terms.insert(term.to_lowercase());
        }
    }

    /// Remove a registered term
    pub fn unregister(&mut self, term: &str) -> bool {
        self.terms.remove(&term.trim().to_lowercase())
    }

    /// Registered terms, lowercased
    pub fn terms(&self) -> &BTreeSet<String> {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Check a token against registered terms and built-in patterns.
    ///
    /// `raw` is the token as it appeared in the text (casing intact);
    /// `lower` is its lowercased form used for exact-term lookup.
    pub fn matches(&self, raw: &str, lower: &str) -> bool {
        self.terms.contains(lower) || ACRONYM.is_match(raw) || is_alphanumeric_code(raw)
    }
}

/// Token shapes like "A4", "ISO9001", "B-52": ASCII letters and digits
/// (hyphens allowed) with at least one of each.
fn is_alphanumeric_code(token: &str) -> bool {
    token.len() >= 2
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
        && token.chars().any(|c| c.is_ascii_alphabetic())
        && token.chars().any(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_term_matches_case_insensitively() {
        let terms = OverrideTerms::with_terms(["Tesseract"]);
        assert!(terms.matches("tesseract", "tesseract"));
        assert!(terms.matches("TESSERACT", "tesseract"));
        assert!(!terms.matches("tessera", "tessera"));
    }

    #[test]
    fn test_acronym_pattern() {
        let terms = OverrideTerms::new();
        assert!(terms.matches("ELA", "ela"));
        assert!(terms.matches("OCR", "ocr"));
        // Single capital or mixed case is not an acronym
        assert!(!terms.matches("A", "a"));
        assert!(!terms.matches("Ela", "ela"));
        assert!(!terms.matches("ela", "ela"));
    }

    #[test]
    fn test_alphanumeric_code_pattern() {
        let terms = OverrideTerms::new();
        assert!(terms.matches("A4", "a4"));
        assert!(terms.matches("ISO9001", "iso9001"));
        assert!(terms.matches("B-52", "b-52"));
        // Digits alone or letters alone are not codes
        assert!(!terms.matches("1234", "1234"));
        assert!(!terms.matches("word", "word"));
    }

    #[test]
    fn test_unregister() {
        let mut terms = OverrideTerms::with_terms(["alpha", "beta"]);
        assert!(terms.unregister("Alpha"));
        assert!(!terms.matches("alpha", "alpha"));
        assert!(terms.matches("beta", "beta"));
        assert_eq!(terms.len(), 1);
    }

    #[test]
    fn test_blank_terms_ignored() {
        let terms = OverrideTerms::with_terms(["  ", ""]);
        assert!(terms.is_empty());
    }
}
