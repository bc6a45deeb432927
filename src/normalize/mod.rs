// src/normalize/mod.rs

//! Text normalization applied before consistency scoring
//!
//! Different producers disagree on whitespace, fancy punctuation, and
//! end-of-line hyphenation long before they disagree on actual content.
//! Normalizing variations first keeps the similarity metrics focused on
//! real differences.
//!
//! The scorer only depends on the [`Normalizer`] trait; [`TextNormalizer`]
//! is the stock implementation. Embedders with their own text pipeline can
//! plug in a custom normalizer.

use serde::{Deserialize, Serialize};

/// Options controlling normalization behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizeOptions {
    /// Collapse runs of spaces and tabs into a single space
    pub collapse_whitespace: bool,

    /// Keep single line breaks as `\n` instead of folding them to spaces
    pub preserve_line_breaks: bool,

    /// Keep paragraph breaks (blank lines) as `\n\n`
    pub preserve_paragraph_breaks: bool,

    /// Join words hyphenated across line ends ("exam-\nple" -> "example")
    pub join_hyphenated_words: bool,

    /// Minimum confidence required before a hyphenated pair is joined.
    /// A lowercase continuation scores 1.0, anything else 0.5.
    pub hyphen_join_confidence: f64,

    /// Fold curly quotes, long dashes, ellipses, and exotic spaces to ASCII
    pub normalize_fancy_characters: bool,

    /// Lowercase the result
    pub lowercase: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            collapse_whitespace: true,
            preserve_line_breaks: false,
            preserve_paragraph_breaks: true,
            join_hyphenated_words: true,
            hyphen_join_confidence: 0.7,
            normalize_fancy_characters: true,
            lowercase: false,
        }
    }
}

/// Seam for text normalization
pub trait Normalizer: Send + Sync {
    fn normalize(&self, text: &str, options: &NormalizeOptions) -> String;
}

/// Stock normalizer covering whitespace, fancy characters, and hyphen joins
#[derive(Debug, Clone, Copy, Default)]
pub struct TextNormalizer;

impl Normalizer for TextNormalizer {
    fn normalize(&self, text: &str, options: &NormalizeOptions) -> String {
        let mut text = if options.normalize_fancy_characters {
            fold_fancy_characters(text)
        } else {
            text.to_string()
        };

        if options.join_hyphenated_words {
            text = join_hyphenated(&text, options.hyphen_join_confidence);
        }

        if options.collapse_whitespace {
            text = collapse_whitespace(
                &text,
                options.preserve_line_breaks,
                options.preserve_paragraph_breaks,
            );
        }

        if options.lowercase {
            text = text.to_lowercase();
        }

        text
    }
}

/// Map common typographic characters to their ASCII equivalents
fn fold_fancy_characters(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{2032}' => out.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' => out.push('"'),
            '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}' => {
                out.push('-')
            }
            '\u{2026}' => out.push_str("..."),
            '\u{00A0}' | '\u{2000}'..='\u{200A}' | '\u{202F}' | '\u{205F}' | '\u{3000}' => {
                out.push(' ')
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Join hyphenated line-end breaks when the continuation looks like the
/// rest of a word.
fn join_hyphenated(text: &str, confidence_threshold: f64) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        if ch == '-' && i > 0 && chars[i - 1].is_alphabetic() {
            // Look past the hyphen for "\n" + continuation
            let mut j = i + 1;
            while j < chars.len() && (chars[j] == ' ' || chars[j] == '\t') {
                j += 1;
            }
            if j < chars.len() && chars[j] == '\n' {
                let mut k = j + 1;
                while k < chars.len() && chars[k].is_whitespace() {
                    k += 1;
                }
                if k < chars.len() && chars[k].is_alphabetic() {
                    let confidence = if chars[k].is_lowercase() { 1.0 } else { 0.5 };
                    if confidence >= confidence_threshold {
                        i = k;
                        continue;
                    }
                }
            }
        }
        out.push(ch);
        i += 1;
    }
    out
}

fn collapse_whitespace(text: &str, keep_lines: bool, keep_paragraphs: bool) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if !ch.is_whitespace() {
            out.push(ch);
            continue;
        }
        // Consume the whole whitespace run, counting newlines
        let mut newlines = usize::from(ch == '\n');
        while let Some(&next) = chars.peek() {
            if !next.is_whitespace() {
                break;
            }
            newlines += usize::from(next == '\n');
            chars.next();
        }
        if newlines >= 2 && keep_paragraphs {
            out.push_str("\n\n");
        } else if newlines >= 1 && keep_lines {
            out.push('\n');
        } else {
            out.push(' ');
        }
    }
    out.trim().to_string()
}
