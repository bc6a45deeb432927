// src/scorer/mod.rs

//! Per-block consistency scoring
//!
//! Given every producer's text for one logical block, the scorer picks a
//! reference variation by majority vote and measures how far the others
//! stray from it along three dimensions:
//!
//! - **character_score**: pooled greedy character alignment against the
//!   reference across all variations
//! - **word_score**: fraction of distinct tokens that a majority of
//!   variations agree on
//! - **spelling_score**: token agreement penalized for near-miss spelling
//!   variants, with override terms exempted
//!
//! Override terms cover domain vocabulary (acronyms, product codes) that a
//! frequency-based penalty would unfairly punish.

mod overrides;

pub use overrides::OverrideTerms;

use crate::error::Result;
use crate::metrics;
use crate::normalize::{NormalizeOptions, Normalizer, TextNormalizer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::Regex;

/// Word tokenizer shared by the word and spelling passes
static TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\w']+").expect("valid regex"));

/// Minimum share of variations that must contain a token for it to count
/// as consistent
const CONSISTENT_TOKEN_RATIO: f64 = 0.5;

/// Spelling-variant detection thresholds
const VARIANT_MAX_LEN_DELTA: usize = 2;
const VARIANT_MIN_EDIT_SIMILARITY: f64 = 0.8;
const VARIANT_PENALTY: f64 = 0.1;

/// Consistency scores for one block, computed fresh on every evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyResult {
    /// Pooled character-alignment consistency against the reference
    pub character_score: f64,

    /// Fraction of distinct tokens agreed on by a majority of variations
    pub word_score: f64,

    /// Token agreement after spelling-variant penalties
    pub spelling_score: f64,

    /// Characters matched across all variations (alignment pass)
    pub matched_chars: usize,

    /// Characters compared across all variations (alignment pass)
    pub total_chars: usize,

    /// Number of input variations
    pub variation_count: usize,

    /// Distinct tokens seen across all variations
    pub distinct_tokens: usize,

    /// Distinct tokens that counted as consistent
    pub consistent_tokens: usize,

    /// The normalized reference variation scores were measured against
    pub reference: String,

    /// Override terms that appeared in this block (lowercased)
    pub override_terms_used: BTreeSet<String>,

    /// Per-method diagnostic scores against the reference (mean across
    /// variations): alignment, lcs, edit, ngram, blend
    pub method_scores: BTreeMap<String, f64>,
}

impl ConsistencyResult {
    /// A perfect result, used for empty, singleton, and unanimous blocks
    fn perfect(reference: String, char_count: usize, variation_count: usize) -> Self {
        Self {
            character_score: 1.0,
            word_score: 1.0,
            spelling_score: 1.0,
            matched_chars: char_count,
            total_chars: char_count,
            variation_count,
            distinct_tokens: 0,
            consistent_tokens: 0,
            reference,
            override_terms_used: BTreeSet::new(),
            method_scores: perfect_method_scores(),
        }
    }
}

fn perfect_method_scores() -> BTreeMap<String, f64> {
    ["alignment", "lcs", "edit", "ngram", "blend"]
        .into_iter()
        .map(|name| (name.to_string(), 1.0))
        .collect()
}

/// Scores blocks of text variations for cross-producer consistency
pub struct ConsistencyScorer {
    normalizer: Box<dyn Normalizer>,
    options: NormalizeOptions,
    overrides: OverrideTerms,
}

impl Default for ConsistencyScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsistencyScorer {
    /// Scorer with the stock normalizer, default options, and no registered
    /// override terms (the built-in acronym/code patterns still apply)
    pub fn new() -> Self {
        Self {
            normalizer: Box::new(TextNormalizer),
            options: NormalizeOptions::default(),
            overrides: OverrideTerms::new(),
        }
    }

    pub fn with_options(mut self, options: NormalizeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_normalizer(mut self, normalizer: Box<dyn Normalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_overrides(mut self, overrides: OverrideTerms) -> Self {
        self.overrides = overrides;
        self
    }

    /// Register an override term after construction
    pub fn register_override_term(&mut self, term: &str) {
        self.overrides.register(term);
    }

    pub fn override_terms(&self) -> &OverrideTerms {
        &self.overrides
    }

    /// Score one block's variations.
    ///
    /// Zero variations and a single variation are both perfectly
    /// consistent by definition; so is a set of variations that normalize
    /// to the same string.
    pub fn score_block(&self, variations: &[String]) -> Result<ConsistencyResult> {
        let normalized: Vec<String> = variations
            .iter()
            .map(|v| self.normalizer.normalize(v, &self.options))
            .collect();

        if normalized.is_empty() {
            return Ok(ConsistencyResult::perfect(String::new(), 0, 0));
        }
        if normalized.len() == 1 {
            let reference = normalized.into_iter().next().unwrap_or_default();
            let chars = reference.chars().count();
            return Ok(ConsistencyResult::perfect(reference, chars, 1));
        }
        if normalized.iter().all(|v| v == &normalized[0]) {
            let chars: usize = normalized.iter().map(|v| v.chars().count()).sum();
            let reference = normalized.into_iter().next().unwrap_or_default();
            return Ok(ConsistencyResult::perfect(
                reference,
                chars,
                variations.len(),
            ));
        }

        let reference = select_reference(&normalized);
        let (character_score, matched, total, method_scores) =
            character_consistency(&reference, &normalized);

        let tokens = collect_tokens(&normalized);
        let mut override_terms_used = BTreeSet::new();
        let variation_count = normalized.len();

        let mut consistent = 0usize;
        let mut spelling_sum = 0.0;
        let token_list: Vec<&TokenStats> = tokens.values().collect();
        for stats in &token_list {
            let is_override = self.overrides.matches(&stats.raw, &stats.lower);
            if is_override {
                override_terms_used.insert(stats.lower.clone());
            }
            let word_ratio = stats.presence as f64 / variation_count as f64;
            if word_ratio >= CONSISTENT_TOKEN_RATIO || is_override {
                consistent += 1;
            }
            spelling_sum += if is_override {
                1.0
            } else {
                let variants = spelling_variant_count(stats, &token_list);
                (word_ratio - VARIANT_PENALTY * variants as f64).max(0.0)
            };
        }

        let distinct = tokens.len();
        let word_score = if distinct == 0 {
            1.0
        } else {
            consistent as f64 / distinct as f64
        };
        let spelling_score = if distinct == 0 {
            1.0
        } else {
            spelling_sum / distinct as f64
        };

        Ok(ConsistencyResult {
            character_score,
            word_score,
            spelling_score,
            matched_chars: matched,
            total_chars: total,
            variation_count,
            distinct_tokens: distinct,
            consistent_tokens: consistent,
            reference,
            override_terms_used,
            method_scores,
        })
    }
}

/// Pick the most frequent normalized variation; ties go to the variation
/// that appeared first in input order.
fn select_reference(normalized: &[String]) -> String {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for v in normalized {
        *counts.entry(v.as_str()).or_insert(0) += 1;
    }
    let mut best: &str = &normalized[0];
    let mut best_count = counts[best];
    for v in normalized {
        let count = counts[v.as_str()];
        if count > best_count {
            best = v;
            best_count = count;
        }
    }
    best.to_string()
}

/// Pooled alignment score plus per-method diagnostics against the reference
fn character_consistency(
    reference: &str,
    normalized: &[String],
) -> (f64, usize, usize, BTreeMap<String, f64>) {
    let ref_chars = reference.chars().count();
    let mut matched = 0usize;
    let mut total = 0usize;
    let mut sums = [0.0f64; 5];
    for v in normalized {
        matched += metrics::matched_chars(reference, v);
        total += ref_chars.max(v.chars().count());
        sums[0] += metrics::alignment_ratio(reference, v);
        sums[1] += metrics::lcs_ratio(reference, v);
        sums[2] += metrics::edit_similarity(reference, v);
        sums[3] += metrics::ngram_jaccard(reference, v, 2);
        sums[4] += metrics::weighted_blend(reference, v);
    }
    let n = normalized.len() as f64;
    let method_scores: BTreeMap<String, f64> = ["alignment", "lcs", "edit", "ngram", "blend"]
        .into_iter()
        .zip(sums)
        .map(|(name, sum)| (name.to_string(), sum / n))
        .collect();
    let score = if total == 0 {
        1.0
    } else {
        (matched as f64 / total as f64).clamp(0.0, 1.0)
    };
    (score, matched, total, method_scores)
}

/// Frequency and casing info for one distinct (lowercased) token
struct TokenStats {
    lower: String,
    /// First raw casing seen, used for acronym/code pattern checks
    raw: String,
    /// Number of variations containing the token
    presence: usize,
}

fn collect_tokens(normalized: &[String]) -> BTreeMap<String, TokenStats> {
    let mut tokens: BTreeMap<String, TokenStats> = BTreeMap::new();
    for variation in normalized {
        let mut seen_here: BTreeSet<String> = BTreeSet::new();
        for m in TOKEN.find_iter(variation) {
            let raw = m.as_str();
            let lower = raw.to_lowercase();
            let stats = tokens.entry(lower.clone()).or_insert_with(|| TokenStats {
                lower: lower.clone(),
                raw: raw.to_string(),
                presence: 0,
            });
            if seen_here.insert(lower) {
                stats.presence += 1;
            }
        }
    }
    tokens
}

/// Count distinct tokens that look like alternate spellings of `stats`
fn spelling_variant_count(stats: &TokenStats, all: &[&TokenStats]) -> usize {
    all.iter()
        .filter(|other| {
            if other.lower == stats.lower {
                return false;
            }
            let len_a = stats.lower.chars().count();
            let len_b = other.lower.chars().count();
            if len_a.abs_diff(len_b) > VARIANT_MAX_LEN_DELTA {
                return false;
            }
            metrics::edit_similarity(&stats.lower, &other.lower) >= VARIANT_MIN_EDIT_SIMILARITY
        })
        .count()
}
