// src/metrics/mod.rs

//! String similarity primitives
//!
//! Pure, deterministic functions over two strings, each returning a score in
//! [0, 1]. These are the building blocks the consistency scorer combines;
//! none of them normalize or tokenize their input.
//!
//! All functions operate on Unicode scalar values, not bytes, so multi-byte
//! characters count as single units.

use std::collections::HashSet;

/// Greedy contiguous-block alignment ratio.
///
/// Repeatedly finds the longest common contiguous block, then recurses into
/// the unmatched prefixes and suffixes. The score is the total matched
/// length over `max(len(a), len(b))`.
pub fn alignment_ratio(a: &str, b: &str) -> f64 {
    let (la, lb) = (a.chars().count(), b.chars().count());
    if la == 0 && lb == 0 {
        return 1.0;
    }
    let denom = la.max(lb);
    if denom == 0 {
        return 1.0;
    }
    matched_chars(a, b) as f64 / denom as f64
}

/// Total characters matched by greedy contiguous-block alignment.
///
/// Exposed separately because the consistency scorer pools matched counts
/// across many variations before dividing.
pub fn matched_chars(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut total = 0;
    let mut pending = vec![(0usize, a.len(), 0usize, b.len())];
    while let Some((a0, a1, b0, b1)) = pending.pop() {
        if a0 >= a1 || b0 >= b1 {
            continue;
        }
        if let Some((i, j, len)) = longest_common_block(&a[a0..a1], &b[b0..b1]) {
            total += len;
            pending.push((a0, a0 + i, b0, b0 + j));
            pending.push((a0 + i + len, a1, b0 + j + len, b1));
        }
    }
    total
}

/// Longest common subsequence length over `max(len(a), len(b))`.
pub fn lcs_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let denom = a.len().max(b.len());
    lcs_len(&a, &b) as f64 / denom as f64
}

/// Levenshtein-based similarity: `1 - distance / max(len(a), len(b))`,
/// floored at zero.
pub fn edit_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let denom = a.len().max(b.len());
    let dist = levenshtein(&a, &b);
    (1.0 - dist as f64 / denom as f64).max(0.0)
}

/// Jaccard index over the sets of character n-grams.
///
/// Strings shorter than `n` characters have no n-grams; in that case the
/// score is 1.0 for equal strings and 0.0 otherwise.
pub fn ngram_jaccard(a: &str, b: &str, n: usize) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if n == 0 || a.len() < n || b.len() < n {
        return if a == b { 1.0 } else { 0.0 };
    }
    let grams_a: HashSet<&[char]> = a.windows(n).collect();
    let grams_b: HashSet<&[char]> = b.windows(n).collect();
    let intersection = grams_a.intersection(&grams_b).count();
    let union = grams_a.union(&grams_b).count();
    if union == 0 {
        return 1.0;
    }
    intersection as f64 / union as f64
}

/// Fixed-weight blend of the four primitives, with bigram Jaccard.
pub fn weighted_blend(a: &str, b: &str) -> f64 {
    0.30 * alignment_ratio(a, b)
        + 0.25 * lcs_ratio(a, b)
        + 0.25 * edit_similarity(a, b)
        + 0.20 * ngram_jaccard(a, b, 2)
}

/// Find the longest common contiguous block of `a` and `b`.
///
/// Returns `(start_in_a, start_in_b, length)` for the first (leftmost in
/// `a`, then in `b`) block of maximal length, or `None` when nothing
/// matches. Ties are broken deterministically so repeated calls agree.
fn longest_common_block(a: &[char], b: &[char]) -> Option<(usize, usize, usize)> {
    let mut best: Option<(usize, usize, usize)> = None;
    let mut prev = vec![0usize; b.len() + 1];
    let mut row = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        for (j, cb) in b.iter().enumerate() {
            row[j + 1] = if ca == cb { prev[j] + 1 } else { 0 };
            let len = row[j + 1];
            if len > best.map_or(0, |(_, _, l)| l) {
                best = Some((i + 1 - len, j + 1 - len, len));
            }
        }
        std::mem::swap(&mut prev, &mut row);
    }
    best
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut row = vec![0usize; b.len() + 1];
    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            row[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(row[j])
            };
        }
        std::mem::swap(&mut prev, &mut row);
    }
    prev[b.len()]
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut row = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let sub = prev[j] + usize::from(ca != cb);
            row[j + 1] = sub.min(prev[j + 1] + 1).min(row[j] + 1);
        }
        std::mem::swap(&mut prev, &mut row);
    }
    prev[b.len()]
}
