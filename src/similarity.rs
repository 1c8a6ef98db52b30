//! String normalization and similarity.
//!
//! Record fields are normalized before comparison: lowercased, trimmed, and
//! stripped of everything outside `[a-z0-9]`. Similarity itself is a
//! pluggable `(str, str) -> [0, 1]` function; the default implementation is
//! a bigram overlap coefficient (Sørensen–Dice).

use std::collections::HashMap;

/// Normalizes a record field for comparison.
///
/// Lowercases the input and strips every character outside `[a-z0-9]`,
/// which also removes whitespace and punctuation.
///
/// # Example
///
/// ```rust
/// use doppel::similarity::normalize_field;
///
/// assert_eq!(normalize_field("  John Smith "), "johnsmith");
/// assert_eq!(normalize_field("john@x.com"), "johnxcom");
/// ```
#[must_use]
pub fn normalize_field(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect()
}

/// Normalizes a phone number to its digits.
///
/// # Example
///
/// ```rust
/// use doppel::similarity::normalize_phone;
///
/// assert_eq!(normalize_phone("+1 (555) 010-2030"), "15550102030");
/// ```
#[must_use]
pub fn normalize_phone(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

/// A bounded `[0, 1]` similarity over already-normalized strings.
///
/// Implementations must be deterministic, symmetric, return `1.0` for
/// identical inputs and `0.0` for fully disjoint inputs. The engine treats
/// the function as a black box, so alternative algorithms (trigrams,
/// Jaro-Winkler, etc.) can be swapped in without touching the scorer.
pub trait StringSimilarity: Send + Sync {
    /// Scores two normalized strings.
    fn score(&self, a: &str, b: &str) -> f64;
}

/// Bigram overlap (Sørensen–Dice) similarity.
///
/// Splits each string into overlapping character pairs and scores
/// `2 × |shared bigrams| / (|bigrams(a)| + |bigrams(b)|)`, with multiset
/// semantics so repeated bigrams count as often as they occur on both
/// sides. Inputs too short to form a bigram fall back to plain equality.
///
/// # Example
///
/// ```rust
/// use doppel::{BigramSimilarity, StringSimilarity};
///
/// let sim = BigramSimilarity;
/// assert_eq!(sim.score("johnsmith", "johnsmith"), 1.0);
/// assert_eq!(sim.score("abcd", "wxyz"), 0.0);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct BigramSimilarity;

impl BigramSimilarity {
    fn bigram_counts(s: &str) -> HashMap<(char, char), usize> {
        let chars: Vec<char> = s.chars().collect();
        let mut counts = HashMap::new();
        for pair in chars.windows(2) {
            *counts.entry((pair[0], pair[1])).or_insert(0) += 1;
        }
        counts
    }
}

impl StringSimilarity for BigramSimilarity {
    #[allow(clippy::cast_precision_loss)]
    fn score(&self, a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        // Too short for bigrams on either side: equality already ruled out.
        if a.chars().count() < 2 || b.chars().count() < 2 {
            return 0.0;
        }

        let counts_a = Self::bigram_counts(a);
        let counts_b = Self::bigram_counts(b);

        let total_a: usize = counts_a.values().sum();
        let total_b: usize = counts_b.values().sum();
        let shared: usize = counts_a
            .iter()
            .map(|(bigram, count_a)| count_a.min(counts_b.get(bigram).unwrap_or(&0)))
            .sum();

        (2 * shared) as f64 / (total_a + total_b) as f64
    }
}
