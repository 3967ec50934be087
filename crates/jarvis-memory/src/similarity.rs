//! Similarity Scorer and text normalization.
//!
//! Every lookup in the recall engine is keyed on a *normalized* utterance:
//! lowercased, punctuation stripped, whitespace collapsed and trimmed.  The
//! scorer compares two normalized utterances by the Jaccard index of their
//! word sets.
//!
//! ```text
//! similarity(a, b) = |words(a) ∩ words(b)| / |words(a) ∪ words(b)|
//! ```
//!
//! Word sets use set semantics (duplicates collapse), and
//! `similarity(∅, ∅)` is defined as `0.0`.
//!
//! # Example
//!
//! ```rust
//! use jarvis_memory::similarity::{normalize, similarity};
//!
//! let a = normalize("Turn ON the lights!");
//! assert_eq!(a, "turn on the lights");
//!
//! let b = normalize("turn off the lights");
//! assert!((similarity(&a, &b) - 0.6).abs() < 1e-9);
//! ```

use std::collections::BTreeSet;

/// Minimum character count (exclusive) for a token to count as a content word.
pub const CONTENT_WORD_MIN_LEN: usize = 3;

// ─────────────────────────────────────────────────────────────────────────────
// Normalization
// ─────────────────────────────────────────────────────────────────────────────

/// Normalize an utterance into a lookup key.
///
/// Lowercases, drops every character that is neither alphanumeric nor
/// whitespace, collapses whitespace runs to a single space and trims.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped: String = lowered
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The distinct whitespace tokens of `text`, in sorted order.
///
/// Sorting fixes the iteration order that fuzzy-recall tie-breaking depends
/// on.
pub fn tokens(text: &str) -> BTreeSet<&str> {
    text.split_whitespace().collect()
}

/// Distinct tokens longer than [`CONTENT_WORD_MIN_LEN`] characters, sorted.
///
/// Length filtering stands in for a stop-word list.
pub fn content_words(text: &str) -> Vec<&str> {
    tokens(text)
        .into_iter()
        .filter(|w| is_content_word(w))
        .collect()
}

pub fn is_content_word(word: &str) -> bool {
    word.chars().count() > CONTENT_WORD_MIN_LEN
}

// ─────────────────────────────────────────────────────────────────────────────
// Scores
// ─────────────────────────────────────────────────────────────────────────────

/// Jaccard similarity of the word sets of two normalized utterances.
///
/// Returns a value in `[0.0, 1.0]`; `0.0` when both are empty.
pub fn similarity(a: &str, b: &str) -> f64 {
    let set_a = tokens(a);
    let set_b = tokens(b);
    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    intersection as f64 / union as f64
}

/// Fraction of `query`'s words that also occur in `candidate`.
///
/// Asymmetric: only the query's word count is in the denominator.  Returns
/// `0.0` for an empty query.
pub fn overlap_ratio(query: &str, candidate: &str) -> f64 {
    let query_words = tokens(query);
    if query_words.is_empty() {
        return 0.0;
    }
    let candidate_words = tokens(candidate);
    let shared = query_words.intersection(&candidate_words).count();
    shared as f64 / query_words.len() as f64
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── normalize ────────────────────────────────────────────────────────────

    #[test]
    fn normalize_lowercases_strips_and_collapses() {
        assert_eq!(normalize("  What TIME   is it?! "), "what time is it");
    }

    #[test]
    fn normalize_drops_apostrophes_inside_words() {
        assert_eq!(normalize("It's 3pm."), "its 3pm");
    }

    #[test]
    fn normalize_collapses_tabs_and_newlines() {
        assert_eq!(normalize("open\t\tgoogle\nnow"), "open google now");
    }

    #[test]
    fn normalize_punctuation_only_is_empty() {
        assert_eq!(normalize("?!... ,"), "");
    }

    // ── tokens / content words ───────────────────────────────────────────────

    #[test]
    fn tokens_are_sorted_and_distinct() {
        let t: Vec<_> = tokens("lights turn lights on").into_iter().collect();
        assert_eq!(t, vec!["lights", "on", "turn"]);
    }

    #[test]
    fn content_words_skip_short_tokens() {
        assert_eq!(
            content_words("please turn on the lights now"),
            vec!["lights", "please", "turn"]
        );
    }

    #[test]
    fn content_word_length_counts_chars_not_bytes() {
        // Three multi-byte chars: not a content word.
        assert!(!is_content_word("été"));
        assert!(is_content_word("café"));
    }

    // ── similarity ───────────────────────────────────────────────────────────

    #[test]
    fn similarity_identical_is_one() {
        assert_eq!(similarity("turn on the lights", "turn on the lights"), 1.0);
    }

    #[test]
    fn similarity_disjoint_is_zero() {
        assert_eq!(similarity("open google", "tell joke"), 0.0);
    }

    #[test]
    fn similarity_both_empty_is_zero() {
        assert_eq!(similarity("", ""), 0.0);
    }

    #[test]
    fn similarity_one_empty_is_zero() {
        assert_eq!(similarity("", "hello there"), 0.0);
    }

    #[test]
    fn similarity_is_symmetric() {
        let pairs = [
            ("what time is it", "what is the time"),
            ("turn on lights", "please turn on the lights now"),
            ("a b c", "c d"),
            ("", "x"),
        ];
        for (a, b) in pairs {
            assert_eq!(similarity(a, b), similarity(b, a), "{a:?} vs {b:?}");
        }
    }

    #[test]
    fn similarity_uses_set_semantics() {
        // {hello} vs {hello, there} regardless of repetition.
        assert_eq!(similarity("hello hello hello", "hello there"), 0.5);
    }

    #[test]
    fn similarity_stays_in_unit_interval() {
        let samples = ["", "a", "a b", "b c d", "what time is it", "it is time"];
        for a in samples {
            for b in samples {
                let s = similarity(a, b);
                assert!((0.0..=1.0).contains(&s), "{a:?} vs {b:?} gave {s}");
            }
        }
    }

    // ── overlap_ratio ────────────────────────────────────────────────────────

    #[test]
    fn overlap_ratio_is_asymmetric() {
        let q = "what time";
        let k = "what time is it";
        assert_eq!(overlap_ratio(q, k), 1.0);
        assert_eq!(overlap_ratio(k, q), 0.5);
    }

    #[test]
    fn overlap_ratio_empty_query_is_zero() {
        assert_eq!(overlap_ratio("", "anything"), 0.0);
    }
}
