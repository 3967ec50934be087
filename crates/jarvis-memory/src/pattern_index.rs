//! Word → responses index backing fuzzy recall.
//!
//! Each content word maps to the distinct responses that were learned for
//! any input containing that word, in the order they were first learned.
//! Under the default unbounded policy the index only ever grows.
//!
//! When constructed with a word limit the index tracks a logical clock per
//! word and evicts the least recently touched word once the limit is
//! exceeded.  A word is touched when a response is added to it or when
//! fuzzy recall counts its votes towards a hit.

use std::collections::HashMap;

#[derive(Debug, Clone)]
struct PatternSlot {
    responses: Vec<String>,
    touched: u64,
}

/// Content-word index from word to the distinct responses associated with it.
#[derive(Debug, Clone, Default)]
pub struct PatternIndex {
    words: HashMap<String, PatternSlot>,
    clock: u64,
    max_words: Option<usize>,
}

impl PatternIndex {
    /// Create an empty index.  `max_words = None` never evicts.
    pub fn new(max_words: Option<usize>) -> Self {
        Self {
            words: HashMap::new(),
            clock: 0,
            max_words,
        }
    }

    /// Rebuild an index from its serialized `(word, responses)` pairs.
    ///
    /// Pairs are taken to be ordered least → most recently touched.
    /// Duplicate words are merged and duplicate responses dropped so a
    /// hand-edited blob cannot break the no-duplicates invariant.
    pub fn from_pairs(pairs: Vec<(String, Vec<String>)>, max_words: Option<usize>) -> Self {
        let mut index = Self::new(max_words);
        for (word, responses) in pairs {
            for response in responses {
                index.insert(&word, &response);
            }
            index.touch(&word);
        }
        index.evict_over_limit();
        index
    }

    /// Associate `response` with `word`, skipping it if already present.
    ///
    /// Returns `true` when the response was newly added.
    pub fn add(&mut self, word: &str, response: &str) -> bool {
        let added = self.insert(word, response);
        self.touch(word);
        self.evict_over_limit();
        added
    }

    /// Responses associated with `word`, in first-learned order.
    pub fn responses(&self, word: &str) -> Option<&[String]> {
        self.words.get(word).map(|slot| slot.responses.as_slice())
    }

    /// Mark `word` as most recently used.  No-op for unknown words.
    pub fn touch(&mut self, word: &str) {
        if let Some(slot) = self.words.get_mut(word) {
            self.clock += 1;
            slot.touched = self.clock;
        }
    }

    /// Number of indexed words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Serialize as `(word, responses)` pairs ordered least → most recently
    /// touched (ties broken by word).
    pub fn to_pairs(&self) -> Vec<(String, Vec<String>)> {
        let mut slots: Vec<(&String, &PatternSlot)> = self.words.iter().collect();
        slots.sort_by(|a, b| a.1.touched.cmp(&b.1.touched).then_with(|| a.0.cmp(b.0)));
        slots
            .into_iter()
            .map(|(word, slot)| (word.clone(), slot.responses.clone()))
            .collect()
    }

    fn insert(&mut self, word: &str, response: &str) -> bool {
        let slot = self
            .words
            .entry(word.to_string())
            .or_insert_with(|| PatternSlot {
                responses: Vec::new(),
                touched: 0,
            });
        if slot.responses.iter().any(|r| r == response) {
            false
        } else {
            slot.responses.push(response.to_string());
            true
        }
    }

    fn evict_over_limit(&mut self) {
        let Some(max) = self.max_words else {
            return;
        };
        while self.words.len() > max {
            let oldest = self
                .words
                .iter()
                .min_by(|a, b| a.1.touched.cmp(&b.1.touched).then_with(|| a.0.cmp(b.0)))
                .map(|(word, _)| word.clone());
            match oldest {
                Some(word) => {
                    tracing::debug!(word = %word, "evicting least recently used pattern word");
                    self.words.remove(&word);
                }
                None => break,
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
