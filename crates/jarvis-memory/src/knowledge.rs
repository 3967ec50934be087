//! Local Knowledge Store.
//!
//! Learns mappings from normalized utterances to responses, accumulates a
//! confidence score per mapping and recalls the best response for a new
//! utterance.  State is persisted through a [`KvStore`] after every learn.
//!
//! ## Confidence
//!
//! | event                              | effect            |
//! |------------------------------------|-------------------|
//! | first learn of a key               | `0.5`             |
//! | repeated learn of the same key     | `+0.1`            |
//! | positive feedback ([`reinforce`])  | `+0.2`            |
//!
//! Confidence never decreases and is clamped to [`MAX_CONFIDENCE`].
//!
//! ## Recall
//!
//! 1. **Exact** – the normalized input is a stored key *and* its confidence
//!    is strictly above [`EXACT_RECALL_THRESHOLD`].
//! 2. **Fuzzy** – every content word of the input (sorted, distinct) casts
//!    one vote for each response in its pattern list.  The response with the
//!    most votes wins; ties go to the response that entered the tally first.
//!
//! [`reinforce`]: KnowledgeStore::reinforce
//!
//! # Example
//!
//! ```rust
//! use jarvis_memory::knowledge::KnowledgeStore;
//!
//! let mut store = KnowledgeStore::open_in_memory().unwrap();
//! store.learn("turn on lights", "Lights on").unwrap();
//!
//! // A single learn is below the exact-recall threshold …
//! assert_eq!(store.recall_exact("turn on lights"), None);
//! // … but the shared content words still find it.
//! assert_eq!(
//!     store.recall("please turn on the lights now").as_deref(),
//!     Some("Lights on")
//! );
//! ```

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::pattern_index::PatternIndex;
use crate::persistence::{KvStore, MemoryError, MemorySnapshot, StoredEntry};
use crate::similarity::{content_words, normalize, overlap_ratio};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Confidence assigned to a key the first time it is learned.
pub const INITIAL_CONFIDENCE: f64 = 0.5;
/// Confidence added when an existing key is learned again.
pub const LEARN_INCREMENT: f64 = 0.1;
/// Confidence added by explicit positive feedback.
pub const FEEDBACK_INCREMENT: f64 = 0.2;
/// Upper bound for confidence.
pub const MAX_CONFIDENCE: f64 = 1.0;
/// Exact recall requires confidence strictly above this value.
pub const EXACT_RECALL_THRESHOLD: f64 = 0.7;
/// `find_similar_questions` requires an overlap ratio strictly above this.
pub const SIMILAR_QUESTION_THRESHOLD: f64 = 0.6;
/// Storage key used when no namespace is configured.
pub const DEFAULT_NAMESPACE: &str = "jarvisMemory";

// ─────────────────────────────────────────────────────────────────────────────
// Options
// ─────────────────────────────────────────────────────────────────────────────

/// Growth policy for the pattern index and conversation log.
///
/// Knowledge entries themselves are never evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapacityPolicy {
    /// Grow without limit.
    #[default]
    Unbounded,
    /// Evict the least recently touched pattern words and the oldest
    /// conversation lines once the limits are exceeded.
    Bounded {
        max_pattern_words: usize,
        max_conversations: usize,
    },
}

impl CapacityPolicy {
    fn pattern_limit(&self) -> Option<usize> {
        match self {
            CapacityPolicy::Unbounded => None,
            CapacityPolicy::Bounded {
                max_pattern_words, ..
            } => Some(*max_pattern_words),
        }
    }

    fn conversation_limit(&self) -> Option<usize> {
        match self {
            CapacityPolicy::Unbounded => None,
            CapacityPolicy::Bounded {
                max_conversations, ..
            } => Some(*max_conversations),
        }
    }
}

/// Options for [`KnowledgeStore::open_with`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Key the serialized store is written under.  Use one namespace per
    /// identity to keep memories apart.
    pub namespace: String,
    pub capacity: CapacityPolicy,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            capacity: CapacityPolicy::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// KnowledgeEntry
// ─────────────────────────────────────────────────────────────────────────────

/// A learned response for one normalized input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    /// Normalized input; unique within a store.
    pub key: String,
    pub response: String,
    pub confidence: f64,
    /// Number of recall hits served from this entry.
    pub times_used: u64,
    pub last_used: Option<DateTime<Utc>>,
}

impl KnowledgeEntry {
    fn new(key: String, response: String) -> Self {
        Self {
            key,
            response,
            confidence: INITIAL_CONFIDENCE,
            times_used: 0,
            last_used: None,
        }
    }

    fn raise_confidence(&mut self, by: f64) {
        self.confidence = (self.confidence + by).min(MAX_CONFIDENCE).max(self.confidence);
    }

    fn mark_used(&mut self) {
        self.times_used += 1;
        self.last_used = Some(Utc::now());
    }
}

/// Size summary of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub entries: usize,
    pub pattern_words: usize,
    pub conversations: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// KnowledgeStore
// ─────────────────────────────────────────────────────────────────────────────

/// Persistent knowledge base with exact and fuzzy recall.
///
/// Not internally synchronized; share it as `Arc<Mutex<KnowledgeStore>>`
/// when several callers mutate it.
pub struct KnowledgeStore {
    kv: KvStore,
    namespace: String,
    capacity: CapacityPolicy,
    knowledge: HashMap<String, KnowledgeEntry>,
    conversations: Vec<String>,
    patterns: PatternIndex,
}

impl KnowledgeStore {
    /// Open (or create) a store backed by the SQLite database at `path`
    /// using the default namespace and an unbounded capacity policy.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        Self::open_with(path, StoreOptions::default())
    }

    /// Open (or create) a store at `path` with explicit options.
    pub fn open_with(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self, MemoryError> {
        Self::from_kv(KvStore::open(path)?, options)
    }

    /// Open a store on a temporary in-memory database (useful for testing).
    pub fn open_in_memory() -> Result<Self, MemoryError> {
        Self::open_in_memory_with(StoreOptions::default())
    }

    pub fn open_in_memory_with(options: StoreOptions) -> Result<Self, MemoryError> {
        Self::from_kv(KvStore::open_in_memory()?, options)
    }

    fn from_kv(kv: KvStore, options: StoreOptions) -> Result<Self, MemoryError> {
        let mut store = Self {
            kv,
            namespace: options.namespace,
            capacity: options.capacity,
            knowledge: HashMap::new(),
            conversations: Vec::new(),
            patterns: PatternIndex::new(options.capacity.pattern_limit()),
        };
        store.load()?;
        Ok(store)
    }

    // -------------------------------------------------------------------------
    // Learning
    // -------------------------------------------------------------------------

    /// Learn that `input` should be answered with `response`.
    ///
    /// A new key starts at [`INITIAL_CONFIDENCE`]; an existing key gains
    /// [`LEARN_INCREMENT`] and takes the latest response text.  Every
    /// content word of the input is linked to `response` in the pattern
    /// index.  The store is persisted before returning.
    ///
    /// # Errors
    ///
    /// Only persistence can fail.  The in-memory state is updated either
    /// way, so a later successful save writes it out.
    pub fn learn(&mut self, input: &str, response: &str) -> Result<(), MemoryError> {
        let key = normalize(input);

        self.conversations.push(format!("{input} → {response}"));
        self.trim_conversations();

        for word in content_words(&key) {
            self.patterns.add(word, response);
        }

        match self.knowledge.get_mut(&key) {
            Some(entry) => {
                entry.raise_confidence(LEARN_INCREMENT);
                entry.response = response.to_string();
                debug!(key = %key, confidence = entry.confidence, "reinforced knowledge entry");
            }
            None => {
                debug!(key = %key, "learned new knowledge entry");
                self.knowledge
                    .insert(key.clone(), KnowledgeEntry::new(key, response.to_string()));
            }
        }

        self.save()
    }

    /// Apply positive-feedback reinforcement ([`FEEDBACK_INCREMENT`]) to the
    /// entry for `input`.
    ///
    /// Returns `Ok(false)` without persisting when the key is unknown.
    pub fn reinforce(&mut self, input: &str) -> Result<bool, MemoryError> {
        let key = normalize(input);
        let Some(entry) = self.knowledge.get_mut(&key) else {
            return Ok(false);
        };
        entry.raise_confidence(FEEDBACK_INCREMENT);
        debug!(key = %key, confidence = entry.confidence, "feedback reinforcement");
        self.save()?;
        Ok(true)
    }

    // -------------------------------------------------------------------------
    // Recall
    // -------------------------------------------------------------------------

    /// Exact recall, trusted only above [`EXACT_RECALL_THRESHOLD`].
    pub fn recall_exact(&mut self, input: &str) -> Option<String> {
        let key = normalize(input);
        let entry = self.knowledge.get_mut(&key)?;
        if entry.confidence <= EXACT_RECALL_THRESHOLD {
            debug!(key = %key, confidence = entry.confidence, "exact match below threshold");
            return None;
        }
        entry.mark_used();
        let response = entry.response.clone();
        self.persist_usage();
        Some(response)
    }

    /// Fuzzy recall through the content-word pattern index.
    pub fn recall_fuzzy(&mut self, input: &str) -> Option<String> {
        let key = normalize(input);
        let words: Vec<String> = content_words(&key).into_iter().map(str::to_string).collect();

        // Insertion-ordered tally keeps tie-breaking deterministic.
        let mut tally: Vec<(String, usize)> = Vec::new();
        for word in &words {
            let Some(responses) = self.patterns.responses(word) else {
                continue;
            };
            for response in responses {
                match tally.iter_mut().find(|(r, _)| r == response) {
                    Some((_, votes)) => *votes += 1,
                    None => tally.push((response.clone(), 1)),
                }
            }
        }

        let mut best: Option<(String, usize)> = None;
        for (response, votes) in tally {
            if best.as_ref().is_none_or(|(_, top)| votes > *top) {
                best = Some((response, votes));
            }
        }
        let (winner, votes) = best?;
        debug!(response = %winner, votes, "fuzzy recall hit");

        for word in &words {
            if self
                .patterns
                .responses(word)
                .is_some_and(|rs| rs.iter().any(|r| *r == winner))
            {
                self.patterns.touch(word);
            }
        }
        for entry in self.knowledge.values_mut() {
            if entry.response == winner {
                entry.mark_used();
            }
        }
        self.persist_usage();
        Some(winner)
    }

    /// Exact recall first, fuzzy recall second.
    pub fn recall(&mut self, input: &str) -> Option<String> {
        self.recall_exact(input)
            .or_else(|| self.recall_fuzzy(input))
    }

    /// Stored keys sharing more than [`SIMILAR_QUESTION_THRESHOLD`] of the
    /// input's words, sorted.
    pub fn find_similar_questions(&self, input: &str) -> Vec<String> {
        let query = normalize(input);
        let mut similar: Vec<String> = self
            .knowledge
            .keys()
            .filter(|key| overlap_ratio(&query, key) > SIMILAR_QUESTION_THRESHOLD)
            .cloned()
            .collect();
        similar.sort();
        similar
    }

    /// Responses learned for the questions [`find_similar_questions`]
    /// returns, in the same order.
    ///
    /// [`find_similar_questions`]: Self::find_similar_questions
    pub fn suggest_responses(&self, input: &str) -> Vec<String> {
        self.find_similar_questions(input)
            .iter()
            .filter_map(|key| self.knowledge.get(key))
            .map(|entry| entry.response.clone())
            .collect()
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// The entry stored for `input` (normalized before lookup).
    pub fn entry(&self, input: &str) -> Option<&KnowledgeEntry> {
        self.knowledge.get(&normalize(input))
    }

    pub fn len(&self) -> usize {
        self.knowledge.len()
    }

    pub fn is_empty(&self) -> bool {
        self.knowledge.is_empty()
    }

    /// Append-only audit trail of learned `input → response` lines.
    pub fn conversations(&self) -> &[String] {
        &self.conversations
    }

    /// Responses indexed under a content word.
    pub fn pattern_responses(&self, word: &str) -> Option<&[String]> {
        self.patterns.responses(word)
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            entries: self.knowledge.len(),
            pattern_words: self.patterns.len(),
            conversations: self.conversations.len(),
        }
    }

    // -------------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------------

    /// Serializable copy of the full store.  Entries are sorted by key.
    pub fn snapshot(&self) -> MemorySnapshot {
        let mut knowledge: Vec<(String, StoredEntry)> = self
            .knowledge
            .values()
            .map(|e| {
                (
                    e.key.clone(),
                    StoredEntry {
                        response: e.response.clone(),
                        confidence: e.confidence,
                        times_used: e.times_used,
                        last_used: e.last_used,
                    },
                )
            })
            .collect();
        knowledge.sort_by(|a, b| a.0.cmp(&b.0));
        MemorySnapshot {
            knowledge,
            conversations: self.conversations.clone(),
            patterns: self.patterns.to_pairs(),
        }
    }

    /// Write the full store under its namespace key.
    pub fn save(&self) -> Result<(), MemoryError> {
        let blob = self.snapshot().to_json()?;
        self.kv.put(&self.namespace, &blob)
    }

    /// Replace the in-memory state with what is persisted.
    ///
    /// Missing storage leaves the store empty.  A blob that fails to parse
    /// is logged and also leaves the store empty; it is overwritten by the
    /// next save.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Sqlite`] if the database cannot be read.
    pub fn load(&mut self) -> Result<(), MemoryError> {
        let snapshot = match self.kv.get(&self.namespace)? {
            None => MemorySnapshot::default(),
            Some(raw) => match MemorySnapshot::from_json(&raw) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(namespace = %self.namespace, error = %e, "discarding malformed memory blob");
                    MemorySnapshot::default()
                }
            },
        };
        self.apply_snapshot(snapshot);
        Ok(())
    }

    fn apply_snapshot(&mut self, snapshot: MemorySnapshot) {
        self.knowledge = snapshot
            .knowledge
            .into_iter()
            .map(|(key, stored)| {
                let entry = KnowledgeEntry {
                    key: key.clone(),
                    response: stored.response,
                    confidence: stored.confidence,
                    times_used: stored.times_used,
                    last_used: stored.last_used,
                };
                (key, entry)
            })
            .collect();
        self.conversations = snapshot.conversations;
        self.trim_conversations();
        self.patterns = PatternIndex::from_pairs(snapshot.patterns, self.capacity.pattern_limit());
    }

    fn trim_conversations(&mut self) {
        if let Some(max) = self.capacity.conversation_limit()
            && self.conversations.len() > max
        {
            let excess = self.conversations.len() - max;
            self.conversations.drain(..excess);
        }
    }

    fn persist_usage(&self) {
        if let Err(e) = self.save() {
            warn!(error = %e, "failed to persist recall usage metadata");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> KnowledgeStore {
        KnowledgeStore::open_in_memory().unwrap()
    }

    // ── learn ────────────────────────────────────────────────────────────────

    #[test]
    fn first_learn_starts_at_initial_confidence() {
        let mut s = store();
        s.learn("What time is it?", "It's 3pm").unwrap();
        let entry = s.entry("what time is it").unwrap();
        assert_eq!(entry.key, "what time is it");
        assert_eq!(entry.confidence, INITIAL_CONFIDENCE);
        assert_eq!(entry.times_used, 0);
    }

    #[test]
    fn relearning_same_key_updates_in_place() {
        let mut s = store();
        s.learn("what time is it", "It's 3pm").unwrap();
        s.learn("What time is it?", "It's 4pm").unwrap();
        assert_eq!(s.len(), 1);
        let entry = s.entry("what time is it").unwrap();
        assert_eq!(entry.response, "It's 4pm", "latest response wins");
        assert!((entry.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn confidence_is_clamped_and_never_decreases() {
        let mut s = store();
        let mut last = 0.0;
        for _ in 0..20 {
            s.learn("hello there", "Hi!").unwrap();
            let c = s.entry("hello there").unwrap().confidence;
            assert!(c >= last);
            last = c;
        }
        assert_eq!(last, MAX_CONFIDENCE);
    }

    #[test]
    fn learn_indexes_only_content_words() {
        let mut s = store();
        s.learn("turn on the lights", "Lights on").unwrap();
        assert!(s.pattern_responses("turn").is_some());
        assert!(s.pattern_responses("lights").is_some());
        assert!(s.pattern_responses("on").is_none());
        assert!(s.pattern_responses("the").is_none());
    }

    #[test]
    fn pattern_lists_hold_distinct_responses() {
        let mut s = store();
        s.learn("turn on lights", "Lights on").unwrap();
        s.learn("lights please", "Lights on").unwrap();
        s.learn("lights off", "Lights off").unwrap();
        assert_eq!(
            s.pattern_responses("lights").unwrap(),
            &["Lights on".to_string(), "Lights off".to_string()]
        );
    }

    #[test]
    fn learn_appends_conversation_line() {
        let mut s = store();
        s.learn("Hi there", "Hello!").unwrap();
        assert_eq!(s.conversations(), &["Hi there → Hello!".to_string()]);
    }

    // ── exact recall ─────────────────────────────────────────────────────────

    #[test]
    fn exact_recall_requires_confidence_above_threshold() {
        let mut s = store();
        s.learn("what time is it", "It's 3pm").unwrap();
        assert_eq!(s.recall_exact("what time is it"), None, "0.5");
        s.learn("what time is it", "It's 3pm").unwrap();
        assert_eq!(s.recall_exact("what time is it"), None, "0.6");
        s.learn("what time is it", "It's 3pm").unwrap();
        assert_eq!(s.recall_exact("what time is it"), None, "0.7 is not above 0.7");
        s.learn("what time is it", "It's 3pm").unwrap();
        assert_eq!(s.recall_exact("what time is it").as_deref(), Some("It's 3pm"));
    }

    #[test]
    fn exact_hit_updates_usage_metadata() {
        let mut s = store();
        for _ in 0..4 {
            s.learn("open google", "Google is opening now.").unwrap();
        }
        s.recall_exact("Open Google!").unwrap();
        let entry = s.entry("open google").unwrap();
        assert_eq!(entry.times_used, 1);
        assert!(entry.last_used.is_some());
    }

    #[test]
    fn exact_recall_unknown_key_misses() {
        let mut s = store();
        assert_eq!(s.recall_exact("never learned"), None);
    }

    // ── reinforce ────────────────────────────────────────────────────────────

    #[test]
    fn reinforce_adds_feedback_increment() {
        let mut s = store();
        s.learn("tell me a joke", "An impasta.").unwrap();
        assert!(s.reinforce("Tell me a joke").unwrap());
        let c = s.entry("tell me a joke").unwrap().confidence;
        assert!((c - 0.7).abs() < 1e-9);
        assert!(s.reinforce("tell me a joke").unwrap());
        assert_eq!(s.recall_exact("tell me a joke").as_deref(), Some("An impasta."));
    }

    #[test]
    fn reinforce_unknown_key_is_false() {
        let mut s = store();
        assert!(!s.reinforce("unknown").unwrap());
        assert!(s.is_empty());
    }

    // ── fuzzy recall ─────────────────────────────────────────────────────────

    #[test]
    fn fuzzy_recall_matches_shared_content_words() {
        let mut s = store();
        s.learn("turn on lights", "Lights on").unwrap();
        assert_eq!(
            s.recall("please turn on the lights now").as_deref(),
            Some("Lights on")
        );
    }

    #[test]
    fn fuzzy_recall_picks_most_votes() {
        let mut s = store();
        s.learn("play some music", "Playing music").unwrap();
        s.learn("play some jazz music loud", "Playing jazz").unwrap();
        // "jazz" and "music" both vote for "Playing jazz"; "music" also votes
        // for "Playing music".
        assert_eq!(s.recall_fuzzy("jazz music").as_deref(), Some("Playing jazz"));
    }

    #[test]
    fn fuzzy_tie_goes_to_first_tallied_response() {
        let mut s = store();
        s.learn("weather today", "Sunny").unwrap();
        s.learn("weather tomorrow", "Rainy").unwrap();
        // Words are scanned in sorted order: "today", "tomorrow", "weather".
        // "today" tallies Sunny first; both end on two votes.
        assert_eq!(
            s.recall_fuzzy("weather today tomorrow").as_deref(),
            Some("Sunny")
        );
        // Repeating the query gives the same answer.
        assert_eq!(
            s.recall_fuzzy("tomorrow today weather").as_deref(),
            Some("Sunny")
        );
    }

    #[test]
    fn fuzzy_recall_without_matches_is_none() {
        let mut s = store();
        s.learn("turn on lights", "Lights on").unwrap();
        assert_eq!(s.recall("sing a song"), None);
    }

    #[test]
    fn fuzzy_hit_stamps_winning_entry() {
        let mut s = store();
        s.learn("turn on lights", "Lights on").unwrap();
        s.recall_fuzzy("lights please").unwrap();
        assert_eq!(s.entry("turn on lights").unwrap().times_used, 1);
    }

    #[test]
    fn recall_prefers_exact_over_fuzzy() {
        let mut s = store();
        for _ in 0..4 {
            s.learn("lights status", "All lights are off").unwrap();
        }
        s.learn("lights status report", "Report ready").unwrap();
        assert_eq!(
            s.recall("lights status").as_deref(),
            Some("All lights are off")
        );
    }

    // ── similar questions ────────────────────────────────────────────────────

    #[test]
    fn find_similar_questions_uses_query_overlap_ratio() {
        let mut s = store();
        s.learn("what time is it", "It's 3pm").unwrap();
        s.learn("what is the date", "Monday").unwrap();
        s.learn("open google", "Google is opening now.").unwrap();

        // {what, time, is}: 3/3 with the first key, 2/3 with the second.
        assert_eq!(
            s.find_similar_questions("what time is"),
            vec!["what is the date".to_string(), "what time is it".to_string()]
        );
        // {what, time, now}: 2/3 with the first key only.
        assert_eq!(
            s.find_similar_questions("what time now"),
            vec!["what time is it".to_string()]
        );
        assert!(s.find_similar_questions("").is_empty());
    }

    #[test]
    fn suggest_responses_follow_similar_questions() {
        let mut s = store();
        s.learn("what time is it", "It's 3pm").unwrap();
        s.learn("open google", "Google is opening now.").unwrap();
        assert_eq!(s.suggest_responses("what time is it now"), vec!["It's 3pm".to_string()]);
    }

    // ── persistence ──────────────────────────────────────────────────────────

    #[test]
    fn save_load_roundtrip_reproduces_state() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("memory.db");

        let mut s = KnowledgeStore::open(&path).unwrap();
        s.learn("turn on lights", "Lights on").unwrap();
        s.learn("turn on lights", "Lights on").unwrap();
        s.learn("what time is it", "It's 3pm").unwrap();
        s.learn("lights off please", "Lights off").unwrap();
        s.recall_fuzzy("lights").unwrap();
        s.save().unwrap();

        let reloaded = KnowledgeStore::open(&path).unwrap();
        assert_eq!(reloaded.snapshot(), s.snapshot());
        assert_eq!(reloaded.stats(), s.stats());
    }

    #[test]
    fn learn_persists_without_explicit_save() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("memory.db");
        {
            let mut s = KnowledgeStore::open(&path).unwrap();
            s.learn("hello there", "Hi!").unwrap();
        }
        let reloaded = KnowledgeStore::open(&path).unwrap();
        assert_eq!(reloaded.entry("hello there").unwrap().response, "Hi!");
    }

    #[test]
    fn missing_storage_loads_empty() {
        let s = store();
        assert!(s.is_empty());
        assert_eq!(
            s.stats(),
            StoreStats {
                entries: 0,
                pattern_words: 0,
                conversations: 0
            }
        );
    }

    #[test]
    fn malformed_blob_loads_empty() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("memory.db");
        KvStore::open(&path)
            .unwrap()
            .put(DEFAULT_NAMESPACE, "{ definitely not json")
            .unwrap();

        let mut s = KnowledgeStore::open(&path).unwrap();
        assert!(s.is_empty());
        // The next learn overwrites the bad blob.
        s.learn("hello there", "Hi!").unwrap();
        assert_eq!(KnowledgeStore::open(&path).unwrap().len(), 1);
    }

    #[test]
    fn namespaces_are_isolated() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("memory.db");
        let alice = StoreOptions {
            namespace: "alice".to_string(),
            ..StoreOptions::default()
        };
        let bob = StoreOptions {
            namespace: "bob".to_string(),
            ..StoreOptions::default()
        };
        KnowledgeStore::open_with(&path, alice.clone())
            .unwrap()
            .learn("hello there", "Hi Alice")
            .unwrap();
        assert!(KnowledgeStore::open_with(&path, bob).unwrap().is_empty());
        assert_eq!(KnowledgeStore::open_with(&path, alice).unwrap().len(), 1);
    }

    // ── capacity ─────────────────────────────────────────────────────────────

    #[test]
    fn bounded_capacity_trims_patterns_and_conversations() {
        let mut s = KnowledgeStore::open_in_memory_with(StoreOptions {
            capacity: CapacityPolicy::Bounded {
                max_pattern_words: 2,
                max_conversations: 2,
            },
            ..StoreOptions::default()
        })
        .unwrap();
        s.learn("alpha", "a").unwrap();
        s.learn("bravo", "b").unwrap();
        s.learn("charlie", "c").unwrap();

        assert_eq!(s.stats().pattern_words, 2);
        assert!(s.pattern_responses("alpha").is_none());
        assert_eq!(
            s.conversations(),
            &["bravo → b".to_string(), "charlie → c".to_string()]
        );
        // Entries are never evicted.
        assert_eq!(s.len(), 3);
    }

    #[test]
    fn unbounded_capacity_keeps_everything() {
        let mut s = store();
        for i in 0..50 {
            s.learn(&format!("question number{i}"), &format!("answer {i}")).unwrap();
        }
        assert_eq!(s.conversations().len(), 50);
        // "question" plus fifty distinct "numberN" words.
        assert_eq!(s.stats().pattern_words, 51);
    }
}
