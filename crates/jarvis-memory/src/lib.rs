//! `jarvis-memory` – The Knowledge Base.
//!
//! Gives the assistant a persistent, adaptive memory of what to answer,
//! built on a local SQLite key/value substrate.
//!
//! # Modules
//!
//! - [`similarity`] – text normalization and the Jaccard
//!   [`similarity`][similarity::similarity] scorer used to compare
//!   utterances.
//! - [`pattern_index`] – [`PatternIndex`][pattern_index::PatternIndex]: the
//!   content-word → responses index behind fuzzy recall, with an optional
//!   least-recently-used word limit.
//! - [`knowledge`] – [`KnowledgeStore`][knowledge::KnowledgeStore]: learning,
//!   confidence accumulation, exact and fuzzy recall, similar-question
//!   lookup.
//! - [`persistence`] – [`KvStore`][persistence::KvStore] and the
//!   [`MemorySnapshot`][persistence::MemorySnapshot] blob the store is
//!   saved as.

pub mod knowledge;
pub mod pattern_index;
pub mod persistence;
pub mod similarity;

pub use knowledge::{CapacityPolicy, KnowledgeEntry, KnowledgeStore, StoreOptions, StoreStats};
pub use persistence::{MemoryError, MemorySnapshot};
pub use similarity::{normalize, similarity};
