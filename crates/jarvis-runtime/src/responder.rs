//! [`Responder`] – the rule-based command processor consulted when neither
//! memory store has an answer.
//!
//! The coordinator treats the responder as a black box: it never fails and
//! always produces some text, even if only a "didn't understand" message.
//! Whatever it returns is learned so the next identical utterance is answered
//! from memory.

use async_trait::async_trait;

#[async_trait]
pub trait Responder: Send + Sync {
    /// Produce a reply for `command`.  Must never be empty.
    async fn process_command(&self, command: &str) -> String;
}
