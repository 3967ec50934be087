use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Opaque session token identifying the user to the remote memory service.
///
/// The token is wiped from memory when the credential is dropped and never
/// appears in `Debug` output.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw bearer token, for building the `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Structured input half of a remote [`LearningEntry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningInput {
    /// The utterance exactly as the user typed or spoke it.
    pub original: String,
    /// Server-side normalized form used for similarity scoring.
    pub normalized: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Intent label inferred by the server, if any.
    #[serde(default)]
    pub intent: Option<String>,
}

/// Response half of a remote [`LearningEntry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningResponse {
    pub text: String,
    pub confidence: f64,
    /// Provenance tag (e.g. `"user"`, `"system"`).
    #[serde(default)]
    pub source: Option<String>,
}

/// A learned input/response pair as stored by the remote memory service.
///
/// Richer than the local knowledge entry; the coordinator only reads the
/// normalized input and the response confidence when scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningEntry {
    pub input: LearningInput,
    pub response: LearningResponse,
    #[serde(default)]
    pub times_used: u64,
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
}

/// Which stage of the recall pipeline produced a [`Reply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplySource {
    /// Best-scoring entry of the user's remote memory.
    Remote,
    /// Exact or fuzzy hit in the local knowledge store.
    Local,
    /// Produced by the rule-based responder after both stores missed.
    Fallback,
}

/// The answer handed back to the UI / speech layer for one utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    /// Text to display.
    pub text: String,
    /// Text to speak. Equals `text` unless remote synthesis supplied an
    /// alternate phrasing.
    pub speech: String,
    pub source: ReplySource,
    /// `true` when a remote call reported an expired credential while this
    /// reply was produced. The caller should clear the credential and prompt
    /// for re-authentication.
    pub auth_expired: bool,
}

/// Outcome of the remote half of a write operation (teach, feedback).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatus {
    /// No credential; the remote was not contacted.
    Skipped,
    Synced,
    Unavailable,
    AuthExpired,
}

/// Error taxonomy shared across the Jarvis crates.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JarvisError {
    #[error("Remote memory unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Authentication expired; re-authentication required")]
    AuthenticationExpired,

    #[error("Malformed local state: {0}")]
    MalformedLocalState(String),

    #[error("Local storage error: {0}")]
    Storage(String),
}

impl JarvisError {
    /// `true` for the one error class that must reach the user.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, JarvisError::AuthenticationExpired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_debug_is_redacted() {
        let cred = Credential::new("tok-super-secret");
        let dbg = format!("{cred:?}");
        assert!(!dbg.contains("tok-super-secret"));
        assert!(dbg.contains("<redacted>"));
        assert_eq!(cred.expose(), "tok-super-secret");
    }

    #[test]
    fn learning_entry_accepts_camel_case_wire_format() {
        let json = r#"{
            "input": {
                "original": "What time is it?",
                "normalized": "what time is it",
                "keywords": ["time"],
                "intent": "time_query"
            },
            "response": { "text": "It's 3pm", "confidence": 0.9, "source": "user" },
            "timesUsed": 4,
            "lastUsed": "2024-05-01T10:00:00Z"
        }"#;
        let entry: LearningEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.input.normalized, "what time is it");
        assert_eq!(entry.input.intent.as_deref(), Some("time_query"));
        assert_eq!(entry.response.source.as_deref(), Some("user"));
        assert_eq!(entry.times_used, 4);
        assert!(entry.last_used.is_some());
    }

    #[test]
    fn learning_entry_optional_fields_default() {
        let json = r#"{
            "input": { "original": "hi", "normalized": "hi" },
            "response": { "text": "hello", "confidence": 0.5 }
        }"#;
        let entry: LearningEntry = serde_json::from_str(json).unwrap();
        assert!(entry.input.keywords.is_empty());
        assert!(entry.input.intent.is_none());
        assert_eq!(entry.times_used, 0);
        assert!(entry.last_used.is_none());
    }

    #[test]
    fn reply_source_serializes_lowercase() {
        let json = serde_json::to_string(&ReplySource::Fallback).unwrap();
        assert_eq!(json, "\"fallback\"");
    }

    #[test]
    fn jarvis_error_display_and_auth_check() {
        let err = JarvisError::RemoteUnavailable("connection refused".into());
        assert!(err.to_string().contains("connection refused"));
        assert!(!err.is_auth_expired());
        assert!(JarvisError::AuthenticationExpired.is_auth_expired());
    }
}
