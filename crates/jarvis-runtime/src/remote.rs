//! [`RemoteMemory`] – contract and HTTP client for the remote memory service.
//!
//! The remote service keeps an authoritative, per-user copy of learned
//! responses.  It is treated as unreliable: every call may fail with
//! [`JarvisError::RemoteUnavailable`], and a rejected bearer token surfaces
//! as [`JarvisError::AuthenticationExpired`].
//!
//! # Endpoints
//!
//! | call                | method | path              |
//! |---------------------|--------|-------------------|
//! | `fetch_memory`      | GET    | `/api/recall`     |
//! | `save_memory`       | POST   | `/api/learn`      |
//! | `synthesize_speech` | POST   | `/api/synthesize` |
//! | `rate_response`     | POST   | `/api/feedback`   |
//!
//! # Example
//!
//! ```rust,no_run
//! use jarvis_runtime::remote::{HttpRemoteMemory, RemoteMemory};
//! use jarvis_types::Credential;
//!
//! # async fn demo() -> Result<(), jarvis_types::JarvisError> {
//! let remote = HttpRemoteMemory::new("http://localhost:5000");
//! let credential = Credential::new("session-token");
//!
//! // Requires a running memory service – skipped in unit tests.
//! let entries = remote.fetch_memory(&credential).await?;
//! println!("{} remote memories", entries.len());
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use jarvis_types::{Credential, JarvisError, LearningEntry};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Remote memory service as seen by the recall coordinator.
#[async_trait]
pub trait RemoteMemory: Send + Sync {
    /// Fetch every learning entry stored for the credential's user.
    async fn fetch_memory(&self, credential: &Credential)
        -> Result<Vec<LearningEntry>, JarvisError>;

    /// Store (or reinforce) an input/response pair.
    async fn save_memory(
        &self,
        credential: &Credential,
        input: &str,
        response: &str,
    ) -> Result<(), JarvisError>;

    /// Ask the service for an alternate spoken phrasing of `text`.
    ///
    /// `Ok(None)` means the service had nothing better to offer.
    async fn synthesize_speech(
        &self,
        credential: &Credential,
        text: &str,
    ) -> Result<Option<String>, JarvisError>;

    /// Record user feedback on a response.
    async fn rate_response(
        &self,
        credential: &Credential,
        input: &str,
        response: &str,
        positive: bool,
    ) -> Result<(), JarvisError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire shapes
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct LearnRequest<'a> {
    input: &'a str,
    response: &'a str,
}

#[derive(Serialize)]
struct SynthesizeRequest<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FeedbackRequest<'a> {
    input: &'a str,
    response: &'a str,
    is_positive: bool,
}

/// `/api/recall` returns either a bare list or `{ "memory": [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RecallBody {
    List(Vec<LearningEntry>),
    Wrapped { memory: Vec<LearningEntry> },
}

impl RecallBody {
    fn into_entries(self) -> Vec<LearningEntry> {
        match self {
            RecallBody::List(entries) | RecallBody::Wrapped { memory: entries } => entries,
        }
    }
}

#[derive(Deserialize, Default)]
struct SynthesizeBody {
    #[serde(default)]
    speech: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

impl SynthesizeBody {
    fn into_speech(self) -> Option<String> {
        self.speech
            .or(self.text)
            .filter(|s| !s.trim().is_empty())
    }
}

/// Map an HTTP status to the error class the coordinator reacts to.
fn classify_status(status: StatusCode) -> Option<JarvisError> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Some(JarvisError::AuthenticationExpired)
    } else if !status.is_success() {
        Some(JarvisError::RemoteUnavailable(format!(
            "server returned HTTP {status}"
        )))
    } else {
        None
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HttpRemoteMemory
// ─────────────────────────────────────────────────────────────────────────────

/// JSON-over-HTTP client for the remote memory service.
///
/// Construct once and share; the inner `reqwest::Client` pools connections.
pub struct HttpRemoteMemory {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRemoteMemory {
    /// Create a client for the service at `base_url`
    /// (e.g. `"http://localhost:5000"`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        credential: &Credential,
    ) -> Result<reqwest::Response, JarvisError> {
        let response = request
            .bearer_auth(credential.expose())
            .send()
            .await
            .map_err(|e| JarvisError::RemoteUnavailable(e.to_string()))?;
        match classify_status(response.status()) {
            Some(err) => Err(err),
            None => Ok(response),
        }
    }
}

#[async_trait]
impl RemoteMemory for HttpRemoteMemory {
    async fn fetch_memory(
        &self,
        credential: &Credential,
    ) -> Result<Vec<LearningEntry>, JarvisError> {
        let response = self
            .send(self.client.get(self.url("/api/recall")), credential)
            .await?;
        let body: RecallBody = response
            .json()
            .await
            .map_err(|e| JarvisError::RemoteUnavailable(format!("unexpected recall body: {e}")))?;
        Ok(body.into_entries())
    }

    async fn save_memory(
        &self,
        credential: &Credential,
        input: &str,
        response: &str,
    ) -> Result<(), JarvisError> {
        let body = LearnRequest { input, response };
        self.send(self.client.post(self.url("/api/learn")).json(&body), credential)
            .await?;
        Ok(())
    }

    async fn synthesize_speech(
        &self,
        credential: &Credential,
        text: &str,
    ) -> Result<Option<String>, JarvisError> {
        let body = SynthesizeRequest { text };
        let response = self
            .send(
                self.client.post(self.url("/api/synthesize")).json(&body),
                credential,
            )
            .await?;
        // An unreadable body is not worth failing over; speech is best-effort.
        let body: SynthesizeBody = response.json().await.unwrap_or_default();
        Ok(body.into_speech())
    }

    async fn rate_response(
        &self,
        credential: &Credential,
        input: &str,
        response: &str,
        positive: bool,
    ) -> Result<(), JarvisError> {
        let body = FeedbackRequest {
            input,
            response,
            is_positive: positive,
        };
        self.send(
            self.client.post(self.url("/api/feedback")).json(&body),
            credential,
        )
        .await?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
