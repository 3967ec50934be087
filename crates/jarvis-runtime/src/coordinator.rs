//! [`RecallCoordinator`] – decides where the answer to an utterance comes from.
//!
//! Each call to [`RecallCoordinator::process`] walks a fixed pipeline:
//!
//! 1. **RemoteLookup** – with a credential, fetch the user's remote memory
//!    and score every entry by `similarity × confidence`.  The best entry
//!    wins if its score exceeds [`REMOTE_ACCEPT_THRESHOLD`].
//! 2. **LocalLookup** – exact recall, then fuzzy recall, on the local
//!    [`KnowledgeStore`].
//! 3. **Fallback** – ask the [`Responder`].
//! 4. **Learn** – a fallback answer is written back: to the remote service
//!    when a credential is present, otherwise to the local store.
//! 5. **Respond** – with a credential, optionally ask the remote service for
//!    an alternate spoken phrasing.
//!
//! Remote failures never surface as errors.  They degrade to the next stage
//! and are logged.  The single exception is an expired credential, which is
//! reported through [`Reply::auth_expired`] so the caller can prompt for
//! re-authentication; once seen, the rest of that utterance runs as if no
//! credential were held.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::{Arc, Mutex};
//!
//! use async_trait::async_trait;
//! use jarvis_memory::KnowledgeStore;
//! use jarvis_runtime::coordinator::{CoordinatorConfig, RecallCoordinator};
//! use jarvis_runtime::remote::HttpRemoteMemory;
//! use jarvis_runtime::responder::Responder;
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl Responder for Echo {
//!     async fn process_command(&self, command: &str) -> String {
//!         format!("You said: {command}")
//!     }
//! }
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(Mutex::new(KnowledgeStore::open_in_memory()?));
//! let coordinator = RecallCoordinator::new(
//!     store,
//!     Arc::new(HttpRemoteMemory::new("http://localhost:5000")),
//!     Arc::new(Echo),
//!     CoordinatorConfig::default(),
//! );
//! let reply = coordinator.process("hello there").await;
//! println!("{}", reply.text);
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use jarvis_memory::{KnowledgeStore, normalize, similarity};
use jarvis_types::{Credential, JarvisError, LearningEntry, RemoteStatus, Reply, ReplySource};
use tracing::{debug, info, instrument, warn};

use crate::remote::RemoteMemory;
use crate::responder::Responder;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// A remote entry must score strictly above this to be used.
pub const REMOTE_ACCEPT_THRESHOLD: f64 = 0.5;

/// Upper bound on any single remote call.
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(10);

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration bundle for [`RecallCoordinator`].
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// A remote call still pending after this long is abandoned and treated
    /// as [`JarvisError::RemoteUnavailable`].
    pub remote_timeout: Duration,
    /// Ask the remote service for alternate speech on authenticated replies.
    pub synthesize_speech: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
            synthesize_speech: true,
        }
    }
}

/// Whether remote memory participates in recall.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RecallPolicy {
    /// Local store only; fallback answers are learned locally.
    #[default]
    Anonymous,
    /// Remote first; fallback answers are saved remotely only.
    Authenticated(Credential),
}

impl RecallPolicy {
    /// `Authenticated` for a non-blank token, `Anonymous` otherwise.
    pub fn from_token(token: Option<&str>) -> Self {
        match token.map(str::trim) {
            Some(t) if !t.is_empty() => RecallPolicy::Authenticated(Credential::new(t)),
            _ => RecallPolicy::Anonymous,
        }
    }

    pub fn credential(&self) -> Option<&Credential> {
        match self {
            RecallPolicy::Authenticated(credential) => Some(credential),
            RecallPolicy::Anonymous => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential().is_some()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Remote scoring
// ─────────────────────────────────────────────────────────────────────────────

/// Pick the remote entry that best answers `normalized_input`.
///
/// Score is `similarity(input, entry.input.normalized) × confidence`, with the
/// confidence clamped to `[0, 1]`.  Ties keep the earliest entry.  Returns
/// `None` when no entry scores above [`REMOTE_ACCEPT_THRESHOLD`].
pub fn best_remote_match<'a>(
    normalized_input: &str,
    entries: &'a [LearningEntry],
) -> Option<(&'a LearningEntry, f64)> {
    let mut best: Option<(&LearningEntry, f64)> = None;
    for entry in entries {
        let confidence = entry.response.confidence.clamp(0.0, 1.0);
        let score = similarity(normalized_input, &normalize(&entry.input.normalized)) * confidence;
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((entry, score));
        }
    }
    best.filter(|(_, score)| *score > REMOTE_ACCEPT_THRESHOLD)
}

// ─────────────────────────────────────────────────────────────────────────────
// RecallCoordinator
// ─────────────────────────────────────────────────────────────────────────────

/// Orchestrates remote memory, the local knowledge store and the fallback
/// responder for every utterance.
///
/// Shared by reference across tasks.  The store lock is only ever taken for
/// synchronous sections and never held across an `.await`.
pub struct RecallCoordinator {
    store: Arc<Mutex<KnowledgeStore>>,
    remote: Arc<dyn RemoteMemory>,
    responder: Arc<dyn Responder>,
    policy: RwLock<RecallPolicy>,
    config: CoordinatorConfig,
}

impl RecallCoordinator {
    /// Build a coordinator that starts out anonymous.
    pub fn new(
        store: Arc<Mutex<KnowledgeStore>>,
        remote: Arc<dyn RemoteMemory>,
        responder: Arc<dyn Responder>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            store,
            remote,
            responder,
            policy: RwLock::new(RecallPolicy::Anonymous),
            config,
        }
    }

    pub fn with_policy(self, policy: RecallPolicy) -> Self {
        *self.policy.write().unwrap_or_else(PoisonError::into_inner) = policy;
        self
    }

    /// Snapshot of the current policy.
    pub fn policy(&self) -> RecallPolicy {
        self.policy
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.policy().is_authenticated()
    }

    /// Switch to remote-first recall.
    pub fn set_credential(&self, credential: Credential) {
        *self.policy.write().unwrap_or_else(PoisonError::into_inner) =
            RecallPolicy::Authenticated(credential);
        info!("credential installed; remote memory enabled");
    }

    /// Drop the credential and fall back to local-only recall.
    pub fn clear_credential(&self) {
        *self.policy.write().unwrap_or_else(PoisonError::into_inner) = RecallPolicy::Anonymous;
        info!("credential cleared; running anonymously");
    }

    /// Handle to the local store.
    pub fn store(&self) -> Arc<Mutex<KnowledgeStore>> {
        Arc::clone(&self.store)
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    // ── Pipeline ─────────────────────────────────────────────────────────────

    /// Answer one utterance.  Always produces a non-empty reply.
    #[instrument(skip(self), fields(authenticated = tracing::field::Empty, source = tracing::field::Empty))]
    pub async fn process(&self, utterance: &str) -> Reply {
        let mut policy = self.policy();
        let mut auth_expired = false;
        let normalized = normalize(utterance);
        tracing::Span::current().record("authenticated", policy.is_authenticated());

        // 1. RemoteLookup
        if let RecallPolicy::Authenticated(credential) = &policy {
            match self.remote_lookup(credential, &normalized).await {
                Ok(Some(text)) => {
                    return self
                        .respond(text, ReplySource::Remote, &policy, auth_expired)
                        .await;
                }
                Ok(None) => debug!("no remote entry above acceptance threshold"),
                Err(JarvisError::AuthenticationExpired) => {
                    warn!("remote rejected credential during lookup; continuing anonymously");
                    auth_expired = true;
                    policy = RecallPolicy::Anonymous;
                }
                Err(e) => warn!(error = %e, "remote lookup failed; falling back to local store"),
            }
        }

        // 2. LocalLookup
        if let Some(text) = self.with_store(|store| store.recall(utterance)) {
            return self
                .respond(text, ReplySource::Local, &policy, auth_expired)
                .await;
        }

        // 3. Fallback
        let text = self.responder.process_command(utterance).await;

        // 4. Learn
        if normalized.is_empty() {
            debug!("utterance normalizes to nothing; not learning");
        } else if self.write_back(&policy, utterance, &text).await {
            auth_expired = true;
            policy = RecallPolicy::Anonymous;
        }

        // 5. Respond
        self.respond(text, ReplySource::Fallback, &policy, auth_expired)
            .await
    }

    /// Teach a pair explicitly.
    ///
    /// Always learned locally (one learn, so confidence starts at the base
    /// value and exact recall will not fire yet).  With a credential the pair
    /// is also saved remotely; the returned status reports how that went.
    #[instrument(skip(self, response))]
    pub async fn manual_teach(&self, input: &str, response: &str) -> RemoteStatus {
        self.learn_locally(input, response);
        let policy = self.policy();
        let Some(credential) = policy.credential() else {
            return RemoteStatus::Skipped;
        };
        let result = self
            .bounded(self.remote.save_memory(credential, input, response))
            .await;
        remote_status(result, "manual teach")
    }

    /// Forward user feedback on a reply to the remote service.
    ///
    /// Without a credential this is a no-op returning
    /// [`RemoteStatus::Skipped`].
    #[instrument(skip(self, response))]
    pub async fn provide_feedback(&self, input: &str, response: &str, is_positive: bool) -> RemoteStatus {
        let policy = self.policy();
        let Some(credential) = policy.credential() else {
            debug!("feedback ignored; no credential");
            return RemoteStatus::Skipped;
        };
        let result = self
            .bounded(self.remote.rate_response(credential, input, response, is_positive))
            .await;
        remote_status(result, "feedback")
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    async fn remote_lookup(
        &self,
        credential: &Credential,
        normalized: &str,
    ) -> Result<Option<String>, JarvisError> {
        let entries = self.bounded(self.remote.fetch_memory(credential)).await?;
        debug!(entries = entries.len(), "fetched remote memory");
        Ok(best_remote_match(normalized, &entries).map(|(entry, score)| {
            debug!(score, input = %entry.input.normalized, "remote hit");
            entry.response.text.clone()
        }))
    }

    /// Persist a fallback answer.  Returns `true` if the credential turned
    /// out to be expired.
    async fn write_back(&self, policy: &RecallPolicy, input: &str, response: &str) -> bool {
        let Some(credential) = policy.credential() else {
            self.learn_locally(input, response);
            return false;
        };
        match self
            .bounded(self.remote.save_memory(credential, input, response))
            .await
        {
            Ok(()) => {
                debug!("fallback answer saved remotely");
                false
            }
            Err(JarvisError::AuthenticationExpired) => {
                warn!("remote rejected credential during save; learning locally instead");
                self.learn_locally(input, response);
                true
            }
            Err(e) => {
                warn!(error = %e, "remote save failed; fallback answer not learned");
                false
            }
        }
    }

    async fn respond(
        &self,
        text: String,
        source: ReplySource,
        policy: &RecallPolicy,
        mut auth_expired: bool,
    ) -> Reply {
        tracing::Span::current().record("source", tracing::field::debug(source));
        let mut speech = text.clone();
        if self.config.synthesize_speech
            && let Some(credential) = policy.credential()
        {
            match self
                .bounded(self.remote.synthesize_speech(credential, &text))
                .await
            {
                Ok(Some(alternate)) => speech = alternate,
                Ok(None) => {}
                Err(JarvisError::AuthenticationExpired) => {
                    warn!("remote rejected credential during speech synthesis");
                    auth_expired = true;
                }
                Err(e) => debug!(error = %e, "speech synthesis unavailable; speaking display text"),
            }
        }
        Reply {
            text,
            speech,
            source,
            auth_expired,
        }
    }

    fn learn_locally(&self, input: &str, response: &str) {
        if let Err(e) = self.with_store(|store| store.learn(input, response)) {
            warn!(error = %e, "failed to persist learned response");
        }
    }

    fn with_store<R>(&self, f: impl FnOnce(&mut KnowledgeStore) -> R) -> R {
        let mut guard = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, JarvisError>>,
    ) -> Result<T, JarvisError> {
        match tokio::time::timeout(self.config.remote_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(JarvisError::RemoteUnavailable(format!(
                "remote call timed out after {:?}",
                self.config.remote_timeout
            ))),
        }
    }
}

fn remote_status(result: Result<(), JarvisError>, operation: &str) -> RemoteStatus {
    match result {
        Ok(()) => RemoteStatus::Synced,
        Err(JarvisError::AuthenticationExpired) => {
            warn!(operation, "remote rejected credential");
            RemoteStatus::AuthExpired
        }
        Err(e) => {
            warn!(operation, error = %e, "remote write failed");
            RemoteStatus::Unavailable
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
