//! `jarvis-runtime` – The Recall Pipeline
//!
//! Decides, for every utterance, whether the answer comes from the user's
//! remote memory, the local knowledge store, or the rule-based responder,
//! and feeds fallback answers back into memory so they are recalled next
//! time.
//!
//! # Modules
//!
//! - [`coordinator`] – [`RecallCoordinator`][coordinator::RecallCoordinator]:
//!   the RemoteLookup → LocalLookup → Fallback → Learn → Respond pipeline,
//!   plus manual teaching and feedback forwarding.  Remote calls are bounded
//!   by [`CoordinatorConfig::remote_timeout`][coordinator::CoordinatorConfig].
//! - [`remote`] – [`RemoteMemory`][remote::RemoteMemory] and its
//!   JSON-over-HTTP implementation
//!   [`HttpRemoteMemory`][remote::HttpRemoteMemory] (bearer-token auth;
//!   401/403 map to an expired credential).
//! - [`responder`] – the [`Responder`][responder::Responder] contract for the
//!   fallback command processor.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.  Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable trace export.

pub mod coordinator;
pub mod remote;
pub mod responder;
pub mod telemetry;

pub use coordinator::{CoordinatorConfig, RecallCoordinator, RecallPolicy, REMOTE_ACCEPT_THRESHOLD};
pub use remote::{HttpRemoteMemory, RemoteMemory};
pub use responder::Responder;
pub use telemetry::{init_tracing, TracerProviderGuard};
