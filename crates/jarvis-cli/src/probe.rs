//! Remote memory reachability probe for `/status` and startup.
//!
//! Issues one blocking `GET /api/recall` against the configured service.
//! Must be called outside the Tokio runtime.

use reqwest::StatusCode;

/// What the probe learned about the remote memory service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Reachable and the token (if any) was accepted.
    Online,
    /// Reachable, but the token was rejected or missing.
    Unauthorized,
    /// Unreachable or misbehaving.
    Offline(String),
}

fn classify(status: StatusCode) -> ProbeOutcome {
    if status.is_success() {
        ProbeOutcome::Online
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        ProbeOutcome::Unauthorized
    } else {
        ProbeOutcome::Offline(format!("server returned HTTP {status}"))
    }
}

/// Probe the service at `base_url`, authenticating with `token` when given.
pub fn probe(base_url: &str, token: Option<&str>) -> ProbeOutcome {
    let url = format!("{}/api/recall", base_url.trim_end_matches('/'));
    let client = match reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(3))
        .build()
    {
        Ok(c) => c,
        Err(e) => return ProbeOutcome::Offline(format!("HTTP client unavailable: {e}")),
    };
    let mut request = client.get(&url);
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        request = request.bearer_auth(token);
    }
    match request.send() {
        Ok(response) => classify(response.status()),
        Err(e) => ProbeOutcome::Offline(format!("unreachable at {url}: {e}")),
    }
}
