//! Peer URL canonicalization.
//!
//! Peers identify each other by base URL. Everything downstream — the
//! registry map, the persisted peer table, self-exclusion — compares these
//! strings, so they are normalized once at intake: trimmed, scheme-checked,
//! trailing slashes dropped. `http://10.0.0.1:9470/` and
//! `http://10.0.0.1:9470` are the same peer.

use crate::NetworkError;

/// Canonicalize a peer base URL.
///
/// Rejects anything that is not plain `http://` or `https://` with a host,
/// or that carries a query or fragment (base URLs only; request paths are
/// appended per call).
pub fn canonical_peer_url(raw: &str) -> Result<String, NetworkError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(NetworkError::InvalidUrl("empty url".into()));
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(NetworkError::InvalidUrl(format!(
            "whitespace in url: {trimmed:?}"
        )));
    }

    let rest = trimmed
        .strip_prefix("http://")
        .or_else(|| trimmed.strip_prefix("https://"))
        .ok_or_else(|| {
            NetworkError::InvalidUrl(format!("missing http(s) scheme: {trimmed}"))
        })?;

    let host = rest.split('/').next().unwrap_or("");
    if host.is_empty() {
        return Err(NetworkError::InvalidUrl(format!("missing host: {trimmed}")));
    }
    if rest.contains('?') || rest.contains('#') {
        return Err(NetworkError::InvalidUrl(format!(
            "query or fragment in base url: {trimmed}"
        )));
    }

    Ok(trimmed.trim_end_matches('/').to_string())
}
