//! Error taxonomy for the acquisition pipeline.
//!
//! Candidate-level failures (`Transient`, `Permanent`, `SchemaMismatch`) are
//! recorded in the outcome trail and never abort a request. Only a request
//! where every candidate and the heavy fallback came up empty surfaces as a
//! non-success result, and even that is reported, not raised, to the caller.

use crate::model::RecordKind;
use thiserror::Error;

/// Failures the pipeline distinguishes between when deciding whether to
/// retry, skip a candidate, or escalate.
#[derive(Debug, Error)]
pub enum AcquireError {
    /// Timeout, connection reset, or 5xx. Retried up to the configured
    /// limit, then treated as a candidate failure.
    #[error("transient fetch failure for {url}: {reason}")]
    Transient { url: String, reason: String },

    /// 4xx, malformed URL, redirect limit exceeded, or a tabular payload
    /// that will not parse. Never retried.
    #[error("permanent fetch failure for {url}: {reason}")]
    Permanent { url: String, reason: String },

    /// A candidate produced a table, but too few required columns for the
    /// record kind could be mapped.
    #[error("table does not match {kind} schema: {reason}")]
    SchemaMismatch { kind: RecordKind, reason: String },

    /// The discoverer found nothing to try. Triggers escalation, not a
    /// hard error.
    #[error("no candidate sources discovered")]
    NoCandidates,

    /// The heavy browser-rendering fallback also failed or returned
    /// nothing. Terminal for the request.
    #[error("escalation failed: {0}")]
    EscalationFailed(String),

    /// The injected cancellation signal fired mid-request.
    #[error("request cancelled")]
    Cancelled,
}

impl AcquireError {
    /// Whether this error should be retried by the fetch client.
    pub fn is_transient(&self) -> bool {
        matches!(self, AcquireError::Transient { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let e = AcquireError::Transient {
            url: "https://example.com".into(),
            reason: "timeout".into(),
        };
        assert!(e.is_transient());
        assert!(!AcquireError::NoCandidates.is_transient());
    }

    #[test]
    fn test_display_includes_url() {
        let e = AcquireError::Permanent {
            url: "https://example.com/x".into(),
            reason: "404".into(),
        };
        let msg = format!("{e}");
        assert!(msg.contains("https://example.com/x"));
        assert!(msg.contains("404"));
    }
}
