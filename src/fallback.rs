//! Seam for the heavyweight acquisition path.
//!
//! When every lightweight strategy misses, the orchestrator escalates to
//! whatever implements [`HeavyFallback`] — typically a headless browser
//! driver living in another crate. This crate ships only the no-op
//! implementation; escalation with it simply reports that no heavy path is
//! configured.

use crate::model::{AcquisitionRequest, CanonicalRecord};
use async_trait::async_trait;

/// Heavyweight last-resort acquirer, invoked only after the lightweight
/// chain has come up empty.
#[async_trait]
pub trait HeavyFallback: Send + Sync {
    /// Render the request's section however necessary and return normalized
    /// records. An `Err` marks the whole acquisition as failed-over.
    async fn render_and_extract(
        &self,
        request: &AcquisitionRequest,
    ) -> anyhow::Result<Vec<CanonicalRecord>>;

    /// Short name for the outcome trail.
    fn name(&self) -> &str {
        "heavy_fallback"
    }
}

/// Fallback used when no browser driver is wired in.
pub struct NoopFallback;

#[async_trait]
impl HeavyFallback for NoopFallback {
    async fn render_and_extract(
        &self,
        _request: &AcquisitionRequest,
    ) -> anyhow::Result<Vec<CanonicalRecord>> {
        anyhow::bail!("no heavy fallback configured")
    }

    fn name(&self) -> &str {
        "noop"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecordKind;

    #[tokio::test]
    async fn test_noop_fallback_errors() {
        let request = AcquisitionRequest {
            organism: "MU280".into(),
            area: "Salud".into(),
            year: 2025,
            month: Some(3),
            kind: RecordKind::FeeBased,
        };
        let err = NoopFallback.render_and_extract(&request).await.unwrap_err();
        assert!(err.to_string().contains("no heavy fallback"));
    }
}
