//! Acquisition orchestration: discovery, the lightweight strategy chain,
//! and escalation to the heavy fallback.
//!
//! One `run` call owns one request end to end. It never returns an error;
//! every failure mode lands in the outcome trail of the returned
//! [`AcquisitionResult`], so the caller always learns what was tried and
//! why the pipeline stopped where it did.

use crate::config::PortalConfig;
use crate::diagnostics::{DiagnosticsSink, FileSink, NullSink};
use crate::discover;
use crate::error::AcquireError;
use crate::fallback::{HeavyFallback, NoopFallback};
use crate::fetch::FetchClient;
use crate::model::{
    AcquisitionRequest, AcquisitionResult, CanonicalRecord, StrategyOutcome,
};
use crate::normalize;
use crate::strategy::{self, StrategyContext};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Coordinates one acquisition at a time; cheap to clone via `Arc` fields,
/// safe to share across concurrent requests since each run builds its own
/// HTTP client.
pub struct Orchestrator {
    cfg: PortalConfig,
    sink: Arc<dyn DiagnosticsSink>,
    fallback: Arc<dyn HeavyFallback>,
    cancel: CancellationToken,
}

impl Orchestrator {
    /// Orchestrator with payload capture under the configured data dir and
    /// no heavy fallback wired in.
    pub fn new(cfg: PortalConfig) -> Self {
        let sink = Arc::new(FileSink::new(cfg.data_dir.clone()));
        Self {
            cfg,
            sink,
            fallback: Arc::new(NoopFallback),
            cancel: CancellationToken::new(),
        }
    }

    /// Orchestrator that keeps no diagnostics. Used in tests.
    pub fn without_capture(cfg: PortalConfig) -> Self {
        Self {
            cfg,
            sink: Arc::new(NullSink),
            fallback: Arc::new(NoopFallback),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticsSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn HeavyFallback>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run one request through the pipeline.
    ///
    /// The heavy fallback fires only when the lightweight chain produced
    /// zero records, and `escalated` is set whenever it fired, successful
    /// or not. Cancellation stops the run where it stands.
    pub async fn run(&self, request: &AcquisitionRequest) -> AcquisitionResult {
        info!(
            organism = request.organism,
            year = request.year,
            month = request.month,
            kind = %request.kind,
            "acquisition start"
        );
        let client = FetchClient::new(&self.cfg, self.cancel.clone());
        let mut trail: Vec<StrategyOutcome> = Vec::new();

        let candidates = discover::discover(request, &self.cfg, &client).await;
        info!(count = candidates.len(), "candidates discovered");

        let mut records: Vec<CanonicalRecord> = Vec::new();
        let mut cancelled = false;

        if candidates.is_empty() {
            trail.push(StrategyOutcome::failure(
                "discovery",
                None,
                AcquireError::NoCandidates.to_string(),
            ));
        }

        let ctx = StrategyContext {
            client: &client,
            cfg: &self.cfg,
            kind: request.kind,
            organism: &request.organism,
            sink: self.sink.as_ref(),
            cancel: &self.cancel,
        };

        for candidate in &candidates {
            match strategy::acquire(candidate, &ctx, &mut trail).await {
                Ok(Some(hit)) => match normalize::normalize(&hit.table, request.kind) {
                    Ok(normalized) if !normalized.is_empty() => {
                        trail.push(StrategyOutcome::success(
                            hit.strategy,
                            &hit.source_url,
                            normalized.len(),
                        ));
                        records = normalized;
                        break;
                    }
                    Ok(_) => {
                        trail.push(StrategyOutcome::failure(
                            hit.strategy,
                            Some(&hit.source_url),
                            "table normalized to zero records",
                        ));
                    }
                    Err(e) => {
                        trail.push(StrategyOutcome::failure(
                            hit.strategy,
                            Some(&hit.source_url),
                            e.to_string(),
                        ));
                    }
                },
                Ok(None) => {}
                Err(AcquireError::Cancelled) => {
                    trail.push(StrategyOutcome::failure(
                        "orchestrator",
                        Some(&candidate.url),
                        AcquireError::Cancelled.to_string(),
                    ));
                    cancelled = true;
                    break;
                }
                // Fetch-level failure already in the trail; try the next
                // candidate.
                Err(_) => {}
            }
        }

        let mut escalated = false;
        if records.is_empty() && !cancelled {
            escalated = true;
            info!(fallback = self.fallback.name(), "escalating to heavy fallback");
            match self.fallback.render_and_extract(request).await {
                Ok(heavy) => {
                    trail.push(StrategyOutcome {
                        strategy: self.fallback.name().to_string(),
                        candidate_url: None,
                        success: true,
                        record_count: heavy.len(),
                        failure_reason: None,
                    });
                    records = heavy;
                }
                Err(e) => {
                    warn!(error = %e, "heavy fallback failed");
                    trail.push(StrategyOutcome::failure(
                        self.fallback.name(),
                        None,
                        AcquireError::EscalationFailed(e.to_string()).to_string(),
                    ));
                }
            }
        }

        fill_scale_years(&mut records, request.year);
        info!(
            records = records.len(),
            attempts = trail.len(),
            escalated,
            "acquisition done"
        );
        AcquisitionResult {
            request: request.clone(),
            records,
            trail,
            escalated,
        }
    }
}

/// Salary scale rows that carried no vigency column inherit the request
/// year.
fn fill_scale_years(records: &mut [CanonicalRecord], year: i32) {
    for record in records {
        if let CanonicalRecord::SalaryScale(scale) = record {
            if scale.effective_year == 0 {
                scale.effective_year = year;
            }
        }
    }
}
