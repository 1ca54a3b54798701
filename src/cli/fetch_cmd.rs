//! `portalta fetch` — run one acquisition end to end and print the result.

use crate::config::PortalConfig;
use crate::model::{AcquisitionRequest, RecordKind};
use crate::orchestrator::Orchestrator;
use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    organism: &str,
    area: &str,
    year: i32,
    month: Option<u32>,
    kind: RecordKind,
    base_url: Option<&str>,
    out: Option<&PathBuf>,
    no_capture: bool,
    json: bool,
) -> Result<()> {
    let mut cfg = PortalConfig::default();
    if let Some(base) = base_url {
        cfg.base_url = base.trim_end_matches('/').to_string();
    }

    let request = AcquisitionRequest {
        organism: organism.to_string(),
        area: area.to_string(),
        year,
        month,
        kind,
    };

    let cancel = CancellationToken::new();
    let orchestrator = if no_capture {
        Orchestrator::without_capture(cfg)
    } else {
        Orchestrator::new(cfg)
    }
    .with_cancel(cancel.clone());

    // Ctrl-C cancels the run instead of killing it mid-fetch
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let result = orchestrator.run(&request).await;

    if let Some(path) = out {
        let body = serde_json::to_string_pretty(&result)?;
        tokio::fs::write(path, body)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        if !json {
            println!("Wrote {} records to {}", result.records.len(), path.display());
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result);
    }

    if result.records.is_empty() {
        anyhow::bail!("acquisition produced no records");
    }
    Ok(())
}

fn print_summary(result: &crate::model::AcquisitionResult) {
    println!(
        "{} {} {} {} -> {} records{}",
        result.request.organism,
        result.request.kind,
        result.request.year,
        result
            .request
            .month
            .map(|m| m.to_string())
            .unwrap_or_else(|| "-".into()),
        result.records.len(),
        if result.escalated { " (escalated)" } else { "" }
    );
    for outcome in &result.trail {
        let mark = if outcome.success { "ok " } else { "fail" };
        let detail = outcome
            .failure_reason
            .as_deref()
            .or(outcome.candidate_url.as_deref())
            .unwrap_or("");
        println!("  [{mark}] {:<18} {detail}", outcome.strategy);
    }
}
