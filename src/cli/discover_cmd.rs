//! `portalta discover` — show the ranked candidate list without fetching
//! any of the candidates.

use crate::config::PortalConfig;
use crate::discover;
use crate::fetch::FetchClient;
use crate::model::{AcquisitionRequest, RecordKind};
use anyhow::Result;
use tokio_util::sync::CancellationToken;

pub async fn run(
    organism: &str,
    area: &str,
    year: i32,
    month: Option<u32>,
    kind: RecordKind,
    base_url: Option<&str>,
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

    let client = FetchClient::new(&cfg, CancellationToken::new());
    let candidates = discover::discover(&request, &cfg, &client).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&candidates)?);
        return Ok(());
    }

    if candidates.is_empty() {
        println!("No candidate sources found.");
        return Ok(());
    }
    println!("{} candidate sources:", candidates.len());
    for c in &candidates {
        println!("  [{}] {:?}/{:?} {}", c.rank(), c.method, c.hint, c.url);
    }
    Ok(())
}
