//! Lightweight extraction strategies, cheapest first.
//!
//! For one candidate source the driver runs the chain: fetch the URL
//! directly, parse it as a structured file if it is one, otherwise pick the
//! best HTML table and walk its pagination, and as a last resort sniff the
//! page for embedded data endpoints. The first strategy that yields a
//! non-empty table wins; the ones that missed leave failure entries in the
//! outcome trail.

pub mod endpoint;
pub mod file;
pub mod html_table;
pub mod paginate;

use crate::config::PortalConfig;
use crate::diagnostics::{capture, label_for, DiagnosticsSink};
use crate::error::AcquireError;
use crate::fetch::FetchClient;
use crate::model::{CandidateSource, ExtractedTable, RecordKind, StrategyOutcome};
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub const STRATEGY_DIRECT: &str = "direct_url";
pub const STRATEGY_FILE: &str = "structured_file";
pub const STRATEGY_HTML: &str = "html_table";
pub const STRATEGY_ENDPOINT: &str = "embedded_endpoint";

/// Shared state for one candidate attempt.
pub struct StrategyContext<'a> {
    pub client: &'a FetchClient,
    pub cfg: &'a PortalConfig,
    pub kind: RecordKind,
    pub organism: &'a str,
    pub sink: &'a dyn DiagnosticsSink,
    pub cancel: &'a CancellationToken,
}

/// A table extracted by one of the lightweight strategies.
pub struct StrategyHit {
    /// Which strategy produced the table.
    pub strategy: &'static str,
    pub table: ExtractedTable,
    /// The URL the winning payload actually came from.
    pub source_url: String,
}

/// Run the strategy chain against one candidate.
///
/// Strategies that do not apply or come up empty append failure entries to
/// `trail`; a fetch error on the candidate itself is returned so the caller
/// can classify it. `Ok(None)` means every lightweight strategy missed.
pub async fn acquire(
    candidate: &CandidateSource,
    ctx: &StrategyContext<'_>,
    trail: &mut Vec<StrategyOutcome>,
) -> Result<Option<StrategyHit>, AcquireError> {
    if ctx.cancel.is_cancelled() {
        return Err(AcquireError::Cancelled);
    }

    let payload = match ctx.client.fetch(&candidate.url).await {
        Ok(p) => p,
        Err(e) => {
            trail.push(StrategyOutcome::failure(
                STRATEGY_DIRECT,
                Some(&candidate.url),
                e.to_string(),
            ));
            return Err(e);
        }
    };
    let label = label_for(&payload.url, ctx.kind.section_key());
    capture(ctx.sink, ctx.organism, &label, &payload).await;

    // Structured file: CSV, semicolon-delimited text, Excel
    let parsed = match file::parse_file(&payload) {
        Ok(parsed) => parsed,
        Err(e) => {
            // A tabular payload that will not parse is a dead candidate;
            // say so in the trail before handing the error up.
            trail.push(StrategyOutcome::failure(
                STRATEGY_FILE,
                Some(&payload.url),
                e.to_string(),
            ));
            return Err(e);
        }
    };
    match parsed {
        Some(table) if !table.is_empty() => {
            info!(url = payload.url, rows = table.rows.len(), "structured file hit");
            return Ok(Some(StrategyHit {
                strategy: STRATEGY_FILE,
                table,
                source_url: payload.url,
            }));
        }
        Some(_) => {
            trail.push(StrategyOutcome::failure(
                STRATEGY_FILE,
                Some(&payload.url),
                "file parsed but contained no data rows",
            ));
            return Ok(None);
        }
        None => {}
    }

    let media = payload.media_type();
    if media.as_deref() == Some("application/json") {
        // A candidate that is itself a JSON endpoint
        if let Some(table) = endpoint::json_to_table(&payload.bytes) {
            if !table.is_empty() {
                return Ok(Some(StrategyHit {
                    strategy: STRATEGY_ENDPOINT,
                    table,
                    source_url: payload.url,
                }));
            }
        }
        trail.push(StrategyOutcome::failure(
            STRATEGY_ENDPOINT,
            Some(&payload.url),
            "JSON response held no recognizable rows",
        ));
        return Ok(None);
    }

    let (html, _) = file::decode_text(&payload);

    // HTML table plus pagination
    match collect_paged_table(&html, &payload.url, ctx).await? {
        Some((table, pages)) if !table.is_empty() => {
            info!(
                url = payload.url,
                rows = table.rows.len(),
                pages,
                "html table hit"
            );
            return Ok(Some(StrategyHit {
                strategy: STRATEGY_HTML,
                table,
                source_url: payload.url,
            }));
        }
        _ => {
            let reason = if html_table::page_requires_js(&html) {
                "no matching table; page appears to render client-side"
            } else {
                "no table matched the expected headers"
            };
            trail.push(StrategyOutcome::failure(
                STRATEGY_HTML,
                Some(&payload.url),
                reason,
            ));
        }
    }

    // Embedded endpoint sniff
    if let Some(hit) = probe_endpoints(&html, &payload.url, ctx).await? {
        return Ok(Some(hit));
    }
    trail.push(StrategyOutcome::failure(
        STRATEGY_ENDPOINT,
        Some(&payload.url),
        "no embedded endpoint yielded a table",
    ));
    Ok(None)
}

/// Extract the best table from a page and keep appending rows while a next
/// page exists. Bounded by the pagination depth cap and a visited set, so a
/// paginator that loops back terminates.
async fn collect_paged_table(
    first_html: &str,
    first_url: &str,
    ctx: &StrategyContext<'_>,
) -> Result<Option<(ExtractedTable, usize)>, AcquireError> {
    let min = ctx.cfg.min_header_matches;
    let Some(mut table) = html_table::extract_best_table(first_html, ctx.kind, min) else {
        return Ok(None);
    };

    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(first_url.to_string());
    let mut current_html = first_html.to_string();
    let mut current_url = first_url.to_string();
    let mut pages = 1usize;

    while pages < ctx.cfg.max_pages {
        if ctx.cancel.is_cancelled() {
            return Err(AcquireError::Cancelled);
        }
        let Some(next) = paginate::find_next_url(&current_html, &current_url) else {
            break;
        };
        if !visited.insert(next.clone()) {
            debug!(url = next, "pagination cycle, stopping");
            break;
        }

        let payload = match ctx.client.fetch(&next).await {
            Ok(p) => p,
            Err(AcquireError::Cancelled) => return Err(AcquireError::Cancelled),
            Err(e) => {
                // Keep what we have; a broken later page is not fatal
                debug!(url = next, error = %e, "pagination fetch failed");
                break;
            }
        };
        let label = label_for(&payload.url, ctx.kind.section_key());
        capture(ctx.sink, ctx.organism, &label, &payload).await;

        let (html, _) = file::decode_text(&payload);
        let Some(page_table) = html_table::extract_best_table(&html, ctx.kind, min) else {
            break;
        };
        if page_table.rows.is_empty() {
            break;
        }
        table.rows.extend(page_table.rows);
        pages += 1;
        current_html = html;
        current_url = next;
    }

    Ok(Some((table, pages)))
}

/// Probe sniffed endpoints until one yields a table, bounded by the probe
/// cap. Individual probe failures are logged and skipped.
async fn probe_endpoints(
    html: &str,
    page_url: &str,
    ctx: &StrategyContext<'_>,
) -> Result<Option<StrategyHit>, AcquireError> {
    let endpoints = endpoint::discover_endpoints(html, page_url);
    for url in endpoints.into_iter().take(ctx.cfg.max_endpoint_probes) {
        if ctx.cancel.is_cancelled() {
            return Err(AcquireError::Cancelled);
        }
        let payload = match ctx.client.fetch(&url).await {
            Ok(p) => p,
            Err(AcquireError::Cancelled) => return Err(AcquireError::Cancelled),
            Err(e) => {
                debug!(url, error = %e, "endpoint probe failed");
                continue;
            }
        };
        let label = label_for(&payload.url, ctx.kind.section_key());
        capture(ctx.sink, ctx.organism, &label, &payload).await;

        if let Some(table) = endpoint::json_to_table(&payload.bytes) {
            if !table.is_empty() {
                info!(url = payload.url, rows = table.rows.len(), "endpoint hit");
                return Ok(Some(StrategyHit {
                    strategy: STRATEGY_ENDPOINT,
                    table,
                    source_url: payload.url,
                }));
            }
        }
        if let Ok(Some(table)) = file::parse_file(&payload) {
            if !table.is_empty() {
                return Ok(Some(StrategyHit {
                    strategy: STRATEGY_ENDPOINT,
                    table,
                    source_url: payload.url,
                }));
            }
        }
        let (text, _) = file::decode_text(&payload);
        if let Some(table) =
            html_table::extract_best_table(&text, ctx.kind, ctx.cfg.min_header_matches)
        {
            if !table.is_empty() {
                return Ok(Some(StrategyHit {
                    strategy: STRATEGY_ENDPOINT,
                    table,
                    source_url: payload.url,
                }));
            }
        }
    }
    Ok(None)
}
