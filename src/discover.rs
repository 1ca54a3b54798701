//! Candidate source discovery.
//!
//! Builds the ranked list of URLs worth trying for a request: deep links
//! constructed from the portal's known URL templates, plus whatever the
//! section's entry page links to: file downloads, section anchors, and
//! endpoints buried in markup. Discovery degrades rather than fails: if the
//! entry page is unreachable, the template candidates still go out.

use crate::config::PortalConfig;
use crate::fetch::FetchClient;
use crate::model::{
    AcquisitionRequest, CandidateSource, DiscoveryMethod, RecordKind, SourceHint,
};
use crate::strategy::{endpoint, file};
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

/// Anchor texts that identify a section landing link, per record kind.
fn section_labels(kind: RecordKind) -> &'static [&'static str] {
    match kind {
        RecordKind::Payroll => &["personal de planta", "planta"],
        RecordKind::Contract => &["personal a contrata", "contrata"],
        RecordKind::FeeBased => &[
            "personas naturales contratadas a honorarios",
            "contrataciones a honorarios",
            "honorarios",
        ],
        RecordKind::SalaryScale => &[
            "escala de remuneraciones",
            "escalas de remuneraciones",
            "escala",
        ],
    }
}

/// Produce the ranked candidate list for a request.
///
/// Never returns an error; an unreachable entry page just means the list
/// holds only template-derived candidates.
pub async fn discover(
    request: &AcquisitionRequest,
    cfg: &PortalConfig,
    client: &FetchClient,
) -> Vec<CandidateSource> {
    let mut candidates = template_candidates(request, cfg);

    let entry_url = cfg.section_url(&request.organism, request.year, &request.area, request.kind);
    match client.fetch(&entry_url).await {
        Ok(payload) => {
            let (html, _) = file::decode_text(&payload);
            candidates.extend(parse_entry_page(&html, &payload.url, request));
        }
        Err(e) => {
            warn!(url = entry_url, error = %e, "entry page unreachable, discovery degraded");
        }
    }

    dedup_and_rank(candidates)
}

/// Deep links the portal's URL grammar lets us construct without fetching
/// anything.
pub fn template_candidates(
    request: &AcquisitionRequest,
    cfg: &PortalConfig,
) -> Vec<CandidateSource> {
    let mut out = Vec::new();
    let mut push = |url: String| {
        out.push(CandidateSource {
            url,
            hint: SourceHint::Unknown,
            method: DiscoveryMethod::UrlTemplate,
        });
    };

    let (org, year, area, kind) = (&request.organism, request.year, &request.area, request.kind);
    if let Some(month) = request.month {
        push(cfg.month_url(org, year, area, kind, month));
        push(cfg.numeric_month_url(org, year, area, kind, month));
        push(cfg.query_url(org, year, kind, month));
    }
    push(cfg.section_url(org, year, area, kind));
    out
}

/// Pull candidates out of a fetched entry page.
pub fn parse_entry_page(
    html: &str,
    page_url: &str,
    request: &AcquisitionRequest,
) -> Vec<CandidateSource> {
    let Ok(base) = Url::parse(page_url) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    let anchors = Selector::parse("a[href]").expect("valid selector");
    let labels = section_labels(request.kind);

    let mut out = Vec::new();
    for a in document.select(&anchors) {
        let Some(href) = a.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty() || href == "#" || href.to_lowercase().starts_with("javascript:") {
            continue;
        }
        let Ok(resolved) = base.join(href) else {
            continue;
        };
        let url = resolved.to_string();

        if file::is_tabular_url(&url) {
            out.push(CandidateSource {
                url,
                hint: SourceHint::File,
                method: DiscoveryMethod::FileLink,
            });
            continue;
        }

        let text = a.text().collect::<Vec<_>>().join(" ");
        let text = text.trim().to_lowercase();
        if labels.iter().any(|l| text.contains(l)) {
            out.push(CandidateSource {
                url,
                hint: SourceHint::HtmlTable,
                method: DiscoveryMethod::SectionLabel,
            });
        }
    }

    // Endpoints in scripts and attributes that mention this organism or
    // period are worth probing directly.
    let year = request.year.to_string();
    for url in endpoint::discover_endpoints(html, page_url) {
        if url.contains(request.organism.as_str()) || url.contains(&year) {
            out.push(CandidateSource {
                url,
                hint: SourceHint::Unknown,
                method: DiscoveryMethod::EmbeddedEndpoint,
            });
        }
    }

    debug!(count = out.len(), page_url, "entry page candidates");
    out
}

/// Drop duplicate URLs (first mention wins) and order by rank. The sort is
/// stable, so equally ranked candidates keep discovery order.
pub fn dedup_and_rank(mut candidates: Vec<CandidateSource>) -> Vec<CandidateSource> {
    let mut seen = std::collections::HashSet::new();
    candidates.retain(|c| seen.insert(c.url.clone()));
    candidates.sort_by_key(|c| c.rank());
    candidates
}
