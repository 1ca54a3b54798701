//! HTML table extraction without assuming a fixed page layout.
//!
//! Enumerates every `<table>` in the document, scores each by how many of
//! its header cells match the expected column vocabulary for the record
//! kind, and extracts the best-scoring table above the threshold. Selection
//! is deterministic: highest score wins regardless of document order, ties
//! broken by larger row count.

use crate::model::{ExtractedTable, RecordKind};
use crate::normalize::aliases::{expected_headers, normalize_header};
use scraper::{ElementRef, Html, Selector};

/// Pick and extract the best-matching data table from an HTML document.
///
/// Returns `None` when no table clears `min_matches` expected headers —
/// the "this strategy does not apply" signal, never an error.
pub fn extract_best_table(
    html: &str,
    kind: RecordKind,
    min_matches: usize,
) -> Option<ExtractedTable> {
    let document = Html::parse_document(html);
    let table_sel = Selector::parse("table").expect("valid selector");
    let vocab = expected_headers(kind);

    let mut best: Option<(usize, usize, ExtractedTable)> = None;

    for table in document.select(&table_sel) {
        let headers = extract_headers(&table);
        if headers.is_empty() {
            continue;
        }
        // Word-level match per cell: "rut" must not count inside "bruta",
        // and keywords must not match across cell boundaries
        let score = headers
            .iter()
            .map(|h| normalize_header(h))
            .filter(|h| h.split_whitespace().any(|w| vocab.contains(&w)))
            .count();
        if score < min_matches {
            continue;
        }

        let rows = extract_rows(&table, headers.len());
        let better = match &best {
            None => true,
            Some((s, r, _)) => score > *s || (score == *s && rows.len() > *r),
        };
        if better {
            best = Some((score, rows.len(), ExtractedTable { headers, rows }));
        }
    }

    best.map(|(_, _, t)| t)
}

/// Column headers from `<thead>` cells, falling back to the first row.
/// A first row of all-numeric cells is data, not headers.
fn extract_headers(table: &ElementRef<'_>) -> Vec<String> {
    let thead_cells = Selector::parse("thead th, thead td").expect("valid selector");
    let headers = expand_colspan(table.select(&thead_cells));
    if !headers.is_empty() {
        return headers;
    }

    let tr = Selector::parse("tr").expect("valid selector");
    let cells = Selector::parse("th, td").expect("valid selector");
    let Some(first_row) = table.select(&tr).next() else {
        return Vec::new();
    };
    let candidate = expand_colspan(first_row.select(&cells));
    let looks_like_data = candidate
        .iter()
        .filter(|c| !c.is_empty())
        .all(|c| c.replace(['.', ','], "").chars().all(|ch| ch.is_ascii_digit()));
    if candidate.is_empty() || looks_like_data {
        return Vec::new();
    }
    candidate
}

/// Cell texts with colspan expansion, so header count matches the data
/// column count. A `colspan=N` cell emits its text once plus N-1 numbered
/// padding entries.
fn expand_colspan<'a>(cells: impl Iterator<Item = ElementRef<'a>>) -> Vec<String> {
    let mut out = Vec::new();
    for cell in cells {
        let text = cell_text(&cell);
        let colspan: usize = cell
            .value()
            .attr("colspan")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(1);
        out.push(text.clone());
        for i in 1..colspan {
            out.push(format!("{text} ({})", i + 1));
        }
    }
    out
}

fn extract_rows(table: &ElementRef<'_>, _width: usize) -> Vec<Vec<String>> {
    let tbody_tr = Selector::parse("tbody tr").expect("valid selector");
    let tr = Selector::parse("tr").expect("valid selector");
    let cells = Selector::parse("td, th").expect("valid selector");

    let has_tbody = table.select(&tbody_tr).next().is_some();
    let row_iter: Box<dyn Iterator<Item = ElementRef<'_>>> = if has_tbody {
        Box::new(table.select(&tbody_tr))
    } else {
        // No tbody: first tr is the header row
        Box::new(table.select(&tr).skip(1))
    };

    let mut rows = Vec::new();
    for row in row_iter {
        let values: Vec<String> = row.select(&cells).map(|c| cell_text(&c)).collect();
        if values.is_empty() || values.iter().all(|v| v.trim().is_empty()) {
            continue;
        }
        rows.push(values);
    }
    rows
}

fn cell_text(el: &ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").trim().to_string()
}

/// Heuristic for pages that render their data client-side: JSF/portlet
/// markers with no populated tables, or a near-empty body. Used to explain
/// a lightweight miss in the outcome trail before escalation.
pub fn page_requires_js(html: &str) -> bool {
    let document = Html::parse_document(html);

    let table_tr = Selector::parse("table tr").expect("valid selector");
    let populated_tables = document.select(&table_tr).count() > 3;
    if populated_tables {
        return false;
    }

    let lower = html.to_lowercase();
    if lower.contains("javax.faces") || lower.contains("liferay") || lower.contains("portlet") {
        return true;
    }

    let body_sel = Selector::parse("body").expect("valid selector");
    if let Some(body) = document.select(&body_sel).next() {
        let text: String = body.text().collect::<Vec<_>>().join(" ");
        return text.trim().len() < 200;
    }
    false
}
