//! Embedded-endpoint sniffing: the strategy of last resort before a
//! browser.
//!
//! Pages that render their table client-side still have to name the data
//! source somewhere in the markup. This module scrapes script bodies, form
//! actions, `data-*` attributes, and iframes for URLs that smell like data
//! endpoints, and converts the common JSON envelope shapes into an untyped
//! table.

use crate::model::ExtractedTable;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use std::sync::OnceLock;
use url::Url;

/// `data-*` attributes that carry endpoint URLs in the wild.
const DATA_ATTRS: &[&str] = &["data-url", "data-source", "data-ajax-url", "data-href"];

/// JSON envelope keys whose value holds the row array.
const ROW_KEYS: &[&str] = &["data", "rows", "records", "items", "results", "content"];

fn endpoint_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"["']((?:https?://|/)[^"'\s]*(?i:json|ajax|data|export|api|rest)[^"'\s]*)["']"#)
            .expect("valid regex")
    })
}

/// Collect candidate data-endpoint URLs from a page: script bodies first,
/// then form actions, `data-*` attributes, and iframes. Deduplicated and
/// resolved against the page URL. The caller bounds how many get probed.
pub fn discover_endpoints(html: &str, page_url: &str) -> Vec<String> {
    let Ok(base) = Url::parse(page_url) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    let mut out: Vec<String> = Vec::new();

    let mut push = |raw: &str| {
        let raw = raw.trim();
        if raw.is_empty() || raw == "#" || raw.to_lowercase().starts_with("javascript:") {
            return;
        }
        if let Ok(resolved) = base.join(raw) {
            let resolved = resolved.to_string();
            if resolved != page_url && !out.contains(&resolved) {
                out.push(resolved);
            }
        }
    };

    let scripts = Selector::parse("script").expect("valid selector");
    for script in document.select(&scripts) {
        let body: String = script.text().collect();
        for cap in endpoint_re().captures_iter(&body) {
            push(&cap[1]);
        }
    }

    let forms = Selector::parse("form[action]").expect("valid selector");
    for form in document.select(&forms) {
        if let Some(action) = form.value().attr("action") {
            push(action);
        }
    }

    for attr in DATA_ATTRS {
        let sel = Selector::parse(&format!("[{attr}]")).expect("valid selector");
        for el in document.select(&sel) {
            if let Some(value) = el.value().attr(attr) {
                push(value);
            }
        }
    }

    let iframes = Selector::parse("iframe[src]").expect("valid selector");
    for iframe in document.select(&iframes) {
        if let Some(src) = iframe.value().attr("src") {
            push(src);
        }
    }

    out
}

/// Convert a JSON response into an untyped table, handling the envelope
/// shapes the portal's widgets use: a bare array, a `{data: [...]}`
/// wrapper, and the DataTables `{columns: [...], data: [[...]]}` form.
pub fn json_to_table(bytes: &[u8]) -> Option<ExtractedTable> {
    let value: Value = serde_json::from_slice(bytes).ok()?;

    if let Some(table) = datatables_shape(&value) {
        return Some(table);
    }

    let rows = match &value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => ROW_KEYS
            .iter()
            .find_map(|k| map.get(*k).and_then(|v| v.as_array()))
            .map(|v| v.as_slice())?,
        _ => return None,
    };
    if rows.is_empty() {
        return None;
    }

    match &rows[0] {
        Value::Object(first) => {
            let headers: Vec<String> = first.keys().cloned().collect();
            let data = rows
                .iter()
                .filter_map(|r| r.as_object())
                .map(|obj| {
                    headers
                        .iter()
                        .map(|h| obj.get(h).map(scalar_to_string).unwrap_or_default())
                        .collect()
                })
                .collect();
            Some(ExtractedTable { headers, rows: data })
        }
        Value::Array(_) => {
            let mut iter = rows.iter().filter_map(|r| r.as_array());
            let headers: Vec<String> = iter.next()?.iter().map(scalar_to_string).collect();
            let data = iter
                .map(|row| row.iter().map(scalar_to_string).collect())
                .collect();
            Some(ExtractedTable { headers, rows: data })
        }
        _ => None,
    }
}

/// The DataTables wire shape: column definitions plus row arrays.
fn datatables_shape(value: &Value) -> Option<ExtractedTable> {
    let map = value.as_object()?;
    let columns = map.get("columns")?.as_array()?;
    let data = map.get("data")?.as_array()?;

    let headers: Vec<String> = columns
        .iter()
        .map(|c| {
            c.get("title")
                .or_else(|| c.get("data"))
                .or_else(|| c.get("name"))
                .map(scalar_to_string)
                .unwrap_or_else(|| scalar_to_string(c))
        })
        .collect();
    if headers.is_empty() {
        return None;
    }

    let rows = data
        .iter()
        .filter_map(|r| r.as_array())
        .map(|row| row.iter().map(scalar_to_string).collect())
        .collect();
    Some(ExtractedTable { headers, rows })
}

fn scalar_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
