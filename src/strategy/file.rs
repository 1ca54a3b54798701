//! Structured-file parsing: delimited text and Excel workbooks.
//!
//! Municipalities publish the same section as CSV, semicolon-delimited
//! text, or Excel depending on the year. Format is detected from the
//! payload itself (magic bytes, then content type, then URL extension),
//! never trusted from the link alone.

use crate::error::AcquireError;
use crate::model::{ExtractedTable, RawPayload};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;
use tracing::debug;

/// File extensions that mark a link as a downloadable tabular file.
const TABULAR_EXTENSIONS: &[&str] = &[".csv", ".xls", ".xlsx", ".ods", ".tsv"];

/// Whether a URL path ends in a tabular-file extension.
pub fn is_tabular_url(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();
    TABULAR_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Whether a fetched payload is plausibly a tabular file, judged by magic
/// bytes first, then declared content type, then the URL extension.
pub fn is_tabular_payload(payload: &RawPayload) -> bool {
    if is_excel_payload(payload) {
        return true;
    }
    match payload.media_type().as_deref() {
        Some("text/csv") | Some("application/csv") | Some("text/tab-separated-values") => true,
        Some("application/octet-stream") | Some("text/plain") | None => {
            is_tabular_url(&payload.url)
        }
        _ => is_tabular_url(&payload.url) && !looks_like_html(&payload.bytes),
    }
}

fn is_excel_payload(payload: &RawPayload) -> bool {
    // ZIP container (xlsx/ods) or OLE2 compound file (legacy xls)
    if payload.bytes.starts_with(b"PK\x03\x04")
        || payload.bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0])
    {
        return true;
    }
    matches!(
        payload.media_type().as_deref(),
        Some("application/vnd.ms-excel")
            | Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet")
            | Some("application/vnd.oasis.opendocument.spreadsheet")
    )
}

fn looks_like_html(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(512)];
    let head = String::from_utf8_lossy(head).to_lowercase();
    head.contains("<html") || head.contains("<!doctype")
}

/// Parse a tabular file payload into an untyped table.
///
/// Returns `Ok(None)` when the payload is not a tabular file at all;
/// a payload that is tabular but has no usable header row is an error.
pub fn parse_file(payload: &RawPayload) -> Result<Option<ExtractedTable>, AcquireError> {
    if !is_tabular_payload(payload) {
        return Ok(None);
    }
    if is_excel_payload(payload) {
        return parse_excel(payload).map(Some);
    }
    parse_delimited(payload).map(Some)
}

/// Decode payload bytes to text: strict UTF-8, then lossy UTF-8 when the
/// damage is negligible, then Windows-1252 (covers the portal's declared
/// ISO-8859-1).
pub fn decode_text(payload: &RawPayload) -> (String, &'static str) {
    if let Some(ct) = &payload.content_type {
        let ct = ct.to_lowercase();
        if ct.contains("iso-8859") || ct.contains("windows-1252") || ct.contains("latin") {
            let (text, _, _) = encoding_rs::WINDOWS_1252.decode(&payload.bytes);
            return (text.into_owned(), "windows-1252");
        }
    }
    match std::str::from_utf8(&payload.bytes) {
        Ok(text) => (text.to_string(), "utf-8"),
        Err(_) => {
            let lossy = String::from_utf8_lossy(&payload.bytes);
            let damage = lossy.chars().filter(|c| *c == '\u{FFFD}').count();
            if damage * 100 < lossy.chars().count() {
                (lossy.into_owned(), "utf-8")
            } else {
                let (text, _, _) = encoding_rs::WINDOWS_1252.decode(&payload.bytes);
                (text.into_owned(), "windows-1252")
            }
        }
    }
}

/// Pick the delimiter by counting candidates on the first non-blank line.
fn sniff_delimiter(text: &str) -> u8 {
    let first_line = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let counts = [
        (b';', first_line.matches(';').count()),
        (b',', first_line.matches(',').count()),
        (b'\t', first_line.matches('\t').count()),
    ];
    counts
        .iter()
        .max_by_key(|(_, n)| *n)
        .filter(|(_, n)| *n > 0)
        .map(|(d, _)| *d)
        .unwrap_or(b',')
}

fn parse_delimited(payload: &RawPayload) -> Result<ExtractedTable, AcquireError> {
    let (text, encoding) = decode_text(payload);
    let delimiter = sniff_delimiter(&text);
    debug!(
        url = payload.url,
        delimiter = %(delimiter as char),
        encoding,
        "parsing delimited file"
    );

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut headers: Vec<String> = Vec::new();
    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| AcquireError::Permanent {
            url: payload.url.clone(),
            reason: format!("CSV parse failed: {e}"),
        })?;
        let values: Vec<String> = record.iter().map(|v| v.trim().to_string()).collect();
        if values.iter().all(|v| v.is_empty()) {
            continue;
        }
        if headers.is_empty() {
            headers = values;
        } else {
            rows.push(values);
        }
    }

    if headers.is_empty() {
        return Err(AcquireError::Permanent {
            url: payload.url.clone(),
            reason: "delimited file has no header row".into(),
        });
    }
    Ok(ExtractedTable { headers, rows })
}

fn parse_excel(payload: &RawPayload) -> Result<ExtractedTable, AcquireError> {
    let cursor = Cursor::new(payload.bytes.clone());
    let mut workbook =
        open_workbook_auto_from_rs(cursor).map_err(|e| AcquireError::Permanent {
            url: payload.url.clone(),
            reason: format!("workbook open failed: {e}"),
        })?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AcquireError::Permanent {
            url: payload.url.clone(),
            reason: "workbook has no sheets".into(),
        })?
        .map_err(|e| AcquireError::Permanent {
            url: payload.url.clone(),
            reason: format!("sheet read failed: {e}"),
        })?;

    let mut headers: Vec<String> = Vec::new();
    let mut rows: Vec<Vec<String>> = Vec::new();
    for row in range.rows() {
        let values: Vec<String> = row.iter().map(cell_to_string).collect();
        let populated = values.iter().filter(|v| !v.is_empty()).count();
        if headers.is_empty() {
            // Skip title/banner rows above the real header
            if populated >= 2 {
                headers = values;
            }
            continue;
        }
        if populated == 0 {
            continue;
        }
        rows.push(values);
    }

    if headers.is_empty() {
        return Err(AcquireError::Permanent {
            url: payload.url.clone(),
            reason: "workbook has no header row".into(),
        });
    }
    Ok(ExtractedTable { headers, rows })
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string().trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(bytes: &[u8], content_type: Option<&str>, url: &str) -> RawPayload {
        RawPayload {
            bytes: bytes.to_vec(),
            content_type: content_type.map(|s| s.to_string()),
            encoding: None,
            url: url.to_string(),
            status: 200,
        }
    }

    #[test]
    fn test_is_tabular_url() {
        assert!(is_tabular_url("https://p.cl/datos/honorarios_2025.csv"));
        assert!(is_tabular_url("https://p.cl/f.XLSX?download=1"));
        assert!(!is_tabular_url("https://p.cl/seccion/4.1.3"));
    }

    #[test]
    fn test_semicolon_csv_with_latin1_accents() {
        // "Pérez Muñoz" in ISO-8859-1
        let mut bytes = b"Nombre;Rut;Monto Total\nJuan P".to_vec();
        bytes.push(0xE9); // é
        bytes.extend_from_slice(b"rez Mu");
        bytes.push(0xF1); // ñ
        bytes.extend_from_slice(b"oz;12.345.678-9;1.500.000\n");

        let p = payload(&bytes, Some("text/csv; charset=ISO-8859-1"), "https://p.cl/h.csv");
        let table = parse_file(&p).unwrap().unwrap();
        assert_eq!(table.headers, vec!["Nombre", "Rut", "Monto Total"]);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0][0], "Juan Pérez Muñoz");
    }

    #[test]
    fn test_delimiter_sniff_prefers_majority() {
        let p = payload(
            b"a;b;c\n1;2;3\n",
            Some("text/plain"),
            "https://p.cl/x.csv",
        );
        let table = parse_file(&p).unwrap().unwrap();
        assert_eq!(table.headers.len(), 3);

        let p = payload(b"a,b,c\n1,2,3\n", None, "https://p.cl/y.csv");
        let table = parse_file(&p).unwrap().unwrap();
        assert_eq!(table.headers.len(), 3);
    }

    #[test]
    fn test_undeclared_latin1_falls_back() {
        let mut bytes = b"Nombre,Monto\nJos".to_vec();
        for _ in 0..50 {
            bytes.push(0xE9);
        }
        bytes.extend_from_slice(b",100\n");
        let (text, encoding) = decode_text(&payload(&bytes, None, "u"));
        assert_eq!(encoding, "windows-1252");
        assert!(text.contains('é'));
    }

    #[test]
    fn test_html_disguised_as_csv_is_rejected() {
        let p = payload(
            b"<!DOCTYPE html><html><body>Error</body></html>",
            Some("text/html"),
            "https://p.cl/datos.csv",
        );
        assert!(parse_file(&p).unwrap().is_none());
    }

    #[test]
    fn test_blank_lines_skipped() {
        let p = payload(
            b"Nombre;Rut\n\nAna;1-9\n;\nLuz;2-7\n",
            Some("text/csv"),
            "https://p.cl/x.csv",
        );
        let table = parse_file(&p).unwrap().unwrap();
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn test_empty_declared_csv_is_permanent_error() {
        // Retrying will not grow a header row into an empty file
        let p = payload(b"", Some("text/csv"), "https://p.cl/vacio.csv");
        let err = parse_file(&p).unwrap_err();
        assert!(matches!(err, AcquireError::Permanent { .. }));
    }

    #[test]
    fn test_non_tabular_payload_is_none() {
        let p = payload(b"{\"ok\":true}", Some("application/json"), "https://p.cl/api");
        assert!(parse_file(&p).unwrap().is_none());
    }
}
