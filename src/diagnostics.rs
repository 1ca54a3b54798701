//! Raw payload capture for post-mortem debugging.
//!
//! Every fetched body can be persisted before parsing, so a schema change
//! on the portal side can be diagnosed from disk instead of re-scraping.
//! Capture failures are logged and swallowed; diagnostics never fail an
//! acquisition.

use crate::model::RawPayload;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// Destination for raw payload snapshots.
#[async_trait]
pub trait DiagnosticsSink: Send + Sync {
    /// Persist one payload under an organism/label identity. Returns where
    /// it landed, for logging.
    async fn save(&self, organism: &str, label: &str, payload: &RawPayload)
        -> anyhow::Result<PathBuf>;
}

/// Sink that writes payloads under `<root>/raw/<organism>/`, one file per
/// capture, sequence-numbered so repeated fetches of the same label never
/// overwrite each other.
pub struct FileSink {
    root: PathBuf,
    seq: AtomicU64,
}

impl FileSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            seq: AtomicU64::new(0),
        }
    }

    fn extension(payload: &RawPayload) -> &'static str {
        match payload.media_type().as_deref() {
            Some("text/html") | Some("application/xhtml+xml") => "html",
            Some("text/csv") | Some("application/csv") => "csv",
            Some("application/json") => "json",
            Some("application/vnd.ms-excel") => "xls",
            Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet") => "xlsx",
            _ => "bin",
        }
    }
}

#[async_trait]
impl DiagnosticsSink for FileSink {
    async fn save(
        &self,
        organism: &str,
        label: &str,
        payload: &RawPayload,
    ) -> anyhow::Result<PathBuf> {
        let dir = self.root.join("raw").join(sanitize(organism));
        tokio::fs::create_dir_all(&dir).await?;
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let path = dir.join(format!(
            "{seq:05}_{}.{}",
            sanitize(label),
            Self::extension(payload)
        ));
        tokio::fs::write(&path, &payload.bytes).await?;
        Ok(path)
    }
}

/// Sink that keeps nothing. Used in tests and when capture is disabled.
pub struct NullSink;

#[async_trait]
impl DiagnosticsSink for NullSink {
    async fn save(
        &self,
        _organism: &str,
        _label: &str,
        _payload: &RawPayload,
    ) -> anyhow::Result<PathBuf> {
        Ok(PathBuf::new())
    }
}

/// Save through a sink, logging instead of propagating on failure.
pub async fn capture(sink: &dyn DiagnosticsSink, organism: &str, label: &str, payload: &RawPayload) {
    if let Err(e) = sink.save(organism, label, payload).await {
        warn!(organism, label, error = %e, "diagnostic capture failed");
    }
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Keep path traversal characters out of filenames built from URLs.
pub fn label_for(url: &str, kind_key: &str) -> String {
    let tail = url
        .split(['?', '#'])
        .next()
        .unwrap_or(url)
        .rsplit('/')
        .find(|seg| !seg.is_empty())
        .unwrap_or("payload");
    format!("{kind_key}_{}", sanitize(tail))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(ct: &str) -> RawPayload {
        RawPayload {
            bytes: b"contenido".to_vec(),
            content_type: Some(ct.to_string()),
            encoding: None,
            url: "https://p.cl/datos.csv".into(),
            status: 200,
        }
    }

    #[tokio::test]
    async fn test_file_sink_writes_sequenced_files() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path());

        let first = sink.save("MU280", "honorarios", &payload("text/csv")).await.unwrap();
        let second = sink.save("MU280", "honorarios", &payload("text/csv")).await.unwrap();

        assert_ne!(first, second);
        assert!(first.ends_with("00000_honorarios.csv"));
        assert_eq!(tokio::fs::read(&first).await.unwrap(), b"contenido");
        assert!(first.starts_with(dir.path().join("raw").join("MU280")));
    }

    #[tokio::test]
    async fn test_sanitized_organism_path() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path());
        let path = sink
            .save("../etc/passwd", "x", &payload("text/html"))
            .await
            .unwrap();
        assert!(path.starts_with(dir.path().join("raw")));
        assert!(!path.to_string_lossy().contains("../"));
    }

    #[test]
    fn test_label_for_uses_url_tail() {
        assert_eq!(
            label_for("https://p.cl/datos/honorarios_2025.csv?x=1", "honorarios"),
            "honorarios_honorarios_2025.csv"
        );
        assert_eq!(label_for("https://p.cl/", "planta"), "planta_p.cl");
    }
}
