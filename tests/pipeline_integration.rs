//! End-to-end pipeline tests against a mock portal.
//!
//! Each test stands up a wiremock server playing one portal behavior
//! (direct CSV downloads, paginated HTML tables, JSON endpoints behind
//! script tags, or nothing at all) and drives the orchestrator through
//! discovery, extraction, normalization, and escalation.

use async_trait::async_trait;
use portalta::config::PortalConfig;
use portalta::fallback::HeavyFallback;
use portalta::model::{
    AcquisitionRequest, AcquisitionResult, CanonicalRecord, FeeBasedRecord, RecordKind,
};
use portalta::orchestrator::Orchestrator;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ENTRY_PATH: &str = "/-/ta/MU280/2025/A/Salud/4.1.3";

fn test_config(server: &MockServer) -> PortalConfig {
    PortalConfig {
        base_url: server.uri(),
        politeness_delay_ms: 0,
        backoff_base_ms: 1,
        max_retries: 1,
        ..PortalConfig::default()
    }
}

fn request(month: Option<u32>) -> AcquisitionRequest {
    AcquisitionRequest {
        organism: "MU280".into(),
        area: "Salud".into(),
        year: 2025,
        month,
        kind: RecordKind::FeeBased,
    }
}

fn fee_records(result: &AcquisitionResult) -> Vec<&FeeBasedRecord> {
    result
        .records
        .iter()
        .map(|r| match r {
            CanonicalRecord::FeeBased(f) => f,
            other => panic!("expected fee-based record, got {other:?}"),
        })
        .collect()
}

/// Fallback that panics if invoked; for asserting escalation never fires.
struct PanickingFallback;

#[async_trait]
impl HeavyFallback for PanickingFallback {
    async fn render_and_extract(
        &self,
        _request: &AcquisitionRequest,
    ) -> anyhow::Result<Vec<CanonicalRecord>> {
        panic!("heavy fallback must not run when the lightweight chain succeeded");
    }
}

/// Fallback returning a fixed batch, standing in for a browser driver.
struct StubFallback(usize);

#[async_trait]
impl HeavyFallback for StubFallback {
    async fn render_and_extract(
        &self,
        _request: &AcquisitionRequest,
    ) -> anyhow::Result<Vec<CanonicalRecord>> {
        Ok((0..self.0)
            .map(|i| {
                CanonicalRecord::FeeBased(FeeBasedRecord {
                    name: Some(format!("Persona {i}")),
                    ..FeeBasedRecord::default()
                })
            })
            .collect())
    }

    fn name(&self) -> &str {
        "stub_browser"
    }
}

#[tokio::test]
async fn test_csv_download_end_to_end() {
    let server = MockServer::start().await;

    // Entry page links to a semicolon-delimited Latin-1 CSV
    Mock::given(method("GET"))
        .and(path(ENTRY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<html><body><a href="/descargas/honorarios_marzo.csv">Descargar datos</a></body></html>"#,
            "text/html",
        ))
        .mount(&server)
        .await;

    let mut csv = b"Nombre;Rut;Funcion;Remuneracion Bruta\nMar".to_vec();
    csv.push(0xED); // í in ISO-8859-1
    csv.extend_from_slice(b"a Soto;12.345.678-9;Asesor");
    csv.push(0xED);
    csv.extend_from_slice(b"a;$ 1.250.000\nPedro Rojas;9.876.543-2;Monitor;458.832\n");
    Mock::given(method("GET"))
        .and(path("/descargas/honorarios_marzo.csv"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(csv, "text/csv; charset=ISO-8859-1"),
        )
        .mount(&server)
        .await;

    let orchestrator = Orchestrator::without_capture(test_config(&server))
        .with_fallback(Arc::new(PanickingFallback));
    let result = orchestrator.run(&request(Some(3))).await;

    assert!(!result.escalated);
    let records = fee_records(&result);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].name.as_deref(), Some("María Soto"));
    assert_eq!(records[0].total_amount, Some(1_250_000.0));
    assert_eq!(records[1].total_amount, Some(458_832.0));

    let last = result.trail.last().unwrap();
    assert!(last.success);
    assert_eq!(last.strategy, "structured_file");
    assert_eq!(last.record_count, 2);
}

#[tokio::test]
async fn test_paginated_html_table() {
    let server = MockServer::start().await;

    let page = |rows: &str, next: &str| {
        format!(
            r#"<html><body>
            <table>
                <thead><tr><th>Nombre</th><th>Rut</th><th>Monto Total</th></tr></thead>
                <tbody>{rows}</tbody>
            </table>
            {next}
            </body></html>"#
        )
    };

    Mock::given(method("GET"))
        .and(path(ENTRY_PATH))
        .and(query_param_is_missing("page"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            page(
                "<tr><td>Ana Vera</td><td>1.111.111-1</td><td>100.000</td></tr>",
                &format!(r#"<a href="{ENTRY_PATH}?page=2">Siguiente</a>"#),
            ),
            "text/html",
        ))
        .mount(&server)
        .await;

    // Page 2 links back to page 1; the visited set must stop the walk
    Mock::given(method("GET"))
        .and(path(ENTRY_PATH))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            page(
                "<tr><td>Beto Ruz</td><td>2.222.222-2</td><td>200.000</td></tr>",
                &format!(r#"<a href="{ENTRY_PATH}">Siguiente</a>"#),
            ),
            "text/html",
        ))
        .mount(&server)
        .await;

    let orchestrator = Orchestrator::without_capture(test_config(&server))
        .with_fallback(Arc::new(PanickingFallback));
    // No month: the section URL itself is the only template candidate
    let result = orchestrator.run(&request(None)).await;

    assert!(!result.escalated);
    let records = fee_records(&result);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].name.as_deref(), Some("Ana Vera"));
    assert_eq!(records[1].name.as_deref(), Some("Beto Ruz"));

    let last = result.trail.last().unwrap();
    assert_eq!(last.strategy, "html_table");
    assert!(last.success);
}

#[tokio::test]
async fn test_embedded_endpoint_sniff() {
    let server = MockServer::start().await;

    // Every page 404s except the month deep link, which renders client-side
    // but names its data source in a script
    Mock::given(method("GET"))
        .and(path(format!("{ENTRY_PATH}/Marzo")))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<html><body>
            <div id="tabla"></div>
            <script>
                var fuente = "/rest/personal/data?codOrganismo=MU280&anio=2025";
            </script>
            </body></html>"#,
            "text/html",
        ))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/personal/data"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"data": [
                {"nombre": "Ana Vera", "rut": "1.111.111-1", "monto total": "300.000"},
                {"nombre": "Beto Ruz", "rut": "2.222.222-2", "monto total": "400.000"}
            ]}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let orchestrator = Orchestrator::without_capture(test_config(&server))
        .with_fallback(Arc::new(PanickingFallback));
    let result = orchestrator.run(&request(Some(3))).await;

    assert!(!result.escalated);
    let records = fee_records(&result);
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].total_amount, Some(400_000.0));

    let last = result.trail.last().unwrap();
    assert_eq!(last.strategy, "embedded_endpoint");
    assert!(last.success);
    // The HTML table strategy missed first and said so
    assert!(result
        .trail
        .iter()
        .any(|o| o.strategy == "html_table" && !o.success));
}

#[tokio::test]
async fn test_unparseable_file_candidate_recorded_in_trail() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ENTRY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<html><body><a href="/descargas/datos.csv">Descargar</a></body></html>"#,
            "text/html",
        ))
        .mount(&server)
        .await;

    // Declared CSV, but empty: the candidate dies at parse time and must
    // still leave a reasoned failure on the trail
    Mock::given(method("GET"))
        .and(path("/descargas/datos.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("", "text/csv"))
        .mount(&server)
        .await;

    let orchestrator = Orchestrator::without_capture(test_config(&server));
    let result = orchestrator.run(&request(Some(3))).await;

    let entry = result
        .trail
        .iter()
        .find(|o| {
            o.candidate_url
                .as_deref()
                .is_some_and(|u| u.contains("datos.csv"))
        })
        .expect("the unparseable CSV candidate must appear on the trail");
    assert_eq!(entry.strategy, "structured_file");
    assert!(!entry.success);
    assert!(entry
        .failure_reason
        .as_deref()
        .unwrap()
        .contains("no header row"));
}

#[tokio::test]
async fn test_escalation_when_everything_fails() {
    // No mocks: every fetch 404s, every candidate fails
    let server = MockServer::start().await;

    let orchestrator = Orchestrator::without_capture(test_config(&server))
        .with_fallback(Arc::new(StubFallback(12)));
    let result = orchestrator.run(&request(Some(3))).await;

    assert!(result.escalated);
    assert_eq!(result.records.len(), 12);

    let last = result.trail.last().unwrap();
    assert_eq!(last.strategy, "stub_browser");
    assert!(last.success);
    assert_eq!(last.record_count, 12);
    // The lightweight attempts are all on the trail before it
    assert!(result.trail.len() > 1);
    assert!(result.trail[..result.trail.len() - 1]
        .iter()
        .all(|o| !o.success));
}

#[tokio::test]
async fn test_escalation_failure_is_reported_not_raised() {
    let server = MockServer::start().await;

    // Default NoopFallback: escalation runs and fails
    let orchestrator = Orchestrator::without_capture(test_config(&server));
    let result = orchestrator.run(&request(Some(3))).await;

    assert!(result.escalated);
    assert!(result.records.is_empty());
    let last = result.trail.last().unwrap();
    assert!(!last.success);
    assert!(last
        .failure_reason
        .as_deref()
        .unwrap()
        .contains("escalation failed"));
}

#[tokio::test]
async fn test_cancellation_skips_escalation() {
    let server = MockServer::start().await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let orchestrator = Orchestrator::without_capture(test_config(&server))
        .with_fallback(Arc::new(PanickingFallback))
        .with_cancel(cancel);
    let result = orchestrator.run(&request(Some(3))).await;

    assert!(!result.escalated);
    assert!(result.records.is_empty());
    assert!(result
        .trail
        .iter()
        .any(|o| o.failure_reason.as_deref() == Some("request cancelled")));
}

#[tokio::test]
async fn test_transient_errors_are_retried() {
    let server = MockServer::start().await;

    // First hit 503, second hit the CSV; max_retries=1 covers one retry
    Mock::given(method("GET"))
        .and(path(ENTRY_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{ENTRY_PATH}/Marzo")))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{ENTRY_PATH}/Marzo")))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "Nombre;Rut;Monto Total\nAna Vera;1.111.111-1;100.000\n",
            "text/csv",
        ))
        .mount(&server)
        .await;

    let orchestrator = Orchestrator::without_capture(test_config(&server))
        .with_fallback(Arc::new(PanickingFallback));
    let result = orchestrator.run(&request(Some(3))).await;

    assert!(!result.escalated);
    assert_eq!(result.records.len(), 1);
}
