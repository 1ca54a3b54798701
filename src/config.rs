//! Portal layout and pipeline tuning as data, not hard-coded logic.
//!
//! The portal's path syntax varies by deployment and has changed across
//! years, so URL templates, section codes, and month names live here and can
//! be overridden by the caller or a config file.

use crate::model::RecordKind;
use serde::Deserialize;
use std::path::PathBuf;

/// Spanish month names as they appear in portal URL paths.
pub const MONTH_NAMES: [&str; 12] = [
    "Enero",
    "Febrero",
    "Marzo",
    "Abril",
    "Mayo",
    "Junio",
    "Julio",
    "Agosto",
    "Septiembre",
    "Octubre",
    "Noviembre",
    "Diciembre",
];

/// Everything tunable about one portal deployment and the pipeline run
/// against it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Portal base, e.g. "https://www.portaltransparencia.cl/PortalPdT/pdtta".
    pub base_url: String,
    /// Section codes in the portal URL structure, planta through escalas.
    pub section_planta: String,
    pub section_contrata: String,
    pub section_honorarios: String,
    pub section_escalas: String,
    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Retry count for transient fetch failures.
    pub max_retries: u32,
    /// Base backoff interval in milliseconds; doubles per retry.
    pub backoff_base_ms: u64,
    /// Minimum delay between consecutive requests to the same host.
    pub politeness_delay_ms: u64,
    /// Minimum expected-header matches for HTML table selection.
    pub min_header_matches: usize,
    /// Pagination depth cap.
    pub max_pages: usize,
    /// How many sniffed embedded endpoints to probe per candidate.
    pub max_endpoint_probes: usize,
    /// Where the diagnostics sink writes raw payloads.
    pub data_dir: PathBuf,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.portaltransparencia.cl/PortalPdT/pdtta".into(),
            section_planta: "4.1.1".into(),
            section_contrata: "4.1.2".into(),
            section_honorarios: "4.1.3".into(),
            section_escalas: "4.1.4".into(),
            request_timeout_ms: 30_000,
            max_retries: 3,
            backoff_base_ms: 1_000,
            politeness_delay_ms: 1_500,
            min_header_matches: 2,
            max_pages: 50,
            max_endpoint_probes: 10,
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PORTALTA_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("portalta")
}

impl PortalConfig {
    /// Section code for a record kind, e.g. 4.1.3 for honorarios.
    pub fn section_code(&self, kind: RecordKind) -> &str {
        match kind {
            RecordKind::Payroll => &self.section_planta,
            RecordKind::Contract => &self.section_contrata,
            RecordKind::FeeBased => &self.section_honorarios,
            RecordKind::SalaryScale => &self.section_escalas,
        }
    }

    /// Entry page for an organism's section in a given year and area.
    ///
    /// Pattern: `{base}/-/ta/{org}/{year}/A/{area}/{section}`.
    pub fn section_url(&self, organism: &str, year: i32, area: &str, kind: RecordKind) -> String {
        format!(
            "{}/-/ta/{}/{}/A/{}/{}",
            self.base_url,
            organism,
            year,
            area,
            self.section_code(kind)
        )
    }

    /// Deep link for a specific month, using the month-name path form.
    pub fn month_url(
        &self,
        organism: &str,
        year: i32,
        area: &str,
        kind: RecordKind,
        month: u32,
    ) -> String {
        let name = month_name(month);
        format!(
            "{}/{}",
            self.section_url(organism, year, area, kind),
            name
        )
    }

    /// Deep link using a numeric month path segment. Some municipalities
    /// publish under this form instead of the month name.
    pub fn numeric_month_url(
        &self,
        organism: &str,
        year: i32,
        area: &str,
        kind: RecordKind,
        month: u32,
    ) -> String {
        format!(
            "{}/{}",
            self.section_url(organism, year, area, kind),
            month
        )
    }

    /// Query-string form of the section link; the oldest layout in use.
    pub fn query_url(
        &self,
        organism: &str,
        year: i32,
        kind: RecordKind,
        month: u32,
    ) -> String {
        format!(
            "{}?codOrganismo={}&anio={}&mes={}&seccion={}",
            self.base_url,
            organism,
            year,
            month,
            self.section_code(kind)
        )
    }

    /// Organism landing page.
    pub fn organism_url(&self, organism: &str) -> String {
        format!("{}?codOrganismo={}", self.base_url, organism)
    }
}

/// Month name for a 1-based month number; falls back to the number itself
/// for out-of-range input.
pub fn month_name(month: u32) -> String {
    MONTH_NAMES
        .get((month as usize).wrapping_sub(1))
        .map(|s| s.to_string())
        .unwrap_or_else(|| month.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_url_shape() {
        let cfg = PortalConfig::default();
        let url = cfg.section_url("MU280", 2025, "Salud", RecordKind::FeeBased);
        assert_eq!(
            url,
            "https://www.portaltransparencia.cl/PortalPdT/pdtta/-/ta/MU280/2025/A/Salud/4.1.3"
        );
    }

    #[test]
    fn test_month_url_uses_spanish_name() {
        let cfg = PortalConfig::default();
        let url = cfg.month_url("MU280", 2025, "Salud", RecordKind::Contract, 1);
        assert!(url.ends_with("/4.1.2/Enero"));
    }

    #[test]
    fn test_month_name_out_of_range() {
        assert_eq!(month_name(13), "13");
        assert_eq!(month_name(0), "0");
        assert_eq!(month_name(9), "Septiembre");
    }

    #[test]
    fn test_query_url_params() {
        let cfg = PortalConfig::default();
        let url = cfg.query_url("MU280", 2025, RecordKind::Payroll, 3);
        assert!(url.contains("codOrganismo=MU280"));
        assert!(url.contains("anio=2025"));
        assert!(url.contains("mes=3"));
        assert!(url.contains("seccion=4.1.1"));
    }
}
