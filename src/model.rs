//! Data model for the acquisition pipeline.
//!
//! `AcquisitionRequest` in, `AcquisitionResult` out. Everything between
//! (candidate sources, raw payloads, extracted tables) is transient and
//! owned by the strategy that produced it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which personnel section of the portal a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Personal de Planta — personnel on the staff roster.
    Payroll,
    /// Personal a Contrata — fixed-term personnel.
    Contract,
    /// Personas contratadas a honorarios — fee-based personnel.
    FeeBased,
    /// Escalas de remuneraciones — salary scales.
    SalaryScale,
}

impl RecordKind {
    /// Portal section key, as used in diagnostic labels and URL lookups.
    pub fn section_key(&self) -> &'static str {
        match self {
            RecordKind::Payroll => "planta",
            RecordKind::Contract => "contrata",
            RecordKind::FeeBased => "honorarios",
            RecordKind::SalaryScale => "escalas",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.section_key())
    }
}

impl std::str::FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "payroll" | "planta" => Ok(RecordKind::Payroll),
            "contract" | "contrata" => Ok(RecordKind::Contract),
            "fee-based" | "fee_based" | "honorarios" => Ok(RecordKind::FeeBased),
            "salary-scale" | "salary_scale" | "escalas" => Ok(RecordKind::SalaryScale),
            other => Err(format!("unknown record kind: {other}")),
        }
    }
}

/// One scrape unit: organism, area, period, and record kind. Immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionRequest {
    /// Organism code within the portal, e.g. "MU280".
    pub organism: String,
    /// Reporting area, e.g. "Salud".
    pub area: String,
    pub year: i32,
    /// Month 1-12; `None` for sections published yearly (salary scales).
    pub month: Option<u32>,
    pub kind: RecordKind,
}

/// Expected delivery format of a candidate source, as hinted by discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceHint {
    /// A downloadable CSV/Excel file.
    File,
    /// An HTML page expected to contain a data table.
    HtmlTable,
    Unknown,
}

/// How a candidate source was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMethod {
    /// Constructed from the portal's deep-link URL template.
    UrlTemplate,
    /// Anchor whose target has a tabular-file extension.
    FileLink,
    /// Anchor or button whose visible text matched a section label.
    SectionLabel,
    /// URL found inside script content or a data attribute.
    EmbeddedEndpoint,
}

/// A resolved URL plus a hint about its likely data format, not yet fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSource {
    pub url: String,
    pub hint: SourceHint,
    pub method: DiscoveryMethod,
}

impl CandidateSource {
    /// Try-order rank. Lower ranks are attempted first: direct file links
    /// outrank inferred table pages.
    pub fn rank(&self) -> u8 {
        match (self.hint, self.method) {
            (SourceHint::File, _) => 0,
            (_, DiscoveryMethod::UrlTemplate) => 1,
            (SourceHint::HtmlTable, _) => 2,
            (SourceHint::Unknown, _) => 3,
        }
    }
}

/// Fetched byte content with its delivery metadata. Owned transiently by
/// the strategy that fetched it; persisted only through the diagnostics sink.
#[derive(Debug, Clone)]
pub struct RawPayload {
    pub bytes: Vec<u8>,
    /// Declared Content-Type header, if any.
    pub content_type: Option<String>,
    /// Text encoding the payload was decoded with, once known.
    pub encoding: Option<&'static str>,
    pub url: String,
    pub status: u16,
}

impl RawPayload {
    /// Lowercased content type without parameters, e.g. "text/html".
    pub fn media_type(&self) -> Option<String> {
        self.content_type
            .as_ref()
            .map(|ct| ct.split(';').next().unwrap_or("").trim().to_lowercase())
    }
}

/// Untyped tabular data shared by file- and HTML-based strategies before
/// normalization. Row 0 of the source becomes `headers`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ExtractedTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A fee-based (honorarios) personnel entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeeBasedRecord {
    pub name: Option<String>,
    /// RUT / national identity number.
    pub identity_number: Option<String>,
    pub function: Option<String>,
    pub qualification: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub gross_amount: Option<f64>,
    pub net_amount: Option<f64>,
    pub total_amount: Option<f64>,
    pub observations: Option<String>,
    pub currency_unit: Option<String>,
}

/// A payroll (planta) or contract (contrata) personnel entry. The two
/// sections publish the same column set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaffRecord {
    pub name: Option<String>,
    pub identity_number: Option<String>,
    /// EUS grade code.
    pub grade: Option<String>,
    pub position: Option<String>,
    pub qualification: Option<String>,
    pub region: Option<String>,
    pub allowances: Option<f64>,
    pub gross_amount: Option<f64>,
    pub net_amount: Option<f64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub observations: Option<String>,
    pub hours: Option<String>,
}

/// One row of a remuneration scale.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SalaryScaleRecord {
    pub grade: Option<String>,
    pub role_band: Option<String>,
    pub amount: Option<f64>,
    pub effective_year: i32,
}

/// A fully typed, normalized entry ready for downstream storage. Produced
/// only by the normalizer; immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CanonicalRecord {
    Payroll(StaffRecord),
    Contract(StaffRecord),
    FeeBased(FeeBasedRecord),
    SalaryScale(SalaryScaleRecord),
}

impl CanonicalRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            CanonicalRecord::Payroll(_) => RecordKind::Payroll,
            CanonicalRecord::Contract(_) => RecordKind::Contract,
            CanonicalRecord::FeeBased(_) => RecordKind::FeeBased,
            CanonicalRecord::SalaryScale(_) => RecordKind::SalaryScale,
        }
    }
}

/// One attempted strategy and how it went. Append-only per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyOutcome {
    pub strategy: String,
    pub candidate_url: Option<String>,
    pub success: bool,
    pub record_count: usize,
    pub failure_reason: Option<String>,
}

impl StrategyOutcome {
    pub fn success(strategy: &str, url: &str, count: usize) -> Self {
        Self {
            strategy: strategy.to_string(),
            candidate_url: Some(url.to_string()),
            success: true,
            record_count: count,
            failure_reason: None,
        }
    }

    pub fn failure(strategy: &str, url: Option<&str>, reason: impl Into<String>) -> Self {
        Self {
            strategy: strategy.to_string(),
            candidate_url: url.map(|u| u.to_string()),
            success: false,
            record_count: 0,
            failure_reason: Some(reason.into()),
        }
    }
}

/// Final output of one request: the records, the full outcome trail, and
/// whether the heavy fallback was invoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionResult {
    pub request: AcquisitionRequest,
    pub records: Vec<CanonicalRecord>,
    pub trail: Vec<StrategyOutcome>,
    pub escalated: bool,
}
