//! Record normalizer: untyped `ExtractedTable` in, `CanonicalRecord`s out.
//!
//! Header-name-driven mapping (not positional) so parsing survives column
//! reordering, inserted columns, and naming drift across municipalities.
//! Rows that map to neither a name nor an identity number are discarded as
//! section-header or footer noise.

pub mod aliases;
pub mod numeric;

use crate::error::AcquireError;
use crate::model::{
    CanonicalRecord, ExtractedTable, FeeBasedRecord, RecordKind, SalaryScaleRecord, StaffRecord,
};
use aliases::{find_column, normalize_header};
use numeric::{is_rut, looks_like_money, parse_date, parse_money};
use tracing::{debug, warn};

/// Convert a raw table into canonical records for `kind`.
///
/// Fails with `SchemaMismatch` when the header row does not map the minimum
/// field set for the kind. An Ok result may still be empty if every row was
/// filtered as non-data.
pub fn normalize(
    table: &ExtractedTable,
    kind: RecordKind,
) -> Result<Vec<CanonicalRecord>, AcquireError> {
    let headers: Vec<String> = table.headers.iter().map(|h| normalize_header(h)).collect();

    match kind {
        RecordKind::FeeBased => normalize_fee_based(table, &headers),
        RecordKind::Payroll | RecordKind::Contract => normalize_staff(table, &headers, kind),
        RecordKind::SalaryScale => normalize_scale(table, &headers),
    }
}

fn cell<'a>(row: &'a [String], idx: Option<usize>) -> Option<&'a str> {
    let text = row.get(idx?)?.trim();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Fold cells from columns no canonical field claimed into observation text,
/// so nothing the portal published is dropped silently.
fn fold_unmapped(
    table: &ExtractedTable,
    row: &[String],
    mapped: &[Option<usize>],
    parts: &mut Vec<String>,
) {
    for (i, value) in row.iter().enumerate() {
        let value = value.trim();
        if value.is_empty() || mapped.iter().any(|m| *m == Some(i)) {
            continue;
        }
        let header = table.headers.get(i).map(|h| h.trim()).unwrap_or("");
        if header.is_empty() {
            parts.push(value.to_string());
        } else {
            parts.push(format!("{header}: {value}"));
        }
    }
}

fn join_observations(parts: Vec<String>) -> Option<String> {
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}

/// Parse a date cell; unparseable text is preserved in the observation
/// parts rather than lost.
fn date_or_note(
    raw: Option<&str>,
    label: &str,
    parts: &mut Vec<String>,
) -> Option<chrono::NaiveDate> {
    let raw = raw?;
    match parse_date(raw) {
        Some(d) => Some(d),
        None => {
            parts.push(format!("{label}: {raw}"));
            None
        }
    }
}

/// When the identity cell holds a money-looking value the columns are
/// shifted; scan the whole row for a real RUT instead.
fn recover_shifted_rut(row: &[String], identity: Option<&str>) -> (Option<String>, Option<f64>) {
    match identity {
        Some(v) if !is_rut(v) && looks_like_money(v) => {
            warn!(value = v, "identity column holds a money value, recovering");
            let displaced = parse_money(v);
            let real = row
                .iter()
                .map(|c| c.trim())
                .find(|c| is_rut(c))
                .map(|c| c.to_string());
            (real, displaced)
        }
        other => (other.map(|s| s.to_string()), None),
    }
}

fn normalize_fee_based(
    table: &ExtractedTable,
    headers: &[String],
) -> Result<Vec<CanonicalRecord>, AcquireError> {
    let name = find_column(headers, aliases::ALIASES_NAME);
    let identity = find_column(headers, aliases::ALIASES_IDENTITY);
    let function = find_column(headers, aliases::ALIASES_FUNCTION);
    let qualification = find_column(headers, aliases::ALIASES_QUALIFICATION);
    let start = find_column(headers, aliases::ALIASES_START_DATE);
    let end = find_column(headers, aliases::ALIASES_END_DATE);
    let gross = find_column(headers, aliases::ALIASES_GROSS);
    let net = find_column(headers, aliases::ALIASES_NET);
    let total = find_column(headers, aliases::ALIASES_TOTAL);
    let observations = find_column(headers, aliases::ALIASES_OBSERVATIONS);
    let currency = find_column(headers, aliases::ALIASES_CURRENCY);

    require_identity_schema(
        RecordKind::FeeBased,
        headers,
        &[name, identity],
        &[function, gross, net, total, start],
    )?;

    let mapped = [
        name,
        identity,
        function,
        qualification,
        start,
        end,
        gross,
        net,
        total,
        observations,
        currency,
    ];

    let mut records = Vec::new();
    for row in &table.rows {
        let name_v = cell(row, name);
        let identity_raw = cell(row, identity);
        if name_v.is_none() && identity_raw.is_none() {
            continue;
        }

        let (identity_v, displaced) = recover_shifted_rut(row, identity_raw);

        let mut parts = Vec::new();
        if let Some(obs) = cell(row, observations) {
            parts.push(obs.to_string());
        }
        let start_v = date_or_note(cell(row, start), "Fecha inicio", &mut parts);
        let end_v = date_or_note(cell(row, end), "Fecha término", &mut parts);
        fold_unmapped(table, row, &mapped, &mut parts);

        let gross_v = cell(row, gross).and_then(parse_money);
        let net_v = cell(row, net).and_then(parse_money);
        let mut total_v = cell(row, total).and_then(parse_money).or(displaced);
        // Some municipalities publish only the gross column
        if total_v.is_none() {
            total_v = gross_v;
        }

        records.push(CanonicalRecord::FeeBased(FeeBasedRecord {
            name: name_v.map(|s| s.to_string()),
            identity_number: identity_v,
            function: cell(row, function).map(|s| s.to_string()),
            qualification: cell(row, qualification).map(|s| s.to_string()),
            start_date: start_v,
            end_date: end_v,
            gross_amount: gross_v,
            net_amount: net_v,
            total_amount: total_v,
            observations: join_observations(parts),
            currency_unit: cell(row, currency).map(|s| s.to_string()),
        }));
    }

    debug!(rows = table.rows.len(), records = records.len(), "normalized fee-based table");
    Ok(records)
}

fn normalize_staff(
    table: &ExtractedTable,
    headers: &[String],
    kind: RecordKind,
) -> Result<Vec<CanonicalRecord>, AcquireError> {
    let name = find_column(headers, aliases::ALIASES_NAME);
    let identity = find_column(headers, aliases::ALIASES_IDENTITY);
    let grade = find_column(headers, aliases::ALIASES_GRADE);
    let position = find_column(headers, aliases::ALIASES_POSITION);
    let qualification = find_column(headers, aliases::ALIASES_QUALIFICATION);
    let region = find_column(headers, aliases::ALIASES_REGION);
    let allowances = find_column(headers, aliases::ALIASES_ALLOWANCES);
    let gross = find_column(headers, aliases::ALIASES_GROSS);
    let net = find_column(headers, aliases::ALIASES_NET);
    let start = find_column(headers, aliases::ALIASES_START_DATE);
    let end = find_column(headers, aliases::ALIASES_END_DATE);
    let observations = find_column(headers, aliases::ALIASES_OBSERVATIONS);
    let hours = find_column(headers, aliases::ALIASES_HOURS);

    require_identity_schema(
        kind,
        headers,
        &[name, identity],
        &[grade, position, gross, net, start],
    )?;

    let mapped = [
        name,
        identity,
        grade,
        position,
        qualification,
        region,
        allowances,
        gross,
        net,
        start,
        end,
        observations,
        hours,
    ];

    let mut records = Vec::new();
    for row in &table.rows {
        let name_v = cell(row, name);
        let identity_raw = cell(row, identity);
        if name_v.is_none() && identity_raw.is_none() {
            continue;
        }

        let (identity_v, _) = recover_shifted_rut(row, identity_raw);

        let mut parts = Vec::new();
        if let Some(obs) = cell(row, observations) {
            parts.push(obs.to_string());
        }
        let start_v = date_or_note(cell(row, start), "Fecha inicio", &mut parts);
        let end_v = date_or_note(cell(row, end), "Fecha término", &mut parts);
        fold_unmapped(table, row, &mapped, &mut parts);

        let record = StaffRecord {
            name: name_v.map(|s| s.to_string()),
            identity_number: identity_v,
            grade: cell(row, grade).map(|s| s.to_string()),
            position: cell(row, position).map(|s| s.to_string()),
            qualification: cell(row, qualification).map(|s| s.to_string()),
            region: cell(row, region).map(|s| s.to_string()),
            allowances: cell(row, allowances).and_then(parse_money),
            gross_amount: cell(row, gross).and_then(parse_money),
            net_amount: cell(row, net).and_then(parse_money),
            start_date: start_v,
            end_date: end_v,
            observations: join_observations(parts),
            hours: cell(row, hours).map(|s| s.to_string()),
        };

        records.push(match kind {
            RecordKind::Payroll => CanonicalRecord::Payroll(record),
            _ => CanonicalRecord::Contract(record),
        });
    }

    debug!(rows = table.rows.len(), records = records.len(), kind = %kind, "normalized staff table");
    Ok(records)
}

fn normalize_scale(
    table: &ExtractedTable,
    headers: &[String],
) -> Result<Vec<CanonicalRecord>, AcquireError> {
    let grade = find_column(headers, aliases::ALIASES_GRADE);
    let role_band = find_column(headers, aliases::ALIASES_ROLE_BAND);
    let amount = find_column(headers, aliases::ALIASES_SCALE_AMOUNT);
    let year = find_column(headers, aliases::ALIASES_EFFECTIVE_YEAR);

    if amount.is_none() || (grade.is_none() && role_band.is_none()) {
        return Err(AcquireError::SchemaMismatch {
            kind: RecordKind::SalaryScale,
            reason: format!(
                "need an amount column and a grade or role-band column, headers were: {}",
                headers.join(", ")
            ),
        });
    }

    let mut records = Vec::new();
    for row in &table.rows {
        let grade_v = cell(row, grade);
        let band_v = cell(row, role_band);
        let amount_v = cell(row, amount).and_then(parse_money);
        if grade_v.is_none() && band_v.is_none() {
            continue;
        }
        let effective_year = cell(row, year)
            .and_then(|y| y.trim().parse::<i32>().ok())
            .unwrap_or(0);
        records.push(CanonicalRecord::SalaryScale(SalaryScaleRecord {
            grade: grade_v.map(|s| s.to_string()),
            role_band: band_v.map(|s| s.to_string()),
            amount: amount_v,
            effective_year,
        }));
    }
    Ok(records)
}

/// Personnel tables must map a name or identity column plus at least one
/// more substantive column; anything less is a schema mismatch, not a table
/// worth emitting half-empty records from.
fn require_identity_schema(
    kind: RecordKind,
    headers: &[String],
    identity_cols: &[Option<usize>],
    substantive_cols: &[Option<usize>],
) -> Result<(), AcquireError> {
    let has_identity = identity_cols.iter().any(|c| c.is_some());
    let substantive = substantive_cols.iter().filter(|c| c.is_some()).count();
    if !has_identity || substantive == 0 {
        return Err(AcquireError::SchemaMismatch {
            kind,
            reason: format!(
                "mapped {} substantive column(s), identity/name present: {}; headers were: {}",
                substantive,
                has_identity,
                headers.join(", ")
            ),
        });
    }
    Ok(())
}
