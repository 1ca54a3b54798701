//! Header alias tables and fuzzy header matching.
//!
//! Portal tables name the same column a dozen ways across municipalities
//! ("Remuneración Bruta", "rem. bruta", "Total Haberes"). Matching is
//! case-insensitive and accent-insensitive: headers are normalized before
//! lookup, and aliases are stored pre-normalized.

use crate::model::RecordKind;

/// Normalize a header string for fuzzy matching: strip accents, lowercase,
/// turn dots/underscores into spaces, collapse whitespace.
pub fn normalize_header(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        let mapped = match c {
            'á' | 'à' | 'ä' | 'â' | 'Á' | 'À' | 'Ä' | 'Â' => 'a',
            'é' | 'è' | 'ë' | 'ê' | 'É' | 'È' | 'Ë' | 'Ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' | 'Í' | 'Ì' | 'Ï' | 'Î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' | 'Ó' | 'Ò' | 'Ö' | 'Ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' | 'Ú' | 'Ù' | 'Ü' | 'Û' => 'u',
            'ñ' | 'Ñ' => 'n',
            '.' | '_' => ' ',
            c => c.to_ascii_lowercase(),
        };
        out.push(mapped);
    }
    // Collapse runs of whitespace
    let mut collapsed = String::with_capacity(out.len());
    let mut prev_space = true;
    for c in out.chars() {
        if c.is_whitespace() {
            if !prev_space {
                collapsed.push(' ');
            }
            prev_space = true;
        } else {
            collapsed.push(c);
            prev_space = false;
        }
    }
    collapsed.trim_end().to_string()
}

/// Find the column index matching any alias, trying exact match first, then
/// alias-contained-in-header, then header-contained-in-alias for abbreviated
/// headers. The last phase needs a length floor: "rut" is a substring of
/// "bruta" and must never match a remuneration alias.
pub fn find_column(headers: &[String], aliases: &[&str]) -> Option<usize> {
    for alias in aliases {
        if let Some(i) = headers.iter().position(|h| h == alias) {
            return Some(i);
        }
    }
    for alias in aliases {
        if let Some(i) = headers.iter().position(|h| !h.is_empty() && h.contains(alias)) {
            return Some(i);
        }
    }
    for alias in aliases {
        if let Some(i) = headers
            .iter()
            .position(|h| h.len() > 3 && alias.contains(h.as_str()))
        {
            return Some(i);
        }
    }
    None
}

// ── Common fields ───────────────────────────────────────────────────────────

pub const ALIASES_NAME: &[&str] = &[
    "nombre",
    "nombre completo",
    "nombre funcionario",
    "nombre persona",
    "persona",
    "nombre y apellido",
    "apellido nombre",
    "funcionario",
    "prestador",
    "nombre prestador",
];

pub const ALIASES_IDENTITY: &[&str] = &[
    "rut",
    "rut funcionario",
    "rut prestador",
    "run",
    "cedula",
    "cedula identidad",
    "n documento",
    "nº documento",
];

pub const ALIASES_OBSERVATIONS: &[&str] =
    &["observaciones", "observacion", "detalle", "notas", "glosa"];

pub const ALIASES_START_DATE: &[&str] = &[
    "fecha de inicio",
    "fecha inicio",
    "inicio contrato",
    "fecha ingreso",
    "desde",
];

pub const ALIASES_END_DATE: &[&str] = &[
    "fecha de termino",
    "fecha termino",
    "termino contrato",
    "fecha egreso",
    "hasta",
];

pub const ALIASES_GROSS: &[&str] = &[
    "remuneracion bruta",
    "rem bruta",
    "remuneracion bruta mensualizada",
    "renta bruta",
    "total haberes",
    "total imponible",
    "haberes",
    "bruto",
    "sueldo bruto",
];

pub const ALIASES_NET: &[&str] = &[
    "remuneracion liquida",
    "rem liquida",
    "remuneracion liquida mensualizada",
    "renta liquida",
    "liquido a pago",
    "liquido",
    "sueldo liquido",
    "neto",
];

pub const ALIASES_QUALIFICATION: &[&str] = &[
    "calificacion profesional",
    "calificacion",
    "profesion",
    "titulo profesional",
    "titulo",
    "formacion",
];

// ── Fee-based (honorarios) fields ───────────────────────────────────────────

pub const ALIASES_FUNCTION: &[&str] = &[
    "descripcion de la funcion",
    "descripcion funcion",
    "funcion",
    "actividad",
];

pub const ALIASES_TOTAL: &[&str] = &[
    "monto total",
    "monto bruto",
    "honorario total bruto mensualizado",
    "honorario bruto mensual",
    "honorarios",
    "honorario",
    "monto",
    "total",
    "pago bruto",
    "monto pago",
];

pub const ALIASES_CURRENCY: &[&str] = &["unidad monetaria", "moneda", "tipo moneda"];

// ── Payroll/contract (planta/contrata) fields ───────────────────────────────

pub const ALIASES_GRADE: &[&str] = &["grado eus", "grado", "grado e u s", "escala", "nivel"];

pub const ALIASES_POSITION: &[&str] = &["cargo", "cargo o funcion", "funcion", "puesto"];

pub const ALIASES_REGION: &[&str] = &["region", "comuna", "localidad", "lugar desempeno"];

pub const ALIASES_ALLOWANCES: &[&str] = &[
    "asignaciones",
    "asignacion",
    "otras asignaciones",
    "bonos",
    "total asignaciones",
    "viaticos",
    "viatico",
];

pub const ALIASES_HOURS: &[&str] = &[
    "horas semanales",
    "horas",
    "jornada",
    "tipo jornada",
    "horas contrato",
];

// ── Salary scale fields ─────────────────────────────────────────────────────

pub const ALIASES_ROLE_BAND: &[&str] =
    &["estamento", "planta", "cargo", "escalafon", "categoria"];

pub const ALIASES_SCALE_AMOUNT: &[&str] = &[
    "sueldo base",
    "remuneracion bruta",
    "remuneracion",
    "monto",
    "valor",
];

pub const ALIASES_EFFECTIVE_YEAR: &[&str] = &["ano", "ano vigencia", "vigencia", "periodo"];

/// Expected-header vocabulary per record kind, used to score candidate HTML
/// tables. A table must match at least the configured minimum to be selected.
pub fn expected_headers(kind: RecordKind) -> &'static [&'static str] {
    match kind {
        RecordKind::FeeBased => &[
            "nombre",
            "rut",
            "funcion",
            "honorario",
            "remuneracion",
            "bruta",
            "liquida",
            "monto",
            "fecha",
            "observaciones",
            "calificacion",
        ],
        RecordKind::Payroll | RecordKind::Contract => &[
            "nombre",
            "rut",
            "grado",
            "cargo",
            "remuneracion",
            "bruta",
            "liquida",
            "asignaciones",
            "fecha",
            "region",
            "observaciones",
            "horas",
        ],
        RecordKind::SalaryScale => &[
            "grado",
            "estamento",
            "sueldo",
            "remuneracion",
            "escala",
            "monto",
            "vigencia",
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_header_accents_and_case() {
        assert_eq!(normalize_header("Remuneración Bruta"), "remuneracion bruta");
        assert_eq!(normalize_header("FUNCIÓN"), "funcion");
        assert_eq!(normalize_header("rem. bruta"), "rem bruta");
        assert_eq!(normalize_header("  Año   Vigencia "), "ano vigencia");
    }

    #[test]
    fn test_find_column_exact_before_substring() {
        let headers: Vec<String> = ["nombre completo", "rut", "funcion"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        // "rut" exact-matches column 1 even though "rut" is not in position 0
        assert_eq!(find_column(&headers, ALIASES_IDENTITY), Some(1));
        // "nombre" matches via containment in "nombre completo"
        assert_eq!(find_column(&headers, &["nombre"]), Some(0));
    }

    #[test]
    fn test_find_column_short_header_in_alias() {
        let headers: Vec<String> = vec!["bruta".into()];
        assert_eq!(find_column(&headers, ALIASES_GROSS), Some(0));
    }

    #[test]
    fn test_rut_header_never_matches_gross() {
        // "rut" is a substring of "bruta"; the containment phase must not bite
        let headers: Vec<String> = vec!["nombre".into(), "rut".into(), "monto".into()];
        assert_eq!(find_column(&headers, ALIASES_GROSS), None);
    }

    #[test]
    fn test_find_column_none() {
        let headers: Vec<String> = vec!["x".into(), "y".into()];
        assert_eq!(find_column(&headers, ALIASES_NAME), None);
    }
}
