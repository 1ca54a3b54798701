//! Locale-aware parsing of Chilean peso amounts, RUTs, and dates.
//!
//! Portal cells mix `$` signs, dot thousands separators, comma decimals,
//! parenthesized negatives, and a zoo of "no data" placeholders. Absent or
//! unparseable values map to `None`, never to zero.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

/// Placeholder strings the portal uses for "no value".
const NULL_PLACEHOLDERS: &[&str] = &["-", "--", "no informa", "no aplica", "n/a", "s/i"];

/// Parse a Chilean peso amount into a float.
///
/// `"$ 1.234.567"` → 1234567.0, `"1.234,56"` → 1234.56,
/// `"($ 500.000)"` → -500000.0, `""` / `"-"` → `None`.
pub fn parse_money(text: &str) -> Option<f64> {
    let mut cleaned = text.trim();
    if cleaned.is_empty() || NULL_PLACEHOLDERS.contains(&cleaned.to_lowercase().as_str()) {
        return None;
    }

    // Parentheses mean negative
    let negative = cleaned.starts_with('(') && cleaned.ends_with(')');
    if negative {
        cleaned = &cleaned[1..cleaned.len() - 1];
    }

    let cleaned: String = cleaned
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '$')
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let normalized = if cleaned.contains(',') {
        // Comma present: dots are thousands separators, comma is decimal
        cleaned.replace('.', "").replace(',', ".")
    } else {
        let dots = cleaned.matches('.').count();
        match dots {
            0 => cleaned,
            1 => {
                // A single dot followed by exactly three digits is a
                // thousands separator ("458.832"); otherwise decimal.
                let after = cleaned.split('.').nth(1).unwrap_or("");
                if after.len() == 3 {
                    cleaned.replace('.', "")
                } else {
                    cleaned
                }
            }
            _ => cleaned.replace('.', ""),
        }
    };

    let value: f64 = normalized.parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Whether a cell looks like a monetary value: a `$` sign or a
/// thousands-separated digit group.
pub fn looks_like_money(text: &str) -> bool {
    let t = text.trim();
    if t.contains('$') {
        return true;
    }
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^\s*-?\s*\d{1,3}(\.\d{3})+\s*$").expect("valid regex"));
    re.is_match(t)
}

/// Whether text looks like a Chilean RUT: 7-8 digits plus a check digit
/// (0-9 or K), dots and dash optional.
pub fn is_rut(text: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE
        .get_or_init(|| Regex::new(r"^\s*\d{1,2}\.?\d{3}\.?\d{3}-?[\dkK]\s*$").expect("valid regex"));
    re.is_match(text)
}

/// Parse a date in any of the formats the portal publishes:
/// `dd/mm/yyyy`, `dd-mm-yyyy`, `yyyy-mm-dd`.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let t = text.trim();
    if t.is_empty() {
        return None;
    }
    for fmt in ["%d/%m/%Y", "%d-%m-%Y", "%Y-%m-%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(t, fmt) {
            return Some(d);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_money_thousands() {
        assert_eq!(parse_money("1.234.567"), Some(1_234_567.0));
        assert_eq!(parse_money("$ 458.832"), Some(458_832.0));
    }

    #[test]
    fn test_parse_money_decimal_comma() {
        assert_eq!(parse_money("$ 45.000,50"), Some(45_000.50));
        assert_eq!(parse_money("1.234,56"), Some(1_234.56));
    }

    #[test]
    fn test_parse_money_single_dot_ambiguity() {
        // Three digits after the dot: thousands separator
        assert_eq!(parse_money("458.832"), Some(458_832.0));
        // Two digits after the dot: decimal point
        assert_eq!(parse_money("458.83"), Some(458.83));
    }

    #[test]
    fn test_parse_money_negative_parens() {
        assert_eq!(parse_money("($ 500.000)"), Some(-500_000.0));
    }

    #[test]
    fn test_parse_money_blank_is_none_not_zero() {
        assert_eq!(parse_money(""), None);
        assert_eq!(parse_money("   "), None);
        assert_eq!(parse_money("-"), None);
        assert_eq!(parse_money("no informa"), None);
    }

    #[test]
    fn test_looks_like_money() {
        assert!(looks_like_money("$ 1.000"));
        assert!(looks_like_money("1.234.567"));
        assert!(!looks_like_money("12.345.678-9"));
        assert!(!looks_like_money("Juan Pérez"));
    }

    #[test]
    fn test_is_rut() {
        assert!(is_rut("12.345.678-9"));
        assert!(is_rut("12345678-9"));
        assert!(is_rut("12.345.678-K"));
        assert!(is_rut("9876543-k"));
        assert!(!is_rut("1.234.567"));
        assert!(!is_rut("Juan Pérez"));
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        assert_eq!(parse_date("14/03/2025"), Some(expected));
        assert_eq!(parse_date("14-03-2025"), Some(expected));
        assert_eq!(parse_date("2025-03-14"), Some(expected));
        assert_eq!(parse_date("marzo 2025"), None);
        assert_eq!(parse_date(""), None);
    }
}
