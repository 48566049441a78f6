//! Domain layer: the four record types, their value objects and the ports
//! through which the application reaches storage, signing and time.

pub mod drug;
pub mod ports;
pub mod prescription;
pub mod transaction;
pub mod user;

use chrono::NaiveDate;

/// Calendar dates are stored and signed as `DD/MM/YYYY`.
pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// Separates fields inside a canonical signing payload.
const FIELD_SEPARATOR: char = '\u{1f}';

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}

/// Joins field values in a fixed order into the bytes that get signed.
///
/// The same field list must be used at signing and at verification time;
/// any change to one of the values yields a different payload.
pub(crate) fn canonical_payload(fields: &[&str]) -> Vec<u8> {
    let mut payload = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            payload.push(FIELD_SEPARATOR);
        }
        payload.push_str(field);
    }
    payload.into_bytes()
}

/// Control characters, the field separator among them, may not appear in
/// any signed field.
pub(crate) fn has_control_chars(value: &str) -> bool {
    value.chars().any(char::is_control)
}

/// Drug names are keys compared without regard to case or surrounding space.
pub fn names_match(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_format_roundtrip() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert_eq!(format_date(date), "01/01/2025");
        assert_eq!(parse_date(" 01/01/2025 "), Some(date));
        assert_eq!(parse_date("2025-01-01"), None);
    }

    #[test]
    fn test_canonical_payload_separates_fields() {
        let a = canonical_payload(&["ab", "c"]);
        let b = canonical_payload(&["a", "bc"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_names_match_ignores_case() {
        assert!(names_match("Aspirin", "aspirin"));
        assert!(names_match("PARACETAMOL ", "paracetamol"));
        assert!(!names_match("Aspirin", "Ibuprofen"));
    }
}
