//! Validation utilities for field-record input

use rust_decimal::Decimal;
use thiserror::Error;

/// Validation failures raised by the field-record domain
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Farmer code must not be empty")]
    EmptyIdentity,

    #[error("Field {field} only accepts unsigned decimal input")]
    InvalidNumber { field: &'static str },

    #[error("Unknown lot: {0}")]
    UnknownLote(String),

    #[error("Unknown tape color: {0}")]
    UnknownTapeColor(String),

    #[error("Unknown form field: {0}")]
    UnknownField(String),
}

impl ValidationError {
    /// Message shown to field workers
    pub fn message_es(&self) -> String {
        match self {
            ValidationError::EmptyIdentity => {
                "Por favor, ingrese su código de agricultor.".to_string()
            }
            ValidationError::InvalidNumber { field } => {
                format!("El campo {} solo acepta números.", field)
            }
            ValidationError::UnknownLote(value) => format!("Lote desconocido: {}", value),
            ValidationError::UnknownTapeColor(value) => {
                format!("Color de cinta desconocido: {}", value)
            }
            ValidationError::UnknownField(value) => format!("Campo desconocido: {}", value),
        }
    }
}

/// Check that a keystroke leaves a count field as a (possibly partial)
/// unsigned decimal: optional digits, at most one dot, optional digits.
///
/// Accepts `""`, `"12"`, `"12."`, `".5"` and `"."`; rejects `"12.3.4"`,
/// signs, spaces and anything non-ASCII.
pub fn is_partial_decimal(raw: &str) -> bool {
    let mut seen_dot = false;
    for c in raw.chars() {
        match c {
            '0'..='9' => {}
            '.' if !seen_dot => seen_dot = true,
            _ => return false,
        }
    }
    true
}

/// Parse a count field leniently: anything that is not a number (empty
/// input, a lone dot) counts as zero. A number too large for `Decimal`
/// saturates to `Decimal::MAX`, the same as an overflowing sum.
pub fn parse_count(raw: &str) -> Decimal {
    if !is_partial_decimal(raw) {
        return Decimal::ZERO;
    }

    let (whole, fraction) = match raw.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (raw, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Decimal::ZERO;
    }

    let whole = if whole.is_empty() { "0" } else { whole };
    let canonical = if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, fraction)
    };

    match canonical.parse::<Decimal>() {
        Ok(value) => value,
        Err(_) if whole.trim_start_matches('0').is_empty() => Decimal::ZERO,
        Err(_) => Decimal::MAX,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_decimal_accepts_typing_states() {
        assert!(is_partial_decimal(""));
        assert!(is_partial_decimal("12"));
        assert!(is_partial_decimal("12."));
        assert!(is_partial_decimal(".5"));
        assert!(is_partial_decimal("."));
        assert!(is_partial_decimal("007.250"));
    }

    #[test]
    fn test_partial_decimal_rejects_garbage() {
        assert!(!is_partial_decimal("12.3.4"));
        assert!(!is_partial_decimal(".."));
        assert!(!is_partial_decimal("-1"));
        assert!(!is_partial_decimal("+1"));
        assert!(!is_partial_decimal("1 2"));
        assert!(!is_partial_decimal("1e3"));
        assert!(!is_partial_decimal("١٢"));
    }

    #[test]
    fn test_parse_count_values() {
        assert_eq!(parse_count("10"), Decimal::from(10));
        assert_eq!(parse_count("12."), Decimal::from(12));
        assert_eq!(parse_count(".5"), Decimal::new(5, 1));
        assert_eq!(parse_count("2.50"), Decimal::new(25, 1));
    }

    #[test]
    fn test_parse_count_falls_back_to_zero() {
        assert_eq!(parse_count(""), Decimal::ZERO);
        assert_eq!(parse_count("."), Decimal::ZERO);
        assert_eq!(parse_count("abc"), Decimal::ZERO);
    }

    #[test]
    fn test_parse_count_saturates_on_overflow() {
        assert_eq!(parse_count("99999999999999999999999999999999999"), Decimal::MAX);
        assert_eq!(parse_count("123456789012345678901234567890.5"), Decimal::MAX);
    }

    #[test]
    fn test_empty_identity_message() {
        assert_eq!(
            ValidationError::EmptyIdentity.message_es(),
            "Por favor, ingrese su código de agricultor."
        );
    }
}
