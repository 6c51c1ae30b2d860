//! Phone number canonicalization.
//!
//! Audience rows are keyed by E.164 msisdn, so every number entering the
//! system goes through [`normalize_msisdn`] before any duplicate check.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PhoneError {
    #[error("phone number is empty")]
    Empty,
    #[error("phone number contains invalid characters: {0}")]
    InvalidCharacters(String),
    #[error("phone number has invalid length: {0}")]
    InvalidLength(String),
}

/// Normalize a raw phone number into `+<country code><number>` form.
///
/// Accepts common formatting noise (spaces, dashes, dots, parentheses) and
/// the `00` international prefix. Numbers without a leading `+` are assumed
/// to already carry a country code.
pub fn normalize_msisdn(raw: &str) -> Result<String, PhoneError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PhoneError::Empty);
    }

    let mut digits = String::with_capacity(trimmed.len());
    for (i, ch) in trimmed.chars().enumerate() {
        match ch {
            '0'..='9' => digits.push(ch),
            '+' if i == 0 => {}
            ' ' | '-' | '.' | '(' | ')' => {}
            _ => return Err(PhoneError::InvalidCharacters(trimmed.to_string())),
        }
    }

    let digits = digits.strip_prefix("00").unwrap_or(&digits);

    if digits.len() < 8 || digits.len() > 15 {
        return Err(PhoneError::InvalidLength(trimmed.to_string()));
    }
    if digits.starts_with('0') {
        return Err(PhoneError::InvalidLength(trimmed.to_string()));
    }

    Ok(format!("+{}", digits))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_international_number() {
        assert_eq!(normalize_msisdn("+14155552671").unwrap(), "+14155552671");
    }

    #[test]
    fn test_strips_formatting_noise() {
        assert_eq!(
            normalize_msisdn("+1 (415) 555-2671").unwrap(),
            "+14155552671"
        );
        assert_eq!(normalize_msisdn("91.98765.43210").unwrap(), "+919876543210");
    }

    #[test]
    fn test_double_zero_prefix() {
        assert_eq!(normalize_msisdn("0014155552671").unwrap(), "+14155552671");
    }

    #[test]
    fn test_bare_number_assumed_country_coded() {
        assert_eq!(normalize_msisdn("14155552671").unwrap(), "+14155552671");
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(normalize_msisdn("   "), Err(PhoneError::Empty));
    }

    #[test]
    fn test_rejects_letters() {
        assert!(matches!(
            normalize_msisdn("+1-800-FLOWERS"),
            Err(PhoneError::InvalidCharacters(_))
        ));
    }

    #[test]
    fn test_rejects_short_and_long() {
        assert!(matches!(
            normalize_msisdn("+1234567"),
            Err(PhoneError::InvalidLength(_))
        ));
        assert!(matches!(
            normalize_msisdn("+1234567890123456"),
            Err(PhoneError::InvalidLength(_))
        ));
    }

    #[test]
    fn test_rejects_leading_zero_after_prefix() {
        assert!(matches!(
            normalize_msisdn("+04155552671"),
            Err(PhoneError::InvalidLength(_))
        ));
    }
}
