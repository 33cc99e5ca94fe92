//! Phone number normalization.

use thiserror::Error;

/// A number that cannot be turned into E.164.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhoneError {
    /// Fewer than ten digits after stripping formatting.
    #[error("phone number '{raw}' has {digits} digits, need at least 10")]
    TooShort {
        /// The number as entered.
        raw: String,
        /// Digits found.
        digits: usize,
    },
}

/// Normalizes a user-entered number to E.164.
///
/// Non-digits are stripped. Exactly ten digits get `+{country_code}`
/// prepended; longer numbers are assumed to already carry a country code.
///
/// # Errors
///
/// Returns [`PhoneError::TooShort`] for fewer than ten digits.
///
/// # Examples
///
/// ```
/// use haven::messaging::normalize_phone;
///
/// assert_eq!(normalize_phone("98765 43210", "91").unwrap(), "+919876543210");
/// assert_eq!(normalize_phone("+1 (415) 555-0100", "91").unwrap(), "+14155550100");
/// ```
pub fn normalize_phone(raw: &str, country_code: &str) -> Result<String, PhoneError> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    match digits.len() {
        10 => {
            let cc: String = country_code.chars().filter(char::is_ascii_digit).collect();
            Ok(format!("+{cc}{digits}"))
        },
        n if n > 10 => Ok(format!("+{digits}")),
        n => Err(PhoneError::TooShort {
            raw: raw.to_string(),
            digits: n,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("9876543210", "+919876543210" ; "bare ten digits")]
    #[test_case("98765-43210", "+919876543210" ; "dashed ten digits")]
    #[test_case("+91 98765 43210", "+919876543210" ; "already prefixed")]
    #[test_case("14155550100", "+14155550100" ; "eleven digits")]
    #[test_case("(415) 555-0100 x", "+914155550100" ; "us format without code")]
    fn test_normalize(raw: &str, expected: &str) {
        assert_eq!(normalize_phone(raw, "91").expect("valid"), expected);
    }

    #[test]
    fn test_country_code_is_configurable() {
        assert_eq!(
            normalize_phone("4155550100", "+1").expect("valid"),
            "+14155550100"
        );
    }

    #[test_case("" ; "empty")]
    #[test_case("12345" ; "five digits")]
    #[test_case("call me" ; "no digits")]
    fn test_too_short(raw: &str) {
        assert!(matches!(
            normalize_phone(raw, "91"),
            Err(PhoneError::TooShort { .. })
        ));
    }
}
