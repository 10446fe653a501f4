//! Recipient phone normalization.
//!
//! Numbers are reduced to digits. Brazilian numbers stored without the
//! country code (11 digits: area code + mobile) get `55` prepended. Every
//! other length is passed through untouched; the gateway is the final judge.

/// Brazilian country calling code.
pub const COUNTRY_CODE: &str = "55";

/// Digits in a national number (2-digit area code + 9-digit mobile).
const NATIONAL_LEN: usize = 11;

/// Reasons a recipient number cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PhoneError {
    #[error("invalid phone")]
    Missing,
}

/// Normalize a stored phone number into the digits-only form the gateway expects.
pub fn normalize(raw: Option<&str>) -> Result<String, PhoneError> {
    let digits: String = raw
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_digit)
        .collect();

    if digits.is_empty() {
        return Err(PhoneError::Missing);
    }

    if digits.len() == NATIONAL_LEN {
        return Ok(format!("{COUNTRY_CODE}{digits}"));
    }

    // 13 digits starting with 55 are already international; other lengths
    // are not validated further.
    Ok(digits)
}
