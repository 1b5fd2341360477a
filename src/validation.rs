//! Field-level checks applied before anything is written
//!
//! Everything here is deliberately small: each check either passes or returns a
//! [`NackError::Validation`] naming the offending field.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{NackError, Result};

lazy_static! {
    static ref WHATSAPP_REGEX: Regex = Regex::new(r"^\+241[0-9]{8}$").unwrap();
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 8;

/// Strip the separators people type into phone numbers
///
/// # Examples
/// ```
/// use nack::validation::normalize_phone;
///
/// assert_eq!(normalize_phone("+241 06 12 34 56"), "+24106123456");
/// ```
pub fn normalize_phone(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '.')
        .collect()
}

/// Check a Gabonese WhatsApp number: `+241` followed by exactly 8 digits
///
/// The number is normalized first and the normalized form is returned so
/// callers store a single canonical representation.
pub fn validate_whatsapp(raw: &str) -> Result<String> {
    let phone = normalize_phone(raw);
    if WHATSAPP_REGEX.is_match(&phone) {
        Ok(phone)
    } else {
        Err(NackError::invalid(format!(
            "phone number '{}' must be +241 followed by 8 digits",
            raw
        )))
    }
}

pub fn validate_email(raw: &str) -> Result<String> {
    let email = raw.trim().to_lowercase();
    if EMAIL_REGEX.is_match(&email) {
        Ok(email)
    } else {
        Err(NackError::invalid(format!("'{}' is not a valid email address", raw)))
    }
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(NackError::invalid(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Trim a required text field and reject it when nothing is left
pub fn require_text(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(NackError::invalid(format!("{} cannot be empty", field)));
    }
    Ok(trimmed.to_string())
}

/// Amounts, costs, stock levels and thresholds are never negative
pub fn require_non_negative(field: &str, value: i64) -> Result<i64> {
    if value < 0 {
        return Err(NackError::invalid(format!("{} cannot be negative", field)));
    }
    Ok(value)
}

pub fn require_positive(field: &str, value: u32) -> Result<u32> {
    if value == 0 {
        return Err(NackError::invalid(format!("{} must be at least 1", field)));
    }
    Ok(value)
}
