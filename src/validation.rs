//! Stateless field validators shared by the data-entry forms. Each accepts
//! raw user input and returns the normalized value or a typed error.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("el valor no puede estar vacío")]
    Empty,
    #[error("el CURP debe tener 18 caracteres (tiene {0})")]
    CurpLength(usize),
    #[error("el formato del CURP no es válido")]
    CurpFormat,
    #[error("el número solo debe contener dígitos, espacios, guiones o +")]
    PhoneCharacters,
    #[error("el teléfono debe tener 10 dígitos (tiene {0})")]
    PhoneLength(usize),
    #[error("el correo electrónico no es válido")]
    EmailFormat,
    #[error("el código postal debe tener 5 dígitos")]
    PostalCodeFormat,
}

static CURP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{4}[0-9]{6}[HM][A-Z]{5}[0-9A-Z][0-9]$").unwrap());
static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?\d+$").unwrap());
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());
static POSTAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{5}$").unwrap());

/// Validate a Mexican CURP; returns it trimmed and uppercased.
pub fn validate_curp(raw: &str) -> Result<String, ValidationError> {
    if raw.trim().is_empty() {
        return Err(ValidationError::Empty);
    }
    let curp = raw.trim().to_uppercase();
    if curp.len() != 18 {
        return Err(ValidationError::CurpLength(curp.len()));
    }
    if !CURP_RE.is_match(&curp) {
        return Err(ValidationError::CurpFormat);
    }
    Ok(curp)
}

/// Validate a Mexican phone number; strips separators and the 52 country
/// prefix, returns the bare 10 digits.
pub fn validate_phone(raw: &str) -> Result<String, ValidationError> {
    if raw.trim().is_empty() {
        return Err(ValidationError::Empty);
    }
    let mut digits: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    if !PHONE_RE.is_match(&digits) {
        return Err(ValidationError::PhoneCharacters);
    }
    if let Some(rest) = digits.strip_prefix("+52") {
        digits = rest.to_string();
    } else if digits.len() > 10 {
        if let Some(rest) = digits.strip_prefix("52") {
            digits = rest.to_string();
        }
    }
    let digits = digits.trim_start_matches('+').to_string();
    if digits.len() != 10 {
        return Err(ValidationError::PhoneLength(digits.len()));
    }
    Ok(digits)
}

/// Display form for a validated 10-digit number: `(55) 1234-5678`.
pub fn format_phone(ten_digits: &str) -> String {
    if ten_digits.len() != 10 {
        return ten_digits.to_string();
    }
    format!(
        "({}) {}-{}",
        &ten_digits[..2],
        &ten_digits[2..6],
        &ten_digits[6..]
    )
}

/// Validate an email address; returns it trimmed and lowercased.
pub fn validate_email(raw: &str) -> Result<String, ValidationError> {
    if raw.trim().is_empty() {
        return Err(ValidationError::Empty);
    }
    let email = raw.trim().to_lowercase();
    if !EMAIL_RE.is_match(&email) {
        return Err(ValidationError::EmailFormat);
    }
    Ok(email)
}

/// Validate a 5-digit Mexican postal code.
pub fn validate_postal_code(raw: &str) -> Result<String, ValidationError> {
    if raw.trim().is_empty() {
        return Err(ValidationError::Empty);
    }
    let code = raw.trim().to_string();
    if !POSTAL_RE.is_match(&code) {
        return Err(ValidationError::PostalCodeFormat);
    }
    Ok(code)
}
