//! Field validators shared by requests and gateway inputs
//!
//! - Positive amounts
//! - ISO 4217 currency codes
//! - Hex-encoded SHA-256 digests
//! - IBAN / BIC shape checks for bank rails

use crate::CURRENCY_CODE_LEN;
use regex::Regex;
use rust_decimal::Decimal;
use std::borrow::Cow;
use validator::ValidationError;

/// Hex length of a SHA-256 digest
pub const SHA256_HEX_LEN: usize = 64;

lazy_static::lazy_static! {
    static ref BIC_REGEX: Regex = Regex::new(r"^[A-Z]{6}[A-Z0-9]{2}([A-Z0-9]{3})?$").unwrap();
    static ref IBAN_REGEX: Regex = Regex::new(r"^[A-Z]{2}[0-9]{2}[A-Z0-9]{11,30}$").unwrap();
}

fn error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

/// Amount must be strictly positive
pub fn validate_positive_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount <= Decimal::ZERO {
        return Err(error("amount_not_positive", "amount must be greater than zero"));
    }
    Ok(())
}

/// Currency must be three upper-case ASCII letters
pub fn validate_currency_code(currency: &str) -> Result<(), ValidationError> {
    if !is_currency_code(currency) {
        return Err(error(
            "invalid_currency",
            "currency must be a 3-letter ISO 4217 code",
        ));
    }
    Ok(())
}

/// Three upper-case ASCII letters
pub fn is_currency_code(currency: &str) -> bool {
    currency.len() == CURRENCY_CODE_LEN && currency.chars().all(|c| c.is_ascii_uppercase())
}

/// 64 hexadecimal characters
pub fn is_sha256_hex(value: &str) -> bool {
    value.len() == SHA256_HEX_LEN && value.chars().all(|c| c.is_ascii_hexdigit())
}

/// IBAN shape (country, check digits, BBAN); spaces are ignored.
/// The mod-97 checksum is not verified.
pub fn is_iban(value: &str) -> bool {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    IBAN_REGEX.is_match(&compact.to_ascii_uppercase())
}

/// BIC / SWIFT code, 8 or 11 characters
pub fn is_bic(value: &str) -> bool {
    BIC_REGEX.is_match(value)
}
