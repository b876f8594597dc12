// src/phone.rs
//
// Country dial codes and phone number checks.

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct CountryCode {
    pub iso: &'static str,
    pub name: &'static str,
    pub dial_code: &'static str,
    /// Digits in the national significant number.
    pub min_len: usize,
    pub max_len: usize,
    /// Whether numbers are written nationally with a leading `0` trunk prefix.
    #[serde(skip)]
    pub trunk_zero: bool,
}

const fn cc(
    iso: &'static str,
    name: &'static str,
    dial_code: &'static str,
    min_len: usize,
    max_len: usize,
    trunk_zero: bool,
) -> CountryCode {
    CountryCode {
        iso,
        name,
        dial_code,
        min_len,
        max_len,
        trunk_zero,
    }
}

pub static COUNTRY_CODES: &[CountryCode] = &[
    cc("US", "United States", "1", 10, 10, false),
    cc("CA", "Canada", "1", 10, 10, false),
    cc("GB", "United Kingdom", "44", 9, 10, true),
    cc("IE", "Ireland", "353", 7, 9, true),
    cc("IN", "India", "91", 10, 10, true),
    cc("PK", "Pakistan", "92", 9, 10, true),
    cc("BD", "Bangladesh", "880", 10, 10, true),
    cc("AU", "Australia", "61", 9, 9, true),
    cc("NZ", "New Zealand", "64", 8, 10, true),
    cc("DE", "Germany", "49", 6, 11, true),
    cc("FR", "France", "33", 9, 9, true),
    cc("ES", "Spain", "34", 9, 9, false),
    cc("IT", "Italy", "39", 6, 11, false),
    cc("PT", "Portugal", "351", 9, 9, false),
    cc("NL", "Netherlands", "31", 9, 9, true),
    cc("BE", "Belgium", "32", 8, 9, true),
    cc("CH", "Switzerland", "41", 9, 9, true),
    cc("AT", "Austria", "43", 4, 13, true),
    cc("SE", "Sweden", "46", 7, 9, true),
    cc("NO", "Norway", "47", 8, 8, false),
    cc("DK", "Denmark", "45", 8, 8, false),
    cc("PL", "Poland", "48", 9, 9, false),
    cc("TR", "Turkey", "90", 10, 10, true),
    cc("RU", "Russia", "7", 10, 10, false),
    cc("IL", "Israel", "972", 8, 9, true),
    cc("AE", "United Arab Emirates", "971", 8, 9, true),
    cc("SA", "Saudi Arabia", "966", 8, 9, true),
    cc("EG", "Egypt", "20", 9, 10, true),
    cc("NG", "Nigeria", "234", 8, 10, true),
    cc("GH", "Ghana", "233", 9, 9, true),
    cc("KE", "Kenya", "254", 9, 9, true),
    cc("ZA", "South Africa", "27", 9, 9, true),
    cc("BR", "Brazil", "55", 10, 11, true),
    cc("MX", "Mexico", "52", 10, 10, false),
    cc("AR", "Argentina", "54", 10, 11, true),
    cc("CO", "Colombia", "57", 10, 10, false),
    cc("CL", "Chile", "56", 9, 9, false),
    cc("CN", "China", "86", 10, 11, true),
    cc("JP", "Japan", "81", 9, 10, true),
    cc("KR", "South Korea", "82", 8, 10, true),
    cc("SG", "Singapore", "65", 8, 8, false),
    cc("MY", "Malaysia", "60", 8, 10, true),
    cc("ID", "Indonesia", "62", 8, 12, true),
    cc("PH", "Philippines", "63", 10, 10, true),
    cc("VN", "Vietnam", "84", 9, 10, true),
    cc("TH", "Thailand", "66", 8, 9, true),
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PhoneError {
    #[error("unknown country `{0}`")]
    UnknownCountry(String),

    #[error("phone number contains invalid characters")]
    InvalidCharacters,

    #[error("phone number is empty")]
    Empty,

    #[error("dial code does not match {0}")]
    DialCodeMismatch(&'static str),

    #[error("expected {min}..={max} digits, got {got}")]
    InvalidLength { min: usize, max: usize, got: usize },

    #[error("{0}")]
    InvalidPattern(&'static str),
}

pub fn find_by_iso(iso: &str) -> Option<&'static CountryCode> {
    COUNTRY_CODES
        .iter()
        .find(|c| c.iso.eq_ignore_ascii_case(iso.trim()))
}

/// Longest dial code prefixing an international number. Shared codes (`+1`)
/// resolve to the first country listed.
pub fn find_by_dial_code(international: &str) -> Option<&'static CountryCode> {
    let digits = international.trim().trim_start_matches('+');
    COUNTRY_CODES
        .iter()
        .filter(|c| digits.starts_with(c.dial_code))
        .rev()
        .max_by_key(|c| c.dial_code.len())
}

/// Drops separators; keeps a leading `+` (or `00`, rewritten to `+`). A
/// trunk `(0)` written after the dial code, as in `+44 (0)20 7946 0958`, is dropped.
pub fn normalize(raw: &str) -> Result<String, PhoneError> {
    let trimmed = raw.trim();
    let trimmed = if trimmed.starts_with('+') || trimmed.starts_with("00") {
        trimmed.replace("(0)", "")
    } else {
        trimmed.to_string()
    };
    let mut out = String::with_capacity(trimmed.len());

    for (i, ch) in trimmed.chars().enumerate() {
        match ch {
            '+' if i == 0 => out.push('+'),
            '0'..='9' => out.push(ch),
            ' ' | '-' | '.' | '(' | ')' => {}
            _ => return Err(PhoneError::InvalidCharacters),
        }
    }

    if let Some(rest) = out.strip_prefix("00") {
        out = format!("+{rest}");
    }
    if out.is_empty() || out == "+" {
        return Err(PhoneError::Empty);
    }
    Ok(out)
}

/// National significant number for `country`, checked against its rules.
pub fn national_number(country: &CountryCode, raw: &str) -> Result<String, PhoneError> {
    let normalized = normalize(raw)?;

    let national = match normalized.strip_prefix('+') {
        Some(intl) => intl
            .strip_prefix(country.dial_code)
            .ok_or(PhoneError::DialCodeMismatch(country.iso))?
            .to_string(),
        None if country.trunk_zero => normalized
            .strip_prefix('0')
            .unwrap_or(&normalized)
            .to_string(),
        None if country.dial_code == "1" => normalized
            .strip_prefix('1')
            .filter(|rest| rest.len() == 10)
            .unwrap_or(&normalized)
            .to_string(),
        None => normalized,
    };

    let len = national.len();
    if len < country.min_len || len > country.max_len {
        return Err(PhoneError::InvalidLength {
            min: country.min_len,
            max: country.max_len,
            got: len,
        });
    }

    check_country_rules(country.iso, &national)?;
    Ok(national)
}

fn check_country_rules(iso: &str, national: &str) -> Result<(), PhoneError> {
    let bytes = national.as_bytes();
    match iso {
        "US" | "CA" => {
            if matches!(bytes[0], b'0' | b'1') {
                return Err(PhoneError::InvalidPattern("area code cannot start with 0 or 1"));
            }
            if matches!(bytes[3], b'0' | b'1') {
                return Err(PhoneError::InvalidPattern("exchange cannot start with 0 or 1"));
            }
        }
        "IN" => {
            if !matches!(bytes[0], b'6'..=b'9') {
                return Err(PhoneError::InvalidPattern("mobile numbers start with 6-9"));
            }
        }
        "GB" => {
            if bytes[0] == b'7' && bytes.len() != 10 {
                return Err(PhoneError::InvalidPattern("mobile numbers have 10 digits"));
            }
        }
        _ => {}
    }
    Ok(())
}

/// Validates and returns the E.164 form, e.g. `+14155550123`.
pub fn validate(iso: &str, raw: &str) -> Result<String, PhoneError> {
    let country = find_by_iso(iso).ok_or_else(|| PhoneError::UnknownCountry(iso.to_string()))?;
    let national = national_number(country, raw)?;
    Ok(format!("+{}{}", country.dial_code, national))
}

pub fn format_international(iso: &str, raw: &str) -> Result<String, PhoneError> {
    let country = find_by_iso(iso).ok_or_else(|| PhoneError::UnknownCountry(iso.to_string()))?;
    let national = national_number(country, raw)?;

    if country.dial_code == "1" {
        return Ok(format!(
            "+1 ({}) {}-{}",
            &national[..3],
            &national[3..6],
            &national[6..]
        ));
    }
    Ok(format!("+{} {}", country.dial_code, national))
}
