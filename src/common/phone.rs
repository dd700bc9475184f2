// src/common/phone.rs

use crate::common::error::AppError;

/// Normalizes a North American phone number to E.164 (`+15125550199`).
///
/// Accepts any punctuation the customer typed; only digits are kept. Ten
/// digits get the `+1` country code, eleven digits must already start with 1.
pub fn normalize_phone(raw: &str) -> Result<String, AppError> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    let national = match digits.len() {
        10 => digits.as_str(),
        11 if digits.starts_with('1') => &digits[1..],
        _ => {
            return Err(AppError::InvalidInput(format!(
                "'{}' is not a valid phone number",
                raw
            )))
        }
    };

    // Area codes and exchanges never start with 0 or 1 (NANP).
    if national.starts_with(['0', '1']) || national[3..].starts_with(['0', '1']) {
        return Err(AppError::InvalidInput(format!(
            "'{}' is not a valid phone number",
            raw
        )));
    }

    Ok(format!("+1{}", national))
}

/// Human formatting used in driver-facing views: `(512) 555-0199`.
pub fn display_phone(e164: &str) -> String {
    match e164.strip_prefix("+1") {
        Some(national) if national.len() == 10 && national.is_ascii() => format!(
            "({}) {}-{}",
            &national[..3],
            &national[3..6],
            &national[6..]
        ),
        _ => e164.to_string(),
    }
}
