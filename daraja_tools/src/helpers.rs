use chrono::{DateTime, FixedOffset, Utc};

use crate::DarajaApiError;

const KENYA_COUNTRY_CODE: &str = "254";
/// Daraja timestamps are in East Africa Time (UTC+3, no daylight saving).
const EAT_OFFSET_SECS: i32 = 3 * 3600;

/// Normalises a Kenyan mobile number into the `2547XXXXXXXX` form Daraja expects.
///
/// * Non-digits are stripped (`+254 712-345 678` is fine).
/// * A leading `0` is replaced with the country code.
/// * Numbers already starting with `254` are left alone.
/// * Bare 9-digit subscriber numbers get the country code prepended.
pub fn format_phone_number(phone: &str) -> Result<String, DarajaApiError> {
    let digits = phone.chars().filter(char::is_ascii_digit).collect::<String>();
    let formatted = if let Some(rest) = digits.strip_prefix('0') {
        format!("{KENYA_COUNTRY_CODE}{rest}")
    } else if digits.starts_with(KENYA_COUNTRY_CODE) {
        digits
    } else if digits.len() == 9 {
        format!("{KENYA_COUNTRY_CODE}{digits}")
    } else {
        digits
    };
    if formatted.len() == 12 && formatted.starts_with(KENYA_COUNTRY_CODE) {
        Ok(formatted)
    } else {
        Err(DarajaApiError::InvalidPhoneNumber(phone.to_string()))
    }
}

/// The `YYYYMMDDHHmmss` timestamp used in the request signature.
pub fn daraja_timestamp(now: DateTime<Utc>) -> String {
    match FixedOffset::east_opt(EAT_OFFSET_SECS) {
        Some(eat) => now.with_timezone(&eat).format("%Y%m%d%H%M%S").to_string(),
        None => now.format("%Y%m%d%H%M%S").to_string(),
    }
}

/// `base64(shortcode + passkey + timestamp)`
pub fn stk_password(shortcode: &str, passkey: &str, timestamp: &str) -> String {
    base64::encode(format!("{shortcode}{passkey}{timestamp}"))
}

/// The value of the `Authorization` header for the OAuth token request.
pub fn basic_auth_header(consumer_key: &str, consumer_secret: &str) -> String {
    format!("Basic {}", base64::encode(format!("{consumer_key}:{consumer_secret}")))
}
