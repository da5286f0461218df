use std::time::Duration;

use log::*;
use tamu_common::Secret;

use crate::DarajaApiError;

pub const DEFAULT_DARAJA_BASE_URL: &str = "https://sandbox.safaricom.co.ke";
pub const DEFAULT_DARAJA_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything needed to talk to Daraja on behalf of one merchant (restaurant).
///
/// The credentials are per-tenant and come from the restaurant record. `base_url`, `callback_url` and `timeout` are
/// deployment settings.
#[derive(Debug, Clone)]
pub struct DarajaConfig {
    pub consumer_key: String,
    pub consumer_secret: Secret<String>,
    pub passkey: Secret<String>,
    /// The paybill / till number. Used as both `BusinessShortCode` and `PartyB`.
    pub shortcode: String,
    pub callback_url: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for DarajaConfig {
    fn default() -> Self {
        Self {
            consumer_key: String::default(),
            consumer_secret: Secret::default(),
            passkey: Secret::default(),
            shortcode: String::default(),
            callback_url: String::default(),
            base_url: DEFAULT_DARAJA_BASE_URL.to_string(),
            timeout: DEFAULT_DARAJA_TIMEOUT,
        }
    }
}

impl DarajaConfig {
    pub fn new(
        consumer_key: &str,
        consumer_secret: &str,
        passkey: &str,
        shortcode: &str,
        callback_url: &str,
    ) -> Self {
        Self {
            consumer_key: consumer_key.to_string(),
            consumer_secret: Secret::from(consumer_secret),
            passkey: Secret::from(passkey),
            shortcode: shortcode.to_string(),
            callback_url: callback_url.to_string(),
            ..Default::default()
        }
    }

    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Lists every required field that is empty, so that an operator can fix the whole configuration in one go.
    pub fn missing_fields(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.consumer_key.trim().is_empty() {
            missing.push("consumer_key".to_string());
        }
        if self.consumer_secret.is_empty() {
            missing.push("consumer_secret".to_string());
        }
        if self.passkey.is_empty() {
            missing.push("passkey".to_string());
        }
        if self.shortcode.trim().is_empty() {
            missing.push("shortcode".to_string());
        }
        if self.callback_url.trim().is_empty() {
            missing.push("callback_url".to_string());
        }
        if self.base_url.trim().is_empty() {
            missing.push("base_url".to_string());
        }
        missing
    }

    pub fn validate(&self) -> Result<(), DarajaApiError> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            warn!("💳️ Rejecting M-Pesa configuration for shortcode '{}'. Missing {missing:?}", self.shortcode);
            Err(DarajaApiError::MissingCredentials(missing))
        }
    }
}
