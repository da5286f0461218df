//! Wire types for the Daraja API. Field names follow Safaricom's (inconsistent) casing exactly.
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StkPushRequest {
    pub business_short_code: String,
    pub password: String,
    pub timestamp: String,
    pub transaction_type: String,
    pub amount: i64,
    pub party_a: String,
    pub party_b: String,
    pub phone_number: String,
    #[serde(rename = "CallBackURL")]
    pub call_back_url: String,
    pub account_reference: String,
    pub transaction_desc: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StkPushResponse {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResponseCode", deserialize_with = "string_or_number")]
    pub response_code: String,
    #[serde(rename = "ResponseDescription", default)]
    pub response_description: String,
    #[serde(rename = "CustomerMessage", default)]
    pub customer_message: String,
}

/// What the caller gets back from a successful STK push request. `checkout_request_id` is the correlation key for
/// the callback and for status queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushReceipt {
    pub checkout_request_id: String,
    pub merchant_request_id: String,
    pub customer_message: String,
}

impl From<StkPushResponse> for PushReceipt {
    fn from(r: StkPushResponse) -> Self {
        Self {
            checkout_request_id: r.checkout_request_id,
            merchant_request_id: r.merchant_request_id,
            customer_message: r.customer_message,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StkQueryRequest {
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StkQueryResponse {
    #[serde(rename = "ResponseCode", default, deserialize_with = "opt_string_or_number")]
    pub response_code: Option<String>,
    #[serde(rename = "ResponseDescription", default)]
    pub response_description: Option<String>,
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID", default)]
    pub checkout_request_id: Option<String>,
    #[serde(rename = "ResultCode", default, deserialize_with = "opt_string_or_number")]
    pub result_code: Option<String>,
    #[serde(rename = "ResultDesc", default)]
    pub result_desc: Option<String>,
}

/// The structured error body Daraja returns for rejected requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DarajaErrorBody {
    #[serde(default)]
    pub request_id: Option<String>,
    pub error_code: String,
    #[serde(default)]
    pub error_message: String,
}

//-----------------------------------------------   Callback   -------------------------------------------------------
/// The envelope M-Pesa posts to the callback URL: `{ "Body": { "stkCallback": { ... } } }`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StkCallbackEnvelope {
    #[serde(rename = "Body")]
    pub body: StkCallbackBody,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StkCallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode", deserialize_with = "string_or_number")]
    pub result_code: String,
    #[serde(rename = "ResultDesc", default)]
    pub result_desc: String,
    #[serde(rename = "CallbackMetadata", default, skip_serializing_if = "Option::is_none")]
    pub callback_metadata: Option<CallbackMetadata>,
}

impl StkCallback {
    /// `ResultCode` arrives as `0` or `"0"`, depending on the M-Pesa environment.
    pub fn is_success(&self) -> bool {
        self.result_code.trim().parse::<i64>().is_ok_and(|code| code == 0)
    }

    /// Looks up a named item (e.g. `MpesaReceiptNumber`) in the callback metadata.
    pub fn metadata_item(&self, name: &str) -> Option<&Value> {
        self.callback_metadata
            .as_ref()
            .and_then(|m| m.items.iter().find(|i| i.name == name))
            .and_then(|i| i.value.as_ref())
    }

    pub fn receipt_number(&self) -> Option<String> {
        self.metadata_item("MpesaReceiptNumber").and_then(|v| v.as_str()).map(String::from)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    pub items: Vec<CallbackItem>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    pub value: Option<Value>,
}

/// The only response the callback endpoint ever sends. Anything else makes M-Pesa retry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CallbackAck {
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
}

impl Default for CallbackAck {
    fn default() -> Self {
        Self { result_code: 0, result_desc: "Success".to_string() }
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    value_to_code(value).ok_or_else(|| serde::de::Error::custom("expected a string or a number"))
}

fn opt_string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(value_to_code))
}

fn value_to_code(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
