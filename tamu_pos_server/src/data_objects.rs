use std::fmt::Display;

use daraja_tools::StkCallback;
use serde::{Deserialize, Serialize};
use tamu_common::{Kes, ProviderResult};
use tamu_pos_engine::{
    db_types::{OrderId, OrderMode, OrderStatusType, PaymentOutcome},
    order_objects::OrderQueryFilter,
};

use crate::errors::ServerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// Body of `POST /api/payments/stk-push`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StkPushParams {
    pub phone_number: String,
    /// Shillings. Defaults to the order total.
    #[serde(default)]
    pub amount: Option<Kes>,
    pub order_id: OrderId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StkPushResponse {
    pub message: String,
    pub checkout_request_id: String,
    pub merchant_request_id: String,
}

/// What `GET /api/payments/status/{checkoutRequestId}` found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusResponse {
    pub checkout_request_id: String,
    pub result: ProviderResult,
    /// The order's status after the result was applied. Only present when the provider reported success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_status: Option<OrderStatusType>,
}

/// Query string for `GET /api/orders`, e.g. `?status=OPEN,PENDING_PAYMENT&mode=TABLE&limit=20`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderSearchParams {
    /// A comma-separated list of statuses
    pub status: Option<String>,
    pub mode: Option<String>,
    pub limit: Option<i64>,
}

impl TryFrom<OrderSearchParams> for OrderQueryFilter {
    type Error = ServerError;

    fn try_from(params: OrderSearchParams) -> Result<Self, Self::Error> {
        let mut filter = OrderQueryFilter::default();
        if let Some(statuses) = params.status {
            for s in statuses.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let status = s.parse::<OrderStatusType>().map_err(|e| ServerError::ValidationError(e.to_string()))?;
                filter = filter.with_status(status);
            }
        }
        if let Some(mode) = params.mode.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let mode = mode.parse::<OrderMode>().map_err(|e| ServerError::ValidationError(e.to_string()))?;
            filter = filter.with_mode(mode);
        }
        if let Some(limit) = params.limit {
            if limit <= 0 {
                return Err(ServerError::ValidationError(format!("limit must be positive, not {limit}")));
            }
            filter = filter.with_limit(limit);
        }
        Ok(filter)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineQuantityUpdate {
    pub quantity: i64,
}

/// Folds the provider's callback into the outcome the engine applies. `ResultCode` 0 is the only success.
pub fn callback_outcome(callback: &StkCallback) -> PaymentOutcome {
    let description = callback.result_desc.clone();
    if callback.is_success() {
        let outcome = PaymentOutcome::success(description);
        match callback.receipt_number() {
            Some(receipt) => outcome.with_receipt(receipt),
            None => outcome,
        }
    } else {
        PaymentOutcome::failure(callback.result_code.clone(), description)
    }
}
