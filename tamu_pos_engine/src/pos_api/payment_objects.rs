use serde::{Deserialize, Serialize};
use tamu_common::{Kes, ProviderResult};

use crate::db_types::{ApplyResultOutcome, Order, OrderId, OrderStatusType};

/// The result of a successful `initiate_payment` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInitiated {
    pub order_id: OrderId,
    pub checkout_request_id: String,
    pub merchant_request_id: String,
    pub customer_message: String,
    pub amount: Kes,
}

/// What a server-side status query found, and what it did about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileResult {
    pub checkout_request_id: String,
    pub result: ProviderResult,
    /// Only set when the provider reported success and the result was applied to the order.
    pub applied: Option<ApplyResultOutcome>,
}

/// The public payment status of an order. Deliberately omits anything a customer should not see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPaymentStatus {
    pub order_id: OrderId,
    pub order_number: String,
    pub status: OrderStatusType,
    pub transaction_id: Option<String>,
    pub payment_method: Option<String>,
    pub total_amount: Kes,
    pub callback_received: bool,
}

impl From<Order> for OrderPaymentStatus {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.id,
            order_number: order.order_number,
            status: order.status,
            transaction_id: order.transaction_id,
            payment_method: order.payment_method,
            total_amount: order.total,
            callback_received: order.callback_received,
        }
    }
}
