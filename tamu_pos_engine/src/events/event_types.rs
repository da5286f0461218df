use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderStatusType, PaymentOutcome};

/// Published exactly once per order, when a payment result moves it to `Paid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
}

impl OrderPaidEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Published when an order is cancelled, either by staff or because its payment failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAnnulledEvent {
    pub order: Order,
    pub status: OrderStatusType,
    /// Set if the order was cancelled because the provider reported a failed payment
    pub outcome: Option<PaymentOutcome>,
}

impl OrderAnnulledEvent {
    pub fn new(order: Order) -> Self {
        let status = order.status;
        Self { order, status, outcome: None }
    }

    pub fn with_outcome(mut self, outcome: PaymentOutcome) -> Self {
        self.outcome = Some(outcome);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    OrderPaid(OrderPaidEvent),
    OrderAnnulled(OrderAnnulledEvent),
}
