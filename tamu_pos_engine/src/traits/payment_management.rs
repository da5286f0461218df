use crate::{
    db_types::{
        ApplyResultOutcome,
        GatewayCredentials,
        NewPaymentAttempt,
        Order,
        OrderId,
        PaymentAttempt,
        PaymentOutcome,
        RestaurantId,
    },
    traits::PosEngineError,
};

#[allow(async_fn_in_trait)]
pub trait PaymentManagement {
    /// The restaurant's stored M-Pesa credentials. `None` if the restaurant does not exist.
    async fn fetch_gateway_credentials(
        &self,
        restaurant_id: &RestaurantId,
    ) -> Result<Option<GatewayCredentials>, PosEngineError>;

    /// In a single transaction, stores the attempt, points the order's `transaction_id` at it and moves the order to
    /// `PendingPayment`. Fails with [`PosEngineError::InvalidTransition`] if the order has reached a terminal status in
    /// the meantime.
    async fn record_payment_attempt(
        &self,
        restaurant_id: &RestaurantId,
        order_id: &OrderId,
        attempt: NewPaymentAttempt,
    ) -> Result<Order, PosEngineError>;

    async fn fetch_payment_attempt(&self, checkout_request_id: &str) -> Result<Option<PaymentAttempt>, PosEngineError>;

    /// Every attempt made for the order, oldest first.
    async fn fetch_payment_attempts(&self, order_id: &OrderId) -> Result<Vec<PaymentAttempt>, PosEngineError>;

    /// Applies a provider verdict to the order that owns `checkout_request_id`.
    ///
    /// The status check and the write are one conditional update, so when two callers race to apply a result for the
    /// same order, exactly one of them sees [`ApplyResultOutcome::Applied`].
    ///
    /// * A success is honoured for any recorded attempt of the order.
    /// * A failure is only applied if `checkout_request_id` is still the order's current `transaction_id`.
    async fn apply_payment_result(
        &self,
        checkout_request_id: &str,
        outcome: &PaymentOutcome,
        payment_method: &str,
    ) -> Result<ApplyResultOutcome, PosEngineError>;
}
