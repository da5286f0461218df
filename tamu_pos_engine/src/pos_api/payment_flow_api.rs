use std::fmt::Debug;

use log::*;
use tamu_common::{Kes, ProviderResult};

use crate::{
    db_types::{
        ApplyResultOutcome,
        NewPaymentAttempt,
        Order,
        OrderId,
        OrderStatusType,
        PaymentAttempt,
        PaymentOutcome,
        RestaurantId,
    },
    events::{EventProducers, OrderAnnulledEvent, OrderPaidEvent},
    payment_objects::{PaymentInitiated, ReconcileResult},
    pos_api::errors::PaymentFlowError,
    traits::{GatewayFactory, OrderManagement, PaymentGateway, PaymentManagement, PosEngineError},
};

/// Stored in `payment_method` once a payment succeeds.
pub const PAYMENT_METHOD_MPESA: &str = "M-Pesa";

/// `PaymentFlowApi` is the payment state machine.
///
/// There are two independent ways to learn how a payment ended: the provider's callback, and a status query (from the
/// poller, or from the server-side status endpoint). Either may arrive first, late, twice, or not at all. Both funnel
/// through [`Self::apply_payment_result`], which is idempotent: the first verdict moves the order to a terminal state
/// and every later one is a no-op.
pub struct PaymentFlowApi<B, G> {
    db: B,
    gateways: G,
    producers: EventProducers,
}

impl<B, G> Debug for PaymentFlowApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentFlowApi")
    }
}

impl<B, G> PaymentFlowApi<B, G> {
    pub fn new(db: B, gateways: G, producers: EventProducers) -> Self {
        Self { db, gateways, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

impl<B, G> PaymentFlowApi<B, G>
where
    B: OrderManagement + PaymentManagement,
    G: GatewayFactory,
{
    /// Sends an STK push for the order and records the attempt.
    ///
    /// The order must exist in the caller's restaurant and must not be terminal. `amount` defaults to the order total.
    /// Re-initiating a pending order is allowed; the new attempt becomes the order's current `transaction_id`.
    ///
    /// Configuration errors (incomplete credentials) surface here, before anything is sent.
    pub async fn initiate_payment(
        &self,
        restaurant_id: &RestaurantId,
        order_id: &OrderId,
        phone: &str,
        amount: Option<Kes>,
    ) -> Result<PaymentInitiated, PaymentFlowError> {
        let order = self
            .db
            .fetch_order(restaurant_id, order_id)
            .await?
            .ok_or_else(|| PosEngineError::OrderNotFound(order_id.clone()))?;
        if order.status.is_terminal() {
            return Err(PosEngineError::InvalidTransition {
                order_id: order.id,
                from: order.status,
                to: OrderStatusType::PendingPayment,
            }
            .into());
        }
        let amount = amount.unwrap_or(order.total);
        if amount.whole_shillings() <= 0 {
            return Err(PosEngineError::ValidationError(format!("Cannot request a payment of {amount}")).into());
        }
        if amount != order.total {
            let (number, total) = (&order.order_number, order.total);
            warn!("💸️ Requesting {amount} for order {number}, but the order total is {total}");
        }
        let gateway = self.gateway_for(restaurant_id).await?;
        let receipt = gateway.initiate_push(phone, amount, &order.order_number, &order.order_number).await?;
        info!(
            "💸️ STK push for {amount} sent for order {}. Checkout reference {}",
            order.order_number, receipt.checkout_request_id
        );
        let attempt = NewPaymentAttempt {
            checkout_request_id: receipt.checkout_request_id.clone(),
            merchant_request_id: receipt.merchant_request_id.clone(),
            phone_number: phone.to_string(),
            amount,
        };
        if let Err(e) = self.db.record_payment_attempt(restaurant_id, order_id, attempt).await {
            error!(
                "💸️ The push {} for order {} was sent, but could not be recorded: {e}",
                receipt.checkout_request_id, order.order_number
            );
            return Err(e.into());
        }
        Ok(PaymentInitiated {
            order_id: order.id,
            checkout_request_id: receipt.checkout_request_id,
            merchant_request_id: receipt.merchant_request_id,
            customer_message: receipt.customer_message,
            amount,
        })
    }

    /// The single gate through which payment results are applied. Safe to call any number of times, from any number
    /// of places, for the same checkout reference.
    ///
    /// An unknown checkout reference is not an error. It is logged and reported as
    /// [`ApplyResultOutcome::UnknownTransaction`].
    pub async fn apply_payment_result(
        &self,
        checkout_request_id: &str,
        outcome: PaymentOutcome,
    ) -> Result<ApplyResultOutcome, PaymentFlowError> {
        let result = self.db.apply_payment_result(checkout_request_id, &outcome, PAYMENT_METHOD_MPESA).await?;
        match &result {
            ApplyResultOutcome::Applied(order) if outcome.success => {
                let receipt = outcome.receipt.as_deref().unwrap_or("n/a");
                info!("💸️ Order {} is PAID. Checkout {checkout_request_id}, receipt {receipt}", order.order_number);
                self.call_order_paid_hook(order).await;
            },
            ApplyResultOutcome::Applied(order) => {
                info!("💸️ Payment for order {} failed ({outcome}). Order cancelled", order.order_number);
                self.call_order_annulled_hook(order, &outcome).await;
            },
            ApplyResultOutcome::AlreadyTerminal(order) => {
                debug!(
                    "💸️ Ignoring {outcome} for checkout {checkout_request_id}. Order {} is already {}",
                    order.order_number, order.status
                );
                if outcome.success && order.status == OrderStatusType::Cancelled {
                    warn!(
                        "💸️ Order {} was cancelled, but the customer has now paid for it (checkout \
                         {checkout_request_id}). This payment must be refunded manually",
                        order.order_number
                    );
                }
            },
            ApplyResultOutcome::Superseded(order) => {
                debug!(
                    "💸️ Ignoring {outcome} for checkout {checkout_request_id}. Order {} has a newer attempt ({})",
                    order.order_number,
                    order.transaction_id.as_deref().unwrap_or_default()
                );
            },
            ApplyResultOutcome::UnknownTransaction => {
                warn!("💸️ Received {outcome} for unknown checkout reference {checkout_request_id}. Ignoring it");
            },
        }
        Ok(result)
    }

    /// Asks the provider what happened to a payment attempt, without changing anything.
    pub async fn query_payment_status(
        &self,
        restaurant_id: &RestaurantId,
        checkout_request_id: &str,
    ) -> Result<ProviderResult, PaymentFlowError> {
        let attempt = self
            .db
            .fetch_payment_attempt(checkout_request_id)
            .await?
            .filter(|a| &a.restaurant_id == restaurant_id)
            .ok_or_else(|| PosEngineError::TransactionNotFound(checkout_request_id.to_string()))?;
        let gateway = self.gateway_for(&attempt.restaurant_id).await?;
        let result = gateway.query_status(checkout_request_id).await?;
        debug!("💸️ Provider status for checkout {checkout_request_id}: {result}");
        Ok(result)
    }

    /// Queries the provider and, if the payment succeeded, applies the success. This closes the gap left by a
    /// callback that never arrives. Failures are reported but not applied; the callback (or the customer retrying)
    /// settles those.
    pub async fn reconcile(
        &self,
        restaurant_id: &RestaurantId,
        checkout_request_id: &str,
    ) -> Result<ReconcileResult, PaymentFlowError> {
        let result = self.query_payment_status(restaurant_id, checkout_request_id).await?;
        let applied = if let ProviderResult::Success { description } = &result {
            let outcome = PaymentOutcome::success(description.clone());
            Some(self.apply_payment_result(checkout_request_id, outcome).await?)
        } else {
            None
        };
        Ok(ReconcileResult { checkout_request_id: checkout_request_id.to_string(), result, applied })
    }

    /// Every payment attempt made for the order, oldest first.
    pub async fn payment_attempts(
        &self,
        restaurant_id: &RestaurantId,
        order_id: &OrderId,
    ) -> Result<Vec<PaymentAttempt>, PaymentFlowError> {
        if self.db.fetch_order(restaurant_id, order_id).await?.is_none() {
            return Err(PosEngineError::OrderNotFound(order_id.clone()).into());
        }
        Ok(self.db.fetch_payment_attempts(order_id).await?)
    }

    async fn gateway_for(&self, restaurant_id: &RestaurantId) -> Result<G::Gateway, PaymentFlowError> {
        let credentials = self
            .db
            .fetch_gateway_credentials(restaurant_id)
            .await?
            .ok_or_else(|| PosEngineError::RestaurantNotFound(restaurant_id.clone()))?;
        let gateway = self.gateways.gateway_for(&credentials).map_err(|e| {
            warn!("💸️ Cannot build a payment gateway for restaurant {restaurant_id}: {e}");
            e
        })?;
        Ok(gateway)
    }

    async fn call_order_paid_hook(&self, order: &Order) {
        for emitter in &self.producers.order_paid_producer {
            debug!("💸️ Notifying order paid hook subscribers");
            emitter.publish_event(OrderPaidEvent::new(order.clone())).await;
        }
    }

    async fn call_order_annulled_hook(&self, order: &Order, outcome: &PaymentOutcome) {
        for emitter in &self.producers.order_annulled_producer {
            debug!("💸️ Notifying order annulled hook subscribers");
            let event = OrderAnnulledEvent::new(order.clone()).with_outcome(outcome.clone());
            emitter.publish_event(event).await;
        }
    }
}
