//! Client-side payment reconciliation.
//!
//! After an STK push, the till does not wait for the provider's callback to reach the server. It polls: first the
//! order's own status (the callback usually gets there first), and failing that the provider directly. A success seen
//! by the provider is reported back so the order is marked paid even if the callback is lost.
//!
//! The poller never changes an order because of its own timeout or cancellation. A late callback still settles the
//! order.
use std::{fmt::Display, time::Duration};

use log::*;
use serde::{Deserialize, Serialize};
use tamu_common::ProviderResult;
use thiserror::Error;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    db_types::{OrderId, OrderStatusType, PaymentOutcome, RestaurantId},
    traits::{GatewayFactory, OrderManagement, PaymentManagement, PosEngineError},
    PaymentFlowApi,
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3_500);
pub const DEFAULT_POLL_CEILING: Duration = Duration::from_secs(90);

#[derive(Debug, Clone, Error)]
#[error("Status check failed: {0}")]
pub struct StatusSourceError(pub String);

impl From<PosEngineError> for StatusSourceError {
    fn from(e: PosEngineError) -> Self {
        Self(e.to_string())
    }
}

/// Where the poller gets its information from. The engine provides [`LocalStatusSource`]; a remote till talks to the
/// server over HTTP instead.
#[allow(async_fn_in_trait)]
pub trait PaymentStatusSource {
    async fn order_status(&self, order_id: &OrderId) -> Result<OrderStatusType, StatusSourceError>;

    async fn query_provider(&self, checkout_request_id: &str) -> Result<ProviderResult, StatusSourceError>;

    /// Called when the provider reports success, so the order can be marked paid without waiting for the callback.
    /// Returns the order's status once the success has been applied.
    async fn report_success(
        &self,
        order_id: &OrderId,
        checkout_request_id: &str,
        description: &str,
    ) -> Result<OrderStatusType, StatusSourceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub interval: Duration,
    /// Hard wall-clock limit on one polling session
    pub ceiling: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self { interval: DEFAULT_POLL_INTERVAL, ceiling: DEFAULT_POLL_CEILING }
    }
}

impl PollerConfig {
    pub fn new(interval: Duration, ceiling: Duration) -> Self {
        Self { interval, ceiling }
    }
}

/// How a polling session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PollOutcome {
    Paid,
    /// The payment will not succeed. The customer should start again.
    Failed { code: String, description: String },
    /// The provider refused the status query itself.
    QueryFailed { code: String, description: String },
    /// The ceiling was reached. The payment may still succeed; the order should be checked again later.
    TimedOut,
    /// Polling was stopped by the user. The order is untouched.
    Cancelled,
    /// The order was cancelled in the store. It can no longer be paid, and money the provider collected anyway must
    /// be refunded.
    OrderCancelled { refund_due: bool },
}

impl PollOutcome {
    pub fn is_paid(&self) -> bool {
        matches!(self, Self::Paid)
    }

    /// True for outcomes where the payment's fate is still unknown
    pub fn is_inconclusive(&self) -> bool {
        matches!(self, Self::TimedOut | Self::Cancelled | Self::QueryFailed { .. })
    }
}

impl Display for PollOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Paid => write!(f, "Payment received"),
            Self::Failed { code, description } => write!(f, "Payment failed ({code}): {description}"),
            Self::QueryFailed { code, description } => write!(f, "Could not check the payment ({code}): {description}"),
            Self::TimedOut => write!(f, "Timed out waiting for the payment. It may still go through"),
            Self::Cancelled => write!(f, "Stopped waiting for the payment"),
            Self::OrderCancelled { refund_due: false } => write!(f, "The order was cancelled"),
            Self::OrderCancelled { refund_due: true } => {
                write!(f, "The customer paid, but the order was cancelled. The payment must be refunded")
            },
        }
    }
}

pub struct PaymentPoller<S> {
    source: S,
    config: PollerConfig,
}

impl<S> PaymentPoller<S>
where S: PaymentStatusSource
{
    pub fn new(source: S, config: PollerConfig) -> Self {
        Self { source, config }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Polls until the payment resolves, the ceiling is reached, or `cancel` fires. The first check happens
    /// immediately. The ceiling and `cancel` also cut short a check that is still running.
    pub async fn poll(&self, order_id: &OrderId, checkout_request_id: &str, cancel: CancellationToken) -> PollOutcome {
        let deadline = Instant::now() + self.config.ceiling;
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut checks = 0u32;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return stopped(order_id, checks, PollOutcome::Cancelled),
                _ = tokio::time::sleep_until(deadline) => return stopped(order_id, checks, PollOutcome::TimedOut),
                _ = ticker.tick() => {},
            }
            checks += 1;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return stopped(order_id, checks, PollOutcome::Cancelled),
                _ = tokio::time::sleep_until(deadline) => return stopped(order_id, checks, PollOutcome::TimedOut),
                outcome = self.check_once(order_id, checkout_request_id) => {
                    if let Some(outcome) = outcome {
                        info!("🔁️ Polling for order {order_id} finished after {checks} checks: {outcome}");
                        return outcome;
                    }
                },
            }
        }
    }

    /// One round of checks. `None` means "keep polling".
    async fn check_once(&self, order_id: &OrderId, checkout_request_id: &str) -> Option<PollOutcome> {
        match self.source.order_status(order_id).await {
            Ok(OrderStatusType::Paid | OrderStatusType::Completed) => return Some(PollOutcome::Paid),
            Ok(OrderStatusType::Cancelled) => return Some(PollOutcome::OrderCancelled { refund_due: false }),
            Ok(status) => trace!("🔁️ Order {order_id} is {status}"),
            Err(e) => debug!("🔁️ Could not fetch the status of order {order_id}: {e}"),
        }
        let result = match self.source.query_provider(checkout_request_id).await {
            Ok(r) => r,
            Err(e) => {
                debug!("🔁️ Provider query for {checkout_request_id} failed. Will retry. {e}");
                return None;
            },
        };
        match result {
            ProviderResult::Success { description } => {
                match self.source.report_success(order_id, checkout_request_id, &description).await {
                    Ok(OrderStatusType::Paid | OrderStatusType::Completed) => Some(PollOutcome::Paid),
                    Ok(OrderStatusType::Cancelled) => {
                        warn!(
                            "🔁️ Payment {checkout_request_id} succeeded, but order {order_id} is cancelled. The \
                             customer needs a refund"
                        );
                        Some(PollOutcome::OrderCancelled { refund_due: true })
                    },
                    Ok(status) => {
                        warn!("🔁️ Payment {checkout_request_id} succeeded, but order {order_id} is {status}");
                        None
                    },
                    Err(e) => {
                        // The provider has the money. The callback or the next check will settle the order.
                        warn!("🔁️ Payment {checkout_request_id} succeeded, but reporting it failed: {e}");
                        None
                    },
                }
            },
            r @ ProviderResult::TerminalFailure { .. } if r.is_definitive_failure() => {
                Some(PollOutcome::Failed { code: r.code().to_string(), description: r.description().to_string() })
            },
            ProviderResult::QueryFailed { code, description } => Some(PollOutcome::QueryFailed { code, description }),
            other => {
                trace!("🔁️ Payment {checkout_request_id} is not settled yet: {other}");
                None
            },
        }
    }
}

fn stopped(order_id: &OrderId, checks: u32, outcome: PollOutcome) -> PollOutcome {
    info!("🔁️ Polling for order {order_id} stopped after {checks} checks: {outcome}");
    outcome
}

/// A status source that talks to the engine directly, for tills that share the server's process.
pub struct LocalStatusSource<'a, B, G> {
    api: &'a PaymentFlowApi<B, G>,
    restaurant_id: RestaurantId,
}

impl<'a, B, G> LocalStatusSource<'a, B, G> {
    pub fn new(api: &'a PaymentFlowApi<B, G>, restaurant_id: RestaurantId) -> Self {
        Self { api, restaurant_id }
    }
}

impl<'a, B, G> PaymentStatusSource for LocalStatusSource<'a, B, G>
where
    B: OrderManagement + PaymentManagement,
    G: GatewayFactory,
{
    async fn order_status(&self, order_id: &OrderId) -> Result<OrderStatusType, StatusSourceError> {
        let order = self.api.db().fetch_order(&self.restaurant_id, order_id).await?;
        order.map(|o| o.status).ok_or_else(|| StatusSourceError(format!("Order {order_id} does not exist")))
    }

    async fn query_provider(&self, checkout_request_id: &str) -> Result<ProviderResult, StatusSourceError> {
        self.api
            .query_payment_status(&self.restaurant_id, checkout_request_id)
            .await
            .map_err(|e| StatusSourceError(e.to_string()))
    }

    async fn report_success(
        &self,
        order_id: &OrderId,
        checkout_request_id: &str,
        description: &str,
    ) -> Result<OrderStatusType, StatusSourceError> {
        let outcome = self
            .api
            .apply_payment_result(checkout_request_id, PaymentOutcome::success(description))
            .await
            .map_err(|e| StatusSourceError(e.to_string()))?;
        match outcome.order() {
            Some(order) => Ok(order.status),
            None => self.order_status(order_id).await,
        }
    }
}
