use serde::{Deserialize, Serialize};
use tamu_common::{Kes, ProviderResult};
use thiserror::Error;

use crate::db_types::GatewayCredentials;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("The payment gateway is not configured. Missing: {}", .0.join(", "))]
    MissingCredentials(Vec<String>),
    #[error("The payment gateway could not be initialised. {0}")]
    Initialization(String),
    #[error("Could not authenticate with the payment provider. {0}")]
    CannotAuthenticate(String),
    #[error("Invalid payment request. {0}")]
    InvalidRequest(String),
    #[error("Could not reach the payment provider. {0}")]
    Transport(String),
    #[error("The payment provider rejected the request. {0}")]
    Rejected(String),
}

impl GatewayError {
    /// Transport failures (including timeouts) say nothing about the payment itself and may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::MissingCredentials(_) | Self::Initialization(_))
    }
}

/// The provider's acknowledgement of a push request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayReceipt {
    pub checkout_request_id: String,
    pub merchant_request_id: String,
    pub customer_message: String,
}

/// A connection to the payment provider on behalf of one merchant.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway {
    /// Asks the provider to prompt `phone` to authorise a payment of `amount`.
    async fn initiate_push(
        &self,
        phone: &str,
        amount: Kes,
        order_ref: &str,
        account_ref: &str,
    ) -> Result<GatewayReceipt, GatewayError>;

    async fn query_status(&self, checkout_request_id: &str) -> Result<ProviderResult, GatewayError>;
}

/// Builds gateways from per-restaurant credentials. Construction validates the credentials, so a misconfigured
/// restaurant fails here rather than half-way through a payment.
pub trait GatewayFactory {
    type Gateway: PaymentGateway;

    fn gateway_for(&self, credentials: &GatewayCredentials) -> Result<Self::Gateway, GatewayError>;
}
