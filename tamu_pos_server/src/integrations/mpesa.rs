//! Binds the Daraja client to the engine's gateway traits.
use daraja_tools::{DarajaApi, DarajaApiError, DarajaConfig};
use log::*;
use tamu_common::{Kes, ProviderResult};
use tamu_pos_engine::{db_types::GatewayCredentials, GatewayError, GatewayFactory, GatewayReceipt, PaymentGateway};

use crate::config::MpesaConfig;

/// Builds a Daraja client per restaurant from its stored credentials and the deployment's M-Pesa settings.
#[derive(Debug, Clone)]
pub struct MpesaGatewayFactory {
    config: MpesaConfig,
}

impl MpesaGatewayFactory {
    pub fn new(config: MpesaConfig) -> Self {
        Self { config }
    }

    pub fn daraja_config(&self, credentials: &GatewayCredentials) -> DarajaConfig {
        DarajaConfig::new(
            &credentials.consumer_key,
            credentials.consumer_secret.reveal(),
            credentials.passkey.reveal(),
            &credentials.shortcode,
            &self.config.callback_url,
        )
        .with_base_url(self.config.base_url.as_str())
        .with_timeout(self.config.timeout)
    }
}

impl GatewayFactory for MpesaGatewayFactory {
    type Gateway = MpesaGateway;

    fn gateway_for(&self, credentials: &GatewayCredentials) -> Result<Self::Gateway, GatewayError> {
        let api = DarajaApi::new(self.daraja_config(credentials)).map_err(gateway_error)?;
        trace!("💳️ M-Pesa gateway ready for shortcode {}", credentials.shortcode);
        Ok(MpesaGateway(api))
    }
}

pub struct MpesaGateway(DarajaApi);

impl PaymentGateway for MpesaGateway {
    async fn initiate_push(
        &self,
        phone: &str,
        amount: Kes,
        order_ref: &str,
        account_ref: &str,
    ) -> Result<GatewayReceipt, GatewayError> {
        let receipt = self.0.initiate_push(phone, amount, order_ref, account_ref).await.map_err(gateway_error)?;
        Ok(GatewayReceipt {
            checkout_request_id: receipt.checkout_request_id,
            merchant_request_id: receipt.merchant_request_id,
            customer_message: receipt.customer_message,
        })
    }

    async fn query_status(&self, checkout_request_id: &str) -> Result<ProviderResult, GatewayError> {
        self.0.query_status(checkout_request_id).await.map_err(gateway_error)
    }
}

fn gateway_error(e: DarajaApiError) -> GatewayError {
    match e {
        DarajaApiError::MissingCredentials(fields) => GatewayError::MissingCredentials(fields),
        DarajaApiError::Initialization(s) => GatewayError::Initialization(s),
        DarajaApiError::CannotAuthenticate(s) => GatewayError::CannotAuthenticate(s),
        DarajaApiError::InvalidPhoneNumber(_) | DarajaApiError::InvalidAmount(_) => {
            GatewayError::InvalidRequest(e.to_string())
        },
        DarajaApiError::Transport(s) => GatewayError::Transport(s),
        DarajaApiError::JsonError(_) | DarajaApiError::ProviderRejected { .. } => GatewayError::Rejected(e.to_string()),
    }
}
