//! An in-memory stand-in for the payment provider.
//!
//! Every push is accepted and given a checkout reference of the form `ws_CO_{n}`. Status queries answer
//! `StillProcessing` until a result is set with [`FakeGatewayFactory::set_result`].
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tamu_common::{Kes, ProviderResult};

use crate::{db_types::GatewayCredentials, GatewayError, GatewayFactory, GatewayReceipt, PaymentGateway};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakePush {
    pub checkout_request_id: String,
    pub shortcode: String,
    pub phone: String,
    pub amount: Kes,
    pub order_ref: String,
}

#[derive(Debug, Default)]
struct FakeProvider {
    counter: u64,
    pushes: Vec<FakePush>,
    results: HashMap<String, ProviderResult>,
    next_push_error: Option<GatewayError>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeGatewayFactory {
    state: Arc<Mutex<FakeProvider>>,
}

impl FakeGatewayFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pushes(&self) -> Vec<FakePush> {
        self.state.lock().unwrap().pushes.clone()
    }

    pub fn last_checkout_id(&self) -> Option<String> {
        self.state.lock().unwrap().pushes.last().map(|p| p.checkout_request_id.clone())
    }

    /// What the provider will answer when `checkout_request_id` is queried
    pub fn set_result(&self, checkout_request_id: &str, result: ProviderResult) {
        self.state.lock().unwrap().results.insert(checkout_request_id.to_string(), result);
    }

    /// The next push fails with `error` instead of being accepted
    pub fn fail_next_push(&self, error: GatewayError) {
        self.state.lock().unwrap().next_push_error = Some(error);
    }
}

impl GatewayFactory for FakeGatewayFactory {
    type Gateway = FakeGateway;

    fn gateway_for(&self, credentials: &GatewayCredentials) -> Result<Self::Gateway, GatewayError> {
        let mut missing = Vec::new();
        if credentials.consumer_key.trim().is_empty() {
            missing.push("consumer key".to_string());
        }
        if credentials.consumer_secret.is_empty() {
            missing.push("consumer secret".to_string());
        }
        if credentials.passkey.is_empty() {
            missing.push("passkey".to_string());
        }
        if credentials.shortcode.trim().is_empty() {
            missing.push("shortcode".to_string());
        }
        if !missing.is_empty() {
            return Err(GatewayError::MissingCredentials(missing));
        }
        Ok(FakeGateway { shortcode: credentials.shortcode.clone(), state: Arc::clone(&self.state) })
    }
}

pub struct FakeGateway {
    shortcode: String,
    state: Arc<Mutex<FakeProvider>>,
}

impl PaymentGateway for FakeGateway {
    async fn initiate_push(
        &self,
        phone: &str,
        amount: Kes,
        order_ref: &str,
        _account_ref: &str,
    ) -> Result<GatewayReceipt, GatewayError> {
        let mut state = self.state.lock().unwrap();
        if let Some(e) = state.next_push_error.take() {
            return Err(e);
        }
        state.counter += 1;
        let checkout_request_id = format!("ws_CO_{}", state.counter);
        state.pushes.push(FakePush {
            checkout_request_id: checkout_request_id.clone(),
            shortcode: self.shortcode.clone(),
            phone: phone.to_string(),
            amount,
            order_ref: order_ref.to_string(),
        });
        Ok(GatewayReceipt {
            checkout_request_id,
            merchant_request_id: format!("mr-{}", state.counter),
            customer_message: "Success. Request accepted for processing".to_string(),
        })
    }

    async fn query_status(&self, checkout_request_id: &str) -> Result<ProviderResult, GatewayError> {
        let state = self.state.lock().unwrap();
        let result = state.results.get(checkout_request_id).cloned().unwrap_or(ProviderResult::StillProcessing {
            description: "The transaction is being processed".to_string(),
        });
        Ok(result)
    }
}
