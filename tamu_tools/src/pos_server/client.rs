use std::time::Duration;

use anyhow::{anyhow, Result};
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    StatusCode,
};
use serde::de::DeserializeOwned;
use tamu_common::Kes;
use tamu_pos_engine::{db_types::OrderId, payment_objects::OrderPaymentStatus};
use tamu_pos_server::data_objects::{PaymentStatusResponse, StkPushParams, StkPushResponse};
use url::Url;

/// The server's status route may make two provider calls of its own before it answers
const REQUEST_TIMEOUT: Duration = Duration::from_secs(65);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A thin HTTP client for the POS server's payment routes.
pub struct PosServerClient {
    client: Client,
    server: Url,
    access_token: String,
}

impl PosServerClient {
    pub fn new(server: Url, access_token: String) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .user_agent("Tamu POS Till")
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client. {e}"))?;
        Ok(Self { client, server, access_token })
    }

    pub fn server(&self) -> &str {
        self.server.as_str()
    }

    pub fn url(&self, path: &str) -> Result<Url> {
        self.server.join(path).map_err(|e| anyhow!("Failed to join URL: {}", e))
    }

    /// Sends an STK push for the order. `amount` defaults to the order total on the server.
    pub async fn stk_push(&self, order_id: &OrderId, phone: &str, amount: Option<Kes>) -> Result<StkPushResponse> {
        let url = self.url("/api/payments/stk-push")?;
        let params = StkPushParams { phone_number: phone.to_string(), amount, order_id: order_id.clone() };
        debug!("Sending STK push request for order {order_id} to {url}");
        let res = self.client.post(url).bearer_auth(&self.access_token).json(&params).send().await?;
        if !res.status().is_success() {
            let code = res.status();
            let msg = res.text().await?;
            return Err(anyhow!("Error requesting payment: {code}, {msg}"));
        }
        Ok(res.json().await?)
    }

    /// Asks the server to query M-Pesa for the attempt. The server applies a success to the order before answering.
    pub async fn payment_status(&self, checkout_request_id: &str) -> Result<PaymentStatusResponse> {
        let id = urlencoding::encode(checkout_request_id);
        self.auth_get_request(&format!("/api/payments/status/{id}")).await
    }

    /// The order's public payment status. Does not need the access token.
    pub async fn order_status(&self, order_id: &OrderId) -> Result<OrderPaymentStatus> {
        let id = urlencoding::encode(order_id.as_str());
        let url = self.url(&format!("/api/payments/orders/{id}/status"))?;
        let res = self.client.get(url).send().await?;
        match res.status() {
            StatusCode::OK => Ok(res.json().await?),
            StatusCode::NOT_FOUND => Err(anyhow!("Order {order_id} does not exist")),
            code => {
                let msg = res.text().await?;
                Err(anyhow!("Error fetching the status of order {order_id}: {code}, {msg}."))
            },
        }
    }

    async fn auth_get_request<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path)?;
        let res = self.client.get(url).bearer_auth(&self.access_token).send().await?;
        match res.status() {
            StatusCode::OK => Ok(res.json().await?),
            code => {
                let msg = res.text().await?;
                Err(anyhow!("Error fetching {path}: {code}, {msg}."))
            },
        }
    }
}
