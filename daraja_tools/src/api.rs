use std::sync::Arc;

use chrono::Utc;
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};
use tamu_common::{Kes, ProviderResult};

use crate::{
    classify_query_response,
    config::DarajaConfig,
    data_objects::{AccessTokenResponse, DarajaErrorBody, PushReceipt, StkPushRequest, StkPushResponse, StkQueryRequest},
    helpers::{basic_auth_header, daraja_timestamp, format_phone_number, stk_password},
    DarajaApiError,
};

const TRANSACTION_TYPE: &str = "CustomerPayBillOnline";

/// A stateless Daraja client for a single merchant.
///
/// No token caching: every push or query fetches a fresh OAuth token first.
#[derive(Clone)]
pub struct DarajaApi {
    config: DarajaConfig,
    client: Arc<Client>,
}

impl DarajaApi {
    /// Creates a new client. Fails fast if any credential is missing.
    pub fn new(config: DarajaConfig) -> Result<Self, DarajaApiError> {
        config.validate()?;
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| DarajaApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &DarajaConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    /// Exchanges the consumer key and secret for a short-lived bearer token.
    ///
    /// A refusal by the provider is `CannotAuthenticate`. Failing to reach it at all is `Transport`.
    pub async fn authenticate(&self) -> Result<String, DarajaApiError> {
        let url = self.url("/oauth/v1/generate");
        let auth = basic_auth_header(&self.config.consumer_key, self.config.consumer_secret.reveal());
        trace!("💳️ Requesting access token from {url}");
        let response = self
            .client
            .get(url)
            .query(&[("grant_type", "client_credentials")])
            .header(AUTHORIZATION, auth)
            .send()
            .await
            .map_err(|e| DarajaApiError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            warn!("💳️ M-Pesa refused to issue an access token. HTTP {status}. {message}");
            return Err(DarajaApiError::CannotAuthenticate(format!("HTTP {status}. {message}")));
        }
        let token = response
            .json::<AccessTokenResponse>()
            .await
            .map_err(|e| DarajaApiError::CannotAuthenticate(format!("Invalid token response. {e}")))?;
        trace!("💳️ Access token received");
        Ok(token.access_token)
    }

    /// Sends an STK push prompt to the customer's phone.
    ///
    /// `order_ref` appears in the transaction description and `account_ref` is shown to the customer on the prompt.
    pub async fn initiate_push(
        &self,
        phone: &str,
        amount: Kes,
        order_ref: &str,
        account_ref: &str,
    ) -> Result<PushReceipt, DarajaApiError> {
        let phone_number = format_phone_number(phone)?;
        let amount = amount.whole_shillings();
        if amount <= 0 {
            return Err(DarajaApiError::InvalidAmount(format!("{amount} is not a payable amount")));
        }
        let token = self.authenticate().await?;
        let timestamp = daraja_timestamp(Utc::now());
        let shortcode = self.config.shortcode.clone();
        let request = StkPushRequest {
            business_short_code: shortcode.clone(),
            password: stk_password(&shortcode, self.config.passkey.reveal(), &timestamp),
            timestamp,
            transaction_type: TRANSACTION_TYPE.to_string(),
            amount,
            party_a: phone_number.clone(),
            party_b: shortcode,
            phone_number,
            call_back_url: self.config.callback_url.clone(),
            account_reference: account_ref.to_string(),
            transaction_desc: format!("Payment for Order {order_ref}"),
        };
        debug!("💳️ Sending STK push for order {order_ref}. KES {amount} to {}", request.phone_number);
        let response: StkPushResponse =
            self.rest_query(Method::POST, "/mpesa/stkpush/v1/processrequest", &token, Some(request)).await?;
        if response.response_code != "0" {
            warn!("💳️ STK push for order {order_ref} was not accepted. {}", response.response_description);
            return Err(DarajaApiError::ProviderRejected { status: 200, message: response.response_description });
        }
        info!("💳️ STK push for order {order_ref} accepted. Checkout id {}", response.checkout_request_id);
        Ok(response.into())
    }

    /// Asks M-Pesa what happened to a checkout request.
    pub async fn query_status(&self, checkout_request_id: &str) -> Result<ProviderResult, DarajaApiError> {
        let token = self.authenticate().await?;
        let timestamp = daraja_timestamp(Utc::now());
        let request = StkQueryRequest {
            business_short_code: self.config.shortcode.clone(),
            password: stk_password(&self.config.shortcode, self.config.passkey.reveal(), &timestamp),
            timestamp,
            checkout_request_id: checkout_request_id.to_string(),
        };
        let (status, body) = self.send(Method::POST, "/mpesa/stkpushquery/v1/query", &token, Some(request)).await?;
        let result = classify_query_response(status, &body)?;
        debug!("💳️ Status of {checkout_request_id}: {result}");
        Ok(result)
    }

    /// Sends a request and returns the raw status and body. Only transport failures are errors here.
    async fn send<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        token: &str,
        body: Option<B>,
    ) -> Result<(u16, String), DarajaApiError> {
        let url = self.url(path);
        trace!("💳️ Sending REST query: {url}");
        let mut req = self.client.request(method, url).bearer_auth(token);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| DarajaApiError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| DarajaApiError::Transport(e.to_string()))?;
        Ok((status, text))
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        token: &str,
        body: Option<B>,
    ) -> Result<T, DarajaApiError> {
        let (status, text) = self.send(method, path, token, body).await?;
        if (200..300).contains(&status) {
            trace!("💳️ REST query successful. {status}");
            serde_json::from_str::<T>(&text).map_err(|e| DarajaApiError::JsonError(e.to_string()))
        } else {
            match serde_json::from_str::<DarajaErrorBody>(&text) {
                Ok(err) => Err(DarajaApiError::ProviderRejected {
                    status,
                    message: format!("{}: {}", err.error_code, err.error_message),
                }),
                Err(_) => Err(DarajaApiError::Transport(format!("HTTP {status}: {text}"))),
            }
        }
    }
}
