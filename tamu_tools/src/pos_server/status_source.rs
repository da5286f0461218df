use log::*;
use tamu_common::ProviderResult;
use tamu_pos_engine::{
    db_types::{OrderId, OrderStatusType},
    payment_poller::{PaymentStatusSource, StatusSourceError},
};

use super::client::PosServerClient;

/// Feeds the payment poller from the POS server.
pub struct HttpStatusSource {
    client: PosServerClient,
}

impl HttpStatusSource {
    pub fn new(client: PosServerClient) -> Self {
        Self { client }
    }
}

impl PaymentStatusSource for HttpStatusSource {
    async fn order_status(&self, order_id: &OrderId) -> Result<OrderStatusType, StatusSourceError> {
        let status = self.client.order_status(order_id).await.map_err(|e| StatusSourceError(e.to_string()))?;
        Ok(status.status)
    }

    async fn query_provider(&self, checkout_request_id: &str) -> Result<ProviderResult, StatusSourceError> {
        let status =
            self.client.payment_status(checkout_request_id).await.map_err(|e| StatusSourceError(e.to_string()))?;
        if let Some(order_status) = status.order_status {
            debug!("🔁️ The server reports the order for {checkout_request_id} as {order_status}");
        }
        Ok(status.result)
    }

    async fn report_success(
        &self,
        order_id: &OrderId,
        checkout_request_id: &str,
        _description: &str,
    ) -> Result<OrderStatusType, StatusSourceError> {
        // The status route applies a success before it answers
        trace!("🔁️ Success for {checkout_request_id} was applied by the server");
        self.order_status(order_id).await
    }
}
