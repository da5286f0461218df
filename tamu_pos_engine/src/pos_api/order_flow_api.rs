use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewOrder, NewOrderLine, Order, OrderId, OrderStatusType, RestaurantId, StatusUpdate},
    events::{EventProducers, OrderAnnulledEvent},
    order_objects::{OrderDetailsUpdate, OrderQueryFilter, OrderWithLines},
    payment_objects::OrderPaymentStatus,
    traits::{OrderManagement, PosEngineError},
};

/// `OrderFlowApi` handles everything about an order that is not a payment: creating it, editing its lines while it is
/// open, and the staff-driven status changes.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

impl<B> OrderFlowApi<B>
where B: OrderManagement
{
    pub async fn create_order(&self, restaurant_id: &RestaurantId, order: NewOrder) -> Result<Order, PosEngineError> {
        let order = self.db.create_order(restaurant_id, order).await?;
        info!(
            "🧾️ Order {} ({}) created for restaurant {restaurant_id}. Total {}",
            order.order_number, order.mode, order.total
        );
        Ok(order)
    }

    pub async fn fetch_order(
        &self,
        restaurant_id: &RestaurantId,
        order_id: &OrderId,
    ) -> Result<Option<OrderWithLines>, PosEngineError> {
        let Some(order) = self.db.fetch_order(restaurant_id, order_id).await? else {
            return Ok(None);
        };
        let lines = self.db.fetch_order_lines(&order.id).await?;
        Ok(Some(OrderWithLines::new(order, lines)))
    }

    /// The payment status of an order, without a restaurant scope. This is what the poller and the payment screen
    /// ask for.
    pub async fn fetch_order_status(&self, order_id: &OrderId) -> Result<Option<OrderPaymentStatus>, PosEngineError> {
        let order = self.db.fetch_order_by_id(order_id).await?;
        Ok(order.map(OrderPaymentStatus::from))
    }

    pub async fn search_orders(
        &self,
        restaurant_id: &RestaurantId,
        query: OrderQueryFilter,
    ) -> Result<Vec<Order>, PosEngineError> {
        self.db.search_orders(restaurant_id, query).await
    }

    pub async fn update_order_details(
        &self,
        restaurant_id: &RestaurantId,
        order_id: &OrderId,
        update: OrderDetailsUpdate,
    ) -> Result<Order, PosEngineError> {
        let order = self.db.update_order_details(restaurant_id, order_id, update).await?;
        debug!("🧾️ Details for order {} updated", order.order_number);
        Ok(order)
    }

    pub async fn add_order_line(
        &self,
        restaurant_id: &RestaurantId,
        order_id: &OrderId,
        line: NewOrderLine,
    ) -> Result<OrderWithLines, PosEngineError> {
        let order = self.db.add_order_line(restaurant_id, order_id, line).await?;
        self.with_lines(order).await
    }

    pub async fn update_line_quantity(
        &self,
        restaurant_id: &RestaurantId,
        order_id: &OrderId,
        line_id: i64,
        quantity: i64,
    ) -> Result<OrderWithLines, PosEngineError> {
        let order = self.db.update_line_quantity(restaurant_id, order_id, line_id, quantity).await?;
        self.with_lines(order).await
    }

    pub async fn remove_order_line(
        &self,
        restaurant_id: &RestaurantId,
        order_id: &OrderId,
        line_id: i64,
    ) -> Result<OrderWithLines, PosEngineError> {
        let order = self.db.remove_order_line(restaurant_id, order_id, line_id).await?;
        self.with_lines(order).await
    }

    /// Cancels an order that has not been paid for.
    ///
    /// | Current status   | Result                           |
    /// |------------------|----------------------------------|
    /// | Open             | Cancelled                        |
    /// | PendingPayment   | Cancelled                        |
    /// | Cancelled        | no-op, returns the order         |
    /// | Paid, Completed  | `InvalidTransition`              |
    ///
    /// Cancelling a pending order does not stop the customer from authorising the push already on their phone. If
    /// that happens, the success is ignored and the payment must be refunded manually.
    pub async fn cancel_order(
        &self,
        restaurant_id: &RestaurantId,
        order_id: &OrderId,
    ) -> Result<Order, PosEngineError> {
        match self.db.update_status(restaurant_id, order_id, OrderStatusType::Cancelled).await? {
            StatusUpdate::Changed(order) => {
                info!("🧾️ Order {} cancelled", order.order_number);
                self.call_order_annulled_hook(&order).await;
                Ok(order)
            },
            StatusUpdate::Unchanged(order) => {
                debug!("🧾️ Order {} is already cancelled", order.order_number);
                Ok(order)
            },
        }
    }

    /// Marks a paid order as served or delivered.
    pub async fn complete_order(
        &self,
        restaurant_id: &RestaurantId,
        order_id: &OrderId,
    ) -> Result<Order, PosEngineError> {
        let order = self.db.update_status(restaurant_id, order_id, OrderStatusType::Completed).await?.into_order();
        info!("🧾️ Order {} completed", order.order_number);
        Ok(order)
    }

    pub async fn delete_order(&self, restaurant_id: &RestaurantId, order_id: &OrderId) -> Result<(), PosEngineError> {
        self.db.delete_order(restaurant_id, order_id).await?;
        info!("🧾️ Order {order_id} deleted from restaurant {restaurant_id}");
        Ok(())
    }

    async fn with_lines(&self, order: Order) -> Result<OrderWithLines, PosEngineError> {
        let lines = self.db.fetch_order_lines(&order.id).await?;
        Ok(OrderWithLines::new(order, lines))
    }

    async fn call_order_annulled_hook(&self, order: &Order) {
        for emitter in &self.producers.order_annulled_producer {
            debug!("🧾️ Notifying order annulled hook subscribers");
            emitter.publish_event(OrderAnnulledEvent::new(order.clone())).await;
        }
    }
}
