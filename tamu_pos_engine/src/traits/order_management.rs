use crate::{
    db_types::{NewOrder, NewOrderLine, Order, OrderId, OrderLine, OrderStatusType, RestaurantId, StatusUpdate},
    pos_api::order_objects::{OrderDetailsUpdate, OrderQueryFilter},
    traits::PosEngineError,
};

/// The order store.
///
/// Apart from the unscoped lookups used to correlate provider results (`fetch_order_by_id` and
/// `fetch_order_by_transaction_id`), every method takes the caller's restaurant. An order that exists but belongs to
/// another restaurant is indistinguishable from one that does not exist: the result is `None` or
/// [`PosEngineError::OrderNotFound`].
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Validates the order, snapshots the menu prices, allocates an order number, computes the totals and inserts the
    /// order and its lines atomically. Nothing is written if any step fails.
    async fn create_order(&self, restaurant_id: &RestaurantId, order: NewOrder) -> Result<Order, PosEngineError>;

    async fn fetch_order(&self, restaurant_id: &RestaurantId, order_id: &OrderId)
        -> Result<Option<Order>, PosEngineError>;

    /// Fetches an order without a restaurant scope. Only for read-only status checks.
    async fn fetch_order_by_id(&self, order_id: &OrderId) -> Result<Option<Order>, PosEngineError>;

    async fn fetch_order_lines(&self, order_id: &OrderId) -> Result<Vec<OrderLine>, PosEngineError>;

    /// Finds the order that any recorded payment attempt with this checkout reference belongs to.
    async fn fetch_order_by_transaction_id(&self, checkout_request_id: &str) -> Result<Option<Order>, PosEngineError>;

    /// Orders matching the filter, newest first.
    async fn search_orders(
        &self,
        restaurant_id: &RestaurantId,
        query: OrderQueryFilter,
    ) -> Result<Vec<Order>, PosEngineError>;

    /// Changes the customer name and/or table number. Allowed in any non-terminal status.
    async fn update_order_details(
        &self,
        restaurant_id: &RestaurantId,
        order_id: &OrderId,
        update: OrderDetailsUpdate,
    ) -> Result<Order, PosEngineError>;

    /// The following three calls only succeed while the order is `Open`. The totals are recalculated in the same
    /// transaction as the line change.
    async fn add_order_line(
        &self,
        restaurant_id: &RestaurantId,
        order_id: &OrderId,
        line: NewOrderLine,
    ) -> Result<Order, PosEngineError>;

    async fn update_line_quantity(
        &self,
        restaurant_id: &RestaurantId,
        order_id: &OrderId,
        line_id: i64,
        quantity: i64,
    ) -> Result<Order, PosEngineError>;

    async fn remove_order_line(
        &self,
        restaurant_id: &RestaurantId,
        order_id: &OrderId,
        line_id: i64,
    ) -> Result<Order, PosEngineError>;

    /// Moves the order to `new_status`, if the state machine allows it from the order's current status. The check and
    /// the write are a single conditional update.
    ///
    /// * Requesting the status the order already has is a no-op that returns [`StatusUpdate::Unchanged`], except for
    ///   `Open`. Of two concurrent identical updates, exactly one gets [`StatusUpdate::Changed`].
    /// * A disallowed transition returns [`PosEngineError::InvalidTransition`].
    async fn update_status(
        &self,
        restaurant_id: &RestaurantId,
        order_id: &OrderId,
        new_status: OrderStatusType,
    ) -> Result<StatusUpdate, PosEngineError>;

    /// Deletes the order, its lines and its payment attempts.
    async fn delete_order(&self, restaurant_id: &RestaurantId, order_id: &OrderId) -> Result<(), PosEngineError>;
}
