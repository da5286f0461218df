use mockall::mock;
use tamu_pos_engine::{
    db_types::{
        ApplyResultOutcome,
        GatewayCredentials,
        NewOrder,
        NewOrderLine,
        NewPaymentAttempt,
        Order,
        OrderId,
        OrderLine,
        OrderStatusType,
        PaymentAttempt,
        PaymentOutcome,
        RestaurantId,
        StatusUpdate,
    },
    order_objects::{OrderDetailsUpdate, OrderQueryFilter},
    OrderManagement,
    PaymentManagement,
    PosEngineError,
};

mock! {
    pub PosBackend {}
    impl OrderManagement for PosBackend {
        async fn create_order(&self, restaurant_id: &RestaurantId, order: NewOrder) -> Result<Order, PosEngineError>;
        async fn fetch_order(&self, restaurant_id: &RestaurantId, order_id: &OrderId) -> Result<Option<Order>, PosEngineError>;
        async fn fetch_order_by_id(&self, order_id: &OrderId) -> Result<Option<Order>, PosEngineError>;
        async fn fetch_order_lines(&self, order_id: &OrderId) -> Result<Vec<OrderLine>, PosEngineError>;
        async fn fetch_order_by_transaction_id(&self, checkout_request_id: &str) -> Result<Option<Order>, PosEngineError>;
        async fn search_orders(&self, restaurant_id: &RestaurantId, query: OrderQueryFilter) -> Result<Vec<Order>, PosEngineError>;
        async fn update_order_details(&self, restaurant_id: &RestaurantId, order_id: &OrderId, update: OrderDetailsUpdate) -> Result<Order, PosEngineError>;
        async fn add_order_line(&self, restaurant_id: &RestaurantId, order_id: &OrderId, line: NewOrderLine) -> Result<Order, PosEngineError>;
        async fn update_line_quantity(&self, restaurant_id: &RestaurantId, order_id: &OrderId, line_id: i64, quantity: i64) -> Result<Order, PosEngineError>;
        async fn remove_order_line(&self, restaurant_id: &RestaurantId, order_id: &OrderId, line_id: i64) -> Result<Order, PosEngineError>;
        async fn update_status(&self, restaurant_id: &RestaurantId, order_id: &OrderId, new_status: OrderStatusType) -> Result<StatusUpdate, PosEngineError>;
        async fn delete_order(&self, restaurant_id: &RestaurantId, order_id: &OrderId) -> Result<(), PosEngineError>;
    }
    impl PaymentManagement for PosBackend {
        async fn fetch_gateway_credentials(&self, restaurant_id: &RestaurantId) -> Result<Option<GatewayCredentials>, PosEngineError>;
        async fn record_payment_attempt(&self, restaurant_id: &RestaurantId, order_id: &OrderId, attempt: NewPaymentAttempt) -> Result<Order, PosEngineError>;
        async fn fetch_payment_attempt(&self, checkout_request_id: &str) -> Result<Option<PaymentAttempt>, PosEngineError>;
        async fn fetch_payment_attempts(&self, order_id: &OrderId) -> Result<Vec<PaymentAttempt>, PosEngineError>;
        async fn apply_payment_result(&self, checkout_request_id: &str, outcome: &PaymentOutcome, payment_method: &str) -> Result<ApplyResultOutcome, PosEngineError>;
    }
}
