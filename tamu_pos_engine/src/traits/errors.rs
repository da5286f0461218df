use thiserror::Error;

use crate::db_types::{OrderId, OrderStatusType, RestaurantId};

#[derive(Debug, Clone, Error)]
pub enum PosEngineError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order line {0} does not exist")]
    OrderLineNotFound(i64),
    #[error("Menu item {0} does not exist")]
    FoodItemNotFound(String),
    #[error("Menu item {0} is not available")]
    FoodItemUnavailable(String),
    #[error("Restaurant {0} does not exist")]
    RestaurantNotFound(RestaurantId),
    #[error("No payment attempt has checkout reference {0}")]
    TransactionNotFound(String),
    #[error("Invalid request. {0}")]
    ValidationError(String),
    #[error("Order {order_id} is {status} and can no longer be edited")]
    OrderFrozen { order_id: OrderId, status: OrderStatusType },
    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidTransition { order_id: OrderId, from: OrderStatusType, to: OrderStatusType },
    #[error("Could not allocate an order number after {0} attempts")]
    OrderNumberExhausted(usize),
}

impl From<sqlx::Error> for PosEngineError {
    fn from(e: sqlx::Error) -> Self {
        PosEngineError::DatabaseError(e.to_string())
    }
}
