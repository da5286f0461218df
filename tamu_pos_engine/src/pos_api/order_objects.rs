use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderLine, OrderMode, OrderStatusType};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderQueryFilter {
    /// Match any of these statuses. Empty matches all.
    #[serde(default)]
    pub statuses: Vec<OrderStatusType>,
    pub mode: Option<OrderMode>,
    pub limit: Option<i64>,
}

impl OrderQueryFilter {
    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn with_mode(mut self, mode: OrderMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty() && self.mode.is_none()
    }
}

/// Editable order header fields. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetailsUpdate {
    pub customer_name: Option<String>,
    pub table_number: Option<String>,
}

impl OrderDetailsUpdate {
    pub fn with_customer_name<S: Into<String>>(mut self, name: S) -> Self {
        self.customer_name = Some(name.into());
        self
    }

    pub fn with_table_number<S: Into<String>>(mut self, table: S) -> Self {
        self.table_number = Some(table.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.customer_name.is_none() && self.table_number.is_none()
    }
}

/// An order together with its lines, as returned to the POS front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderWithLines {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderLine>,
}

impl OrderWithLines {
    pub fn new(order: Order, items: Vec<OrderLine>) -> Self {
        Self { order, items }
    }
}
