use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use tamu_common::{Kes, Secret};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------     RestaurantId     ---------------------------------------------------------
/// The tenant key. Every order, food item and payment attempt belongs to exactly one restaurant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct RestaurantId(pub String);

impl<S: Into<String>> From<S> for RestaurantId {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

impl Display for RestaurantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl RestaurantId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------        OrderId        ---------------------------------------------------------
/// An opaque order identifier (a v4 UUID). Not to be confused with the human-readable order number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OrderId {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            Err(ConversionError("Order id cannot be empty".to_string()))
        } else {
            Ok(Self(s.to_string()))
        }
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------       OrderMode       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderMode {
    /// A running tab. May be opened before anything is ordered.
    Tab,
    /// Dine-in at a table. May be opened before anything is ordered.
    Table,
    TakeAway,
    Delivery,
}

impl OrderMode {
    /// Tabs and tables are opened first and filled later. Everything else must be created with at least one item.
    pub fn requires_items(&self) -> bool {
        matches!(self, Self::TakeAway | Self::Delivery)
    }
}

impl Display for OrderMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Tab => "TAB",
            Self::Table => "TABLE",
            Self::TakeAway => "TAKE_AWAY",
            Self::Delivery => "DELIVERY",
        };
        write!(f, "{s}")
    }
}

impl FromStr for OrderMode {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "TAB" => Ok(Self::Tab),
            "TABLE" => Ok(Self::Table),
            "TAKE_AWAY" | "TAKEAWAY" => Ok(Self::TakeAway),
            "DELIVERY" => Ok(Self::Delivery),
            _ => Err(ConversionError(format!("Invalid order mode: {s}"))),
        }
    }
}

//--------------------------------------    OrderStatusType    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatusType {
    /// The order is being built up. Items can be added and removed.
    Open,
    /// An STK push has been sent and we are waiting for the customer to authorise it.
    PendingPayment,
    /// The provider confirmed payment.
    Paid,
    /// The order was cancelled, either by staff or because the payment failed.
    Cancelled,
    /// The order was paid for and has been served / delivered.
    Completed,
}

impl OrderStatusType {
    /// Terminal orders never accept another payment result, and their lines and totals are frozen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Cancelled | Self::Completed)
    }

    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// The statuses an order may be in for a transition to `self` to be allowed.
    ///
    /// | To \ From        | Open | PendingPayment | Paid | Cancelled | Completed |
    /// |------------------|------|----------------|------|-----------|-----------|
    /// | Open             |      |                |      |           |           |
    /// | PendingPayment   | ✓    | ✓              |      |           |           |
    /// | Paid             | ✓    | ✓              |      |           |           |
    /// | Cancelled        | ✓    | ✓              |      |           |           |
    /// | Completed        |      |                | ✓    |           |           |
    pub fn allowed_predecessors(&self) -> &'static [OrderStatusType] {
        use OrderStatusType::*;
        match self {
            Open => &[],
            PendingPayment | Paid | Cancelled => &[Open, PendingPayment],
            Completed => &[Paid],
        }
    }

    pub fn can_transition_to(&self, new_status: OrderStatusType) -> bool {
        new_status.allowed_predecessors().contains(self)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Open => "OPEN",
            Self::PendingPayment => "PENDING_PAYMENT",
            Self::Paid => "PAID",
            Self::Cancelled => "CANCELLED",
            Self::Completed => "COMPLETED",
        };
        write!(f, "{s}")
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "OPEN" => Ok(Self::Open),
            "PENDING_PAYMENT" => Ok(Self::PendingPayment),
            "PAID" => Ok(Self::Paid),
            "CANCELLED" => Ok(Self::Cancelled),
            "COMPLETED" => Ok(Self::Completed),
            _ => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------         Order         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub restaurant_id: RestaurantId,
    pub mode: OrderMode,
    pub status: OrderStatusType,
    pub customer_name: Option<String>,
    pub table_number: Option<String>,
    pub subtotal: Kes,
    pub vat: Kes,
    pub catering_levy: Kes,
    pub total: Kes,
    /// The checkout reference of the most recent payment attempt.
    pub transaction_id: Option<String>,
    pub payment_method: Option<String>,
    /// True once a provider result (from either the callback or a status query) has been applied.
    pub callback_received: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------       OrderLine       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub id: i64,
    pub order_id: OrderId,
    pub food_item_id: String,
    /// The item name at the time it was ordered
    pub item_name: String,
    pub quantity: i64,
    pub notes: Option<String>,
    /// The unit price at the time it was ordered. Later menu price changes do not affect existing orders.
    pub price_at_order: Kes,
    pub created_at: DateTime<Utc>,
}

impl OrderLine {
    pub fn line_total(&self) -> Kes {
        self.price_at_order * self.quantity
    }
}

//--------------------------------------       NewOrder        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub mode: OrderMode,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub table_number: Option<String>,
    #[serde(default)]
    pub items: Vec<NewOrderLine>,
}

impl NewOrder {
    pub fn new(mode: OrderMode) -> Self {
        Self { mode, customer_name: None, table_number: None, items: Vec::new() }
    }

    pub fn with_customer_name<S: Into<String>>(mut self, name: S) -> Self {
        self.customer_name = Some(name.into());
        self
    }

    pub fn with_table_number<S: Into<String>>(mut self, table: S) -> Self {
        self.table_number = Some(table.into());
        self
    }

    pub fn with_item(mut self, item: NewOrderLine) -> Self {
        self.items.push(item);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderLine {
    pub food_item_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewOrderLine {
    pub fn new<S: Into<String>>(food_item_id: S, quantity: i64) -> Self {
        Self { food_item_id: food_item_id.into(), quantity, notes: None }
    }

    pub fn with_notes<S: Into<String>>(mut self, notes: S) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

//--------------------------------------       FoodItem        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodItem {
    pub id: String,
    pub restaurant_id: RestaurantId,
    pub name: String,
    pub price: Kes,
    pub available: bool,
}

#[derive(Debug, Clone)]
pub struct NewFoodItem {
    pub id: String,
    pub restaurant_id: RestaurantId,
    pub name: String,
    pub price: Kes,
    pub available: bool,
}

impl NewFoodItem {
    pub fn new<S: Into<String>>(id: S, restaurant_id: RestaurantId, name: S, price: Kes) -> Self {
        Self { id: id.into(), restaurant_id, name: name.into(), price, available: true }
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }
}

//--------------------------------------      Restaurant       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Restaurant {
    pub id: RestaurantId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewRestaurant {
    pub id: String,
    pub name: String,
    pub credentials: Option<GatewayCredentials>,
}

impl NewRestaurant {
    pub fn new<S: Into<String>>(id: S, name: S) -> Self {
        Self { id: id.into(), name: name.into(), credentials: None }
    }

    pub fn with_credentials(mut self, credentials: GatewayCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

/// A restaurant's M-Pesa credentials, exactly as stored. Any of the fields may be blank; they are validated when a
/// gateway is built from them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayCredentials {
    pub consumer_key: String,
    pub consumer_secret: Secret<String>,
    pub passkey: Secret<String>,
    pub shortcode: String,
}

impl GatewayCredentials {
    pub fn new(consumer_key: &str, consumer_secret: &str, passkey: &str, shortcode: &str) -> Self {
        Self {
            consumer_key: consumer_key.to_string(),
            consumer_secret: Secret::from(consumer_secret),
            passkey: Secret::from(passkey),
            shortcode: shortcode.to_string(),
        }
    }
}

//--------------------------------------    PaymentAttempt     ---------------------------------------------------------
/// One STK push request that was accepted by the provider.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAttempt {
    pub checkout_request_id: String,
    pub merchant_request_id: String,
    pub order_id: OrderId,
    pub restaurant_id: RestaurantId,
    pub phone_number: String,
    pub amount: Kes,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPaymentAttempt {
    pub checkout_request_id: String,
    pub merchant_request_id: String,
    pub phone_number: String,
    pub amount: Kes,
}

//--------------------------------------    PaymentOutcome     ---------------------------------------------------------
/// A provider's verdict on a payment attempt, as reported by the callback or by a status query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOutcome {
    pub success: bool,
    pub result_code: String,
    pub result_desc: String,
    /// An M-Pesa receipt number, when the provider supplied one
    pub receipt: Option<String>,
}

impl PaymentOutcome {
    pub fn success<S: Into<String>>(description: S) -> Self {
        Self { success: true, result_code: "0".to_string(), result_desc: description.into(), receipt: None }
    }

    pub fn failure<S: Into<String>>(code: S, description: S) -> Self {
        Self { success: false, result_code: code.into(), result_desc: description.into(), receipt: None }
    }

    pub fn with_receipt<S: Into<String>>(mut self, receipt: S) -> Self {
        self.receipt = Some(receipt.into());
        self
    }

    /// The status an order moves to when this outcome is applied.
    pub fn target_status(&self) -> OrderStatusType {
        if self.success {
            OrderStatusType::Paid
        } else {
            OrderStatusType::Cancelled
        }
    }
}

impl Display for PaymentOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verdict = if self.success { "success" } else { "failure" };
        write!(f, "{verdict} ({}: {})", self.result_code, self.result_desc)
    }
}

/// What `update_status` actually did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    /// This call moved the order to the new status.
    Changed(Order),
    /// The order already had the requested status. Nothing changed.
    Unchanged(Order),
}

impl StatusUpdate {
    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed(_))
    }

    pub fn into_order(self) -> Order {
        match self {
            Self::Changed(o) | Self::Unchanged(o) => o,
        }
    }
}

/// What `apply_payment_result` actually did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyResultOutcome {
    /// The order moved to a terminal state. This is the only outcome that triggers side effects.
    Applied(Order),
    /// The order was already PAID, CANCELLED or COMPLETED. Nothing changed.
    AlreadyTerminal(Order),
    /// A failure arrived for an attempt that has since been replaced by a newer one. Nothing changed.
    Superseded(Order),
    /// No recorded attempt has this checkout reference.
    UnknownTransaction,
}

impl ApplyResultOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    pub fn order(&self) -> Option<&Order> {
        match self {
            Self::Applied(o) | Self::AlreadyTerminal(o) | Self::Superseded(o) => Some(o),
            Self::UnknownTransaction => None,
        }
    }
}

impl Display for ApplyResultOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Applied(o) => write!(f, "applied, order {} is now {}", o.order_number, o.status),
            Self::AlreadyTerminal(o) => write!(f, "ignored, order {} is already {}", o.order_number, o.status),
            Self::Superseded(o) => write!(f, "ignored, order {} has a newer payment attempt", o.order_number),
            Self::UnknownTransaction => write!(f, "ignored, unknown transaction"),
        }
    }
}
