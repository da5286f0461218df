//! Tamu POS Engine
//!
//! The engine behind a restaurant point-of-sale: orders, their lines and totals, and getting them paid for through
//! M-Pesa STK push.
//!
//! The library is divided into these main sections:
//! 1. Storage ([`SqliteDatabase`]). You should not need to touch the database directly. Use the public API instead.
//!    The data types the store works with are defined in [`mod@db_types`] and are public.
//! 2. The public API ([`OrderFlowApi`] and [`PaymentFlowApi`]). Backends implement [`OrderManagement`] and
//!    [`PaymentManagement`] to act as storage for the API, and payment providers implement [`PaymentGateway`].
//! 3. Client-side reconciliation ([`mod@payment_poller`]), which a till uses to find out whether a payment went
//!    through when the provider's callback is slow or lost.
//!
//! The engine emits events when an order is paid for or annulled. A simple actor framework ([`mod@events`]) lets you
//! hook into these and do things like printing receipts.
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod payment_poller;
mod pos_api;
mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use pos_api::{
    errors::PaymentFlowError,
    order_flow_api::OrderFlowApi,
    order_objects,
    payment_flow_api::{PaymentFlowApi, PAYMENT_METHOD_MPESA},
    payment_objects,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    GatewayError,
    GatewayFactory,
    GatewayReceipt,
    OrderManagement,
    PaymentGateway,
    PaymentManagement,
    PosEngineError,
};
