//! # Tamu POS engine public API
//!
//! * [`order_flow_api`] creates and edits orders, and handles the staff-driven status changes (cancel, complete).
//! * [`payment_flow_api`] drives payments: initiating an STK push, applying provider results from the callback or
//!   from status queries, and reconciling orders whose callback never arrived.
//!
//! The other submodules in this module are support types.
//!
//! # API usage
//!
//! An API instance is created by supplying a backend that implements the traits the API needs:
//!
//! ```rust,ignore
//! use tamu_pos_engine::{events::EventProducers, OrderFlowApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let api = OrderFlowApi::new(db, EventProducers::default());
//! let order = api.create_order(&restaurant_id, new_order).await?;
//! ```
pub mod errors;
pub mod order_flow_api;
pub mod order_objects;
pub mod payment_flow_api;
pub mod payment_objects;
