//! # Backend and gateway contracts
//!
//! The payment engine is written against these traits rather than against a concrete database or payment provider.
//!
//! * [`OrderManagement`] is the order store: creating orders, editing lines and moving orders through their status
//!   lifecycle. Every write is scoped by restaurant and fails closed if the order belongs to someone else.
//! * [`PaymentManagement`] records payment attempts and provides the single idempotent gate through which payment
//!   results are applied.
//! * [`PaymentGateway`] is one merchant's connection to the payment provider, and [`GatewayFactory`] builds one from
//!   a restaurant's stored credentials.
mod errors;
mod order_management;
mod payment_gateway;
mod payment_management;

pub use errors::PosEngineError;
pub use order_management::OrderManagement;
pub use payment_gateway::{GatewayError, GatewayFactory, GatewayReceipt, PaymentGateway};
pub use payment_management::PaymentManagement;
