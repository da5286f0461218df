//! # Daraja tools
//!
//! A small client for the parts of Safaricom's Daraja API that the POS needs: OAuth, the STK Push request, and the
//! STK Push status query. The wire types for the provider's callback payload also live here, since they describe the
//! same API.
mod api;
mod classification;
mod config;
mod error;

pub mod data_objects;
pub mod helpers;

pub use api::DarajaApi;
pub use classification::classify_query_response;
pub use config::{DarajaConfig, DEFAULT_DARAJA_BASE_URL, DEFAULT_DARAJA_TIMEOUT};
pub use data_objects::{CallbackAck, PushReceipt, StkCallback, StkCallbackEnvelope};
pub use error::DarajaApiError;
