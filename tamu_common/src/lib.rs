mod helpers;
mod kes;
mod provider_result;

pub mod op;
mod secret;

pub use helpers::{parse_boolean_flag, parse_ip_list};
pub use kes::{Kes, KesConversionError, KES_CURRENCY_CODE};
pub use provider_result::{ProviderResult, DEFINITIVE_FAILURE_CODES, PROCESSING_ERROR_CODE, USER_CANCELLED_CODE};
pub use secret::Secret;
