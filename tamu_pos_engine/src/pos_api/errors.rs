use thiserror::Error;

use crate::traits::{GatewayError, PosEngineError};

#[derive(Debug, Clone, Error)]
pub enum PaymentFlowError {
    #[error(transparent)]
    Engine(#[from] PosEngineError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
