use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::error;
use tamu_pos_engine::{GatewayError, PaymentFlowError, PosEngineError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Payload deserialization error")]
    CouldNotDeserializePayload,
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Invalid request. {0}")]
    ValidationError(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The request conflicts with the current state of the order. {0}")]
    Conflict(String),
    #[error("The payment gateway is not configured for this restaurant. {0}")]
    GatewayConfiguration(String),
    #[error("The payment provider returned an error. {0}")]
    ProviderError(String),
    #[error("The payment provider could not be reached. {0}")]
    ProviderUnavailable(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::CouldNotDeserializePayload => StatusCode::BAD_REQUEST,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingToken => StatusCode::UNAUTHORIZED,
                AuthError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
                AuthError::ExpiredToken => StatusCode::UNAUTHORIZED,
                AuthError::ForbiddenPeer => StatusCode::FORBIDDEN,
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            },
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::GatewayConfiguration(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ProviderError(_) => StatusCode::BAD_GATEWAY,
            Self::ProviderUnavailable(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No access token was provided.")]
    MissingToken,
    #[error("The access token is invalid. {0}")]
    InvalidToken(String),
    #[error("The access token has expired.")]
    ExpiredToken,
    #[error("Requests from this address are not allowed.")]
    ForbiddenPeer,
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
}

impl From<PosEngineError> for ServerError {
    fn from(e: PosEngineError) -> Self {
        match e {
            PosEngineError::OrderNotFound(_)
            | PosEngineError::OrderLineNotFound(_)
            | PosEngineError::FoodItemNotFound(_)
            | PosEngineError::RestaurantNotFound(_)
            | PosEngineError::TransactionNotFound(_) => Self::NoRecordFound(e.to_string()),
            PosEngineError::ValidationError(_) | PosEngineError::FoodItemUnavailable(_) => {
                Self::ValidationError(e.to_string())
            },
            PosEngineError::OrderFrozen { .. } | PosEngineError::InvalidTransition { .. } => {
                Self::Conflict(e.to_string())
            },
            PosEngineError::DatabaseError(_) | PosEngineError::OrderNumberExhausted(_) => {
                error!("💻️ Backend failure. {e}");
                Self::BackendError(e.to_string())
            },
        }
    }
}

impl From<GatewayError> for ServerError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::MissingCredentials(_) | GatewayError::Initialization(_) => {
                Self::GatewayConfiguration(e.to_string())
            },
            GatewayError::InvalidRequest(_) => Self::ValidationError(e.to_string()),
            GatewayError::CannotAuthenticate(_) | GatewayError::Rejected(_) => Self::ProviderError(e.to_string()),
            GatewayError::Transport(_) => Self::ProviderUnavailable(e.to_string()),
        }
    }
}

impl From<PaymentFlowError> for ServerError {
    fn from(e: PaymentFlowError) -> Self {
        match e {
            PaymentFlowError::Engine(e) => e.into(),
            PaymentFlowError::Gateway(e) => e.into(),
        }
    }
}
