use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum DarajaApiError {
    #[error("The M-Pesa configuration is incomplete. Missing: {}", .0.join(", "))]
    MissingCredentials(Vec<String>),
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Could not authenticate with M-Pesa. {0}")]
    CannotAuthenticate(String),
    #[error("Invalid phone number: {0}")]
    InvalidPhoneNumber(String),
    #[error("Invalid payment amount: {0}")]
    InvalidAmount(String),
    #[error("Could not reach M-Pesa. {0}")]
    Transport(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("M-Pesa rejected the request. Error {status}. {message}")]
    ProviderRejected { status: u16, message: String },
}

impl DarajaApiError {
    /// Only transport-level failures are worth retrying. Anything the provider actually said is final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
