use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// The result code M-Pesa returns when the customer dismisses or cancels the PIN prompt.
pub const USER_CANCELLED_CODE: &str = "1032";

/// The error code the STK query endpoint returns while the customer has not yet responded to the prompt.
pub const PROCESSING_ERROR_CODE: &str = "500.001.1001";

/// Result codes that mean the transaction will never succeed, so there is no point in querying it again.
///
/// * `1`    - insufficient balance
/// * `2001` - wrong PIN
/// * `1037` - the phone could not be reached
/// * `1025` - error sending the push request
/// * `1001` - a transaction is already in progress for the subscriber
pub const DEFINITIVE_FAILURE_CODES: [&str; 5] = ["1", "2001", "1037", "1025", "1001"];

/// The classified answer to "what happened to this checkout request?".
///
/// Every response the payment provider can give is folded into one of these variants, so callers never have to
/// re-interpret raw provider JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderResult {
    /// The customer authorised the payment.
    Success { description: String },
    /// The provider is still waiting on the customer. Not a failure.
    StillProcessing { description: String },
    /// The status query itself was rejected by the provider.
    QueryFailed { code: String, description: String },
    /// The transaction has been resolved, but not successfully.
    TerminalFailure { code: String, description: String },
}

impl ProviderResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn is_still_processing(&self) -> bool {
        matches!(self, Self::StillProcessing { .. })
    }

    pub fn is_user_cancelled(&self) -> bool {
        matches!(self, Self::TerminalFailure { code, .. } if code == USER_CANCELLED_CODE)
    }

    /// True when the provider says the transaction failed and will not change its mind.
    ///
    /// Terminal failures with codes that are not in the definitive list are treated as "maybe later" by the poller.
    pub fn is_definitive_failure(&self) -> bool {
        match self {
            Self::TerminalFailure { code, .. } => {
                code == USER_CANCELLED_CODE || DEFINITIVE_FAILURE_CODES.contains(&code.as_str())
            },
            _ => false,
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Self::Success { .. } => "0",
            Self::StillProcessing { .. } => PROCESSING_ERROR_CODE,
            Self::QueryFailed { code, .. } | Self::TerminalFailure { code, .. } => code.as_str(),
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::Success { description }
            | Self::StillProcessing { description }
            | Self::QueryFailed { description, .. }
            | Self::TerminalFailure { description, .. } => description.as_str(),
        }
    }
}

impl Display for ProviderResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success { .. } => write!(f, "SUCCESS"),
            Self::StillProcessing { .. } => write!(f, "STILL_PROCESSING"),
            Self::QueryFailed { code, description } => write!(f, "QUERY_FAILED ({code}: {description})"),
            Self::TerminalFailure { code, description } => write!(f, "TERMINAL_FAILURE ({code}: {description})"),
        }
    }
}
