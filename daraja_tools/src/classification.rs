use log::*;
use tamu_common::{ProviderResult, PROCESSING_ERROR_CODE};

use crate::{
    data_objects::{DarajaErrorBody, StkQueryResponse},
    DarajaApiError,
};

/// Turns a raw STK query response into a [`ProviderResult`].
///
/// | Response                                             | Result                    |
/// |------------------------------------------------------|---------------------------|
/// | error body, `errorCode == 500.001.1001`              | `StillProcessing`         |
/// | any other error body                                 | `QueryFailed`             |
/// | 2xx, `ResultCode == 0`                               | `Success`                 |
/// | 2xx, other `ResultCode`                              | `TerminalFailure`         |
/// | 2xx, no `ResultCode`, `ResponseCode != 0`            | `QueryFailed`             |
/// | 2xx, no `ResultCode`                                 | `StillProcessing`         |
/// | non-2xx without a recognisable error body            | `Err(Transport)`          |
/// | 2xx that isn't JSON                                  | `Err(JsonError)`          |
pub fn classify_query_response(status: u16, body: &str) -> Result<ProviderResult, DarajaApiError> {
    if let Ok(err) = serde_json::from_str::<DarajaErrorBody>(body) {
        let result = if err.error_code == PROCESSING_ERROR_CODE {
            ProviderResult::StillProcessing { description: err.error_message }
        } else {
            ProviderResult::QueryFailed { code: err.error_code, description: err.error_message }
        };
        trace!("💳️ Query returned a structured error ({status}). Classified as {result}");
        return Ok(result);
    }
    if !(200..300).contains(&status) {
        debug!("💳️ Query failed with HTTP {status} and an unstructured body");
        return Err(DarajaApiError::Transport(format!("HTTP {status}: {body}")));
    }
    let response = serde_json::from_str::<StkQueryResponse>(body)
        .map_err(|e| DarajaApiError::JsonError(format!("Invalid STK query response. {e}")))?;
    let result = match (response.result_code, response.response_code) {
        (Some(code), _) if code == "0" => {
            ProviderResult::Success { description: response.result_desc.unwrap_or_default() }
        },
        (Some(code), _) => {
            ProviderResult::TerminalFailure { code, description: response.result_desc.unwrap_or_default() }
        },
        (None, Some(code)) if code != "0" => {
            ProviderResult::QueryFailed { code, description: response.response_description.unwrap_or_default() }
        },
        (None, _) => {
            ProviderResult::StillProcessing { description: response.response_description.unwrap_or_default() }
        },
    };
    trace!("💳️ Query classified as {result}");
    Ok(result)
}
