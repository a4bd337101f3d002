pub mod ask_question_tool;
pub mod generate_audio_tool;
pub mod load_document_tool;
pub mod session_status_tool;
pub mod set_credentials_tool;
pub mod summarize_tool;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::mcp::types::CallToolResult;
use crate::session::ActionError;
use crate::utils::content_guard::build_error_payload;
use crate::utils::error::ApiError;

/// Deserializes tool arguments; absent arguments are treated as `{}`.
pub(crate) fn parse_arguments<T: DeserializeOwned>(
    arguments: Option<Value>,
) -> Result<T, CallToolResult> {
    serde_json::from_value::<T>(arguments.unwrap_or_else(|| json!({}))).map_err(|e| {
        CallToolResult::error(build_error_payload(
            "ERR_INVALID_PARAMS",
            &format!("Invalid parameters: {}", e),
            json!({}),
        ))
    })
}

pub(crate) fn invalid_params(message: &str, details: Value) -> CallToolResult {
    CallToolResult::error(build_error_payload("ERR_INVALID_PARAMS", message, details))
}

/// Turns a failed action into the standardized error payload shown to the user.
/// `service` labels vendor failures, e.g. "Gemini API".
pub(crate) fn action_error_result(service: &str, err: &ActionError) -> CallToolResult {
    let message = match err {
        ActionError::Api(ApiError::MissingCredential { .. }) => {
            format!("{}. Please enter it with the set-credentials tool.", err)
        }
        ActionError::Api(e) => format!("{} Error: {}", service, e),
        other => other.to_string(),
    };

    let details = match err {
        ActionError::Api(ApiError::Http { status, body }) => json!({
            "status": status,
            "body": body,
        }),
        ActionError::Api(ApiError::MissingCredential { service }) => json!({
            "service": service,
            "hint": "Call set-credentials before retrying.",
        }),
        ActionError::Api(ApiError::MalformedResponse { reason, body }) => json!({
            "reason": reason,
            "body": body,
        }),
        ActionError::Api(ApiError::Transport(reason)) => json!({ "reason": reason }),
        ActionError::Extraction(e) => json!({ "reason": e.to_string() }),
        _ => json!({}),
    };

    CallToolResult::error(build_error_payload(err.code(), &message, details))
}
