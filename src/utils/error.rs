use thiserror::Error;

/// Failure of a single call to one of the vendor APIs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("{service} API key is not provided")]
    MissingCredential { service: &'static str },

    #[error("HTTP {status} - {body}")]
    Http { status: u16, body: String },

    #[error("Request failed: {0}")]
    Transport(String),

    /// `body` is the vendor reply, cut to a bounded size.
    #[error("Unexpected response structure: {reason}")]
    MalformedResponse { reason: String, body: String },
}

impl ApiError {
    /// Stable code used in tool error payloads.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::MissingCredential { .. } => "ERR_MISSING_CREDENTIAL",
            ApiError::Http { .. } => "ERR_HTTP",
            ApiError::Transport(_) => "ERR_TRANSPORT",
            ApiError::MalformedResponse { .. } => "ERR_MALFORMED_RESPONSE",
        }
    }
}
