//! Error types for the ImgPress client.

use serde_json::Value;
use thiserror::Error;

use crate::types::LastError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The account check performed at construction did not succeed.
    #[error("unable to authenticate: {0}")]
    Authentication(String),

    /// Required configuration is missing or malformed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// `wait` resolved to `false` but no callback URL was configured.
    #[error("a callback URL is required when wait is false")]
    MissingCallback,

    /// The service answered 200 but reported `success != true`.
    #[error("API request was not successful: {body}")]
    Api { body: Value },

    /// The service answered with a non-200 status.
    #[error("API request failed with status {status}: {message}")]
    Status {
        status: u16,
        body: Option<Value>,
        message: String,
    },

    #[error("response is missing the `{0}` field")]
    MissingField(&'static str),

    #[error("response field `{field}` has an unexpected value: {value}")]
    InvalidField { field: &'static str, value: Value },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] wreq::Error),

    /// Failure reported by a custom transport.
    #[error("{0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Configuration errors are returned to the caller; everything else is an
    /// operational failure the soft methods record instead.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Authentication(_) | Self::Config(_) | Self::MissingCallback
        )
    }

    /// The value recorded as the client's last error: the decoded error body
    /// when the service sent one, the error message otherwise.
    pub fn to_last_error(&self) -> LastError {
        match self {
            Self::Api { body } => LastError::Body(body.clone()),
            Self::Status {
                body: Some(body), ..
            } => LastError::Body(body.clone()),
            other => LastError::Message(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_with_body_records_body() {
        let err = Error::Status {
            status: 401,
            body: Some(json!({"success": false, "message": "bad key"})),
            message: "401 Unauthorized".to_string(),
        };
        assert_eq!(
            err.to_last_error(),
            LastError::Body(json!({"success": false, "message": "bad key"}))
        );
    }

    #[test]
    fn test_transport_records_message() {
        let err = Error::Transport("connection refused".to_string());
        assert_eq!(
            err.to_last_error(),
            LastError::Message("connection refused".to_string())
        );
        assert!(!err.is_configuration());
        assert!(Error::MissingCallback.is_configuration());
    }
}
