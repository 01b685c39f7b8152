//! API error types.

use thiserror::Error;

/// Errors returned by the remote API client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced an HTTP response.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// The remote answered with a non-2xx status.
    #[error("remote error (HTTP {status}): {message}")]
    Remote {
        status: u16,
        error_code: Option<String>,
        message: String,
    },

    /// A 2xx response whose body did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// Provider settings could not be turned into a client.
    #[error("invalid provider configuration: {0}")]
    InvalidConfig(String),
}

impl ApiError {
    /// Transport failure with no underlying client error.
    pub fn transport(message: impl Into<String>) -> Self {
        ApiError::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// HTTP status of the failed call, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Remote `error_code` field (e.g. `RESOURCE_DOES_NOT_EXIST`).
    pub fn error_code(&self) -> Option<&str> {
        match self {
            ApiError::Remote { error_code, .. } => error_code.as_deref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Transport {
                message: e.to_string(),
                source: Some(e),
            }
        }
    }
}

/// Result type for API calls.
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_only_for_remote_errors() {
        let remote = ApiError::Remote {
            status: 404,
            error_code: Some("RESOURCE_DOES_NOT_EXIST".to_string()),
            message: "Cluster abc does not exist".to_string(),
        };
        assert_eq!(remote.status(), Some(404));
        assert_eq!(remote.error_code(), Some("RESOURCE_DOES_NOT_EXIST"));

        let transport = ApiError::transport("connection refused");
        assert_eq!(transport.status(), None);
        assert_eq!(transport.error_code(), None);
    }

    #[test]
    fn test_display_includes_status() {
        let err = ApiError::Remote {
            status: 400,
            error_code: None,
            message: "bad".to_string(),
        };
        assert_eq!(err.to_string(), "remote error (HTTP 400): bad");
    }
}
