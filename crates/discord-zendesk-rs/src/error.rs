// ABOUTME: Error types for discord-zendesk-rs.
// ABOUTME: Defines BridgeError enum covering Discord, Zendesk, storage, Config, and IO failures.

use thiserror::Error;

/// Error types for the support bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration loading or validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Discord REST or gateway error from serenity.
    #[error("Discord error: {0}")]
    Discord(#[from] serenity::Error),

    /// Zendesk answered with an unexpected status code.
    #[error("{status} {body}")]
    Zendesk { status: u16, body: String },

    /// Transport failure talking to Zendesk (connect, timeout, decode).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Mapping store failure.
    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    /// IO error for file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Status code returned by Zendesk, if this is an API rejection.
    pub fn zendesk_status(&self) -> Option<u16> {
        match self {
            BridgeError::Zendesk { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type alias using BridgeError.
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zendesk_error_displays_status_and_body() {
        let err = BridgeError::Zendesk {
            status: 422,
            body: "{\"error\":\"RecordInvalid\"}".to_string(),
        };
        assert_eq!(err.to_string(), "422 {\"error\":\"RecordInvalid\"}");
        assert_eq!(err.zendesk_status(), Some(422));
    }

    #[test]
    fn test_non_api_error_has_no_status() {
        let err = BridgeError::Config("missing".into());
        assert!(err.zendesk_status().is_none());
    }
}
