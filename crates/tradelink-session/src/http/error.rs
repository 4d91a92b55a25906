/*
[INPUT]:  Error sources (HTTP, backend envelopes, signer, storage, serialization)
[OUTPUT]: Structured session errors with user-facing classification
[POS]:    Error handling layer - unified error type for the session crate
[UPDATE]: When adding new error sources or changing failure classification
*/

use reqwest::StatusCode;
use thiserror::Error;

/// Shown when a credential has expired and the user has to sign in again.
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired, please log in again";

/// Shown for every other authentication failure.
pub const AUTHENTICATION_FAILED_MESSAGE: &str = "Authentication failed";

/// Shown when the backend cannot be reached at all.
pub const SERVICE_UNAVAILABLE_MESSAGE: &str = "Service unavailable, please try again later";

const EXPIRY_MARKER: &str = "expired";
const REJECTION_MARKER: &str = "user rejected";

/// Main error type for the session crate
#[derive(Error, Debug)]
pub enum SessionError {
    /// HTTP request failed before a response was received
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned a non-success status code
    #[error("API error (code {code}): {message}")]
    Api { code: u16, message: String },

    /// API answered 2xx but reported `success: false`
    #[error("Request rejected by backend: {message}")]
    Rejected { message: String },

    /// A refresh was requested without a refresh token in the session
    #[error("No refresh token available")]
    NoRefreshToken,

    /// A response arrived for a session that has since been replaced or logged out
    #[error("Session changed while the request was in flight")]
    StaleSession,

    /// Wallet challenge could not be generated
    #[error("Challenge generation failed: {0}")]
    Challenge(String),

    /// The wallet cannot sign arbitrary messages
    #[error("Wallet does not support message signing")]
    SigningUnsupported,

    /// The user declined the signature prompt
    #[error("Signature rejected by user")]
    SignatureRejected,

    /// Signing failed for a reason other than user rejection
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Invalid response from server
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Persistent storage failed
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SessionError {
    /// Check if the error means a credential is past expiry
    pub fn is_expiry(&self) -> bool {
        match self {
            SessionError::Api { message, .. } | SessionError::Rejected { message } => {
                contains_marker(message, EXPIRY_MARKER)
            }
            other => contains_marker(&other.to_string(), EXPIRY_MARKER),
        }
    }

    /// Check if the backend could not be reached or is failing on its side
    pub fn is_unavailable(&self) -> bool {
        match self {
            SessionError::Http(err) => err.is_connect() || err.is_timeout() || err.is_request(),
            SessionError::Api { code, .. } => *code >= 500,
            _ => false,
        }
    }

    /// Check if the user declined to sign (or could not be asked to)
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            SessionError::SignatureRejected | SessionError::SigningUnsupported
        )
    }

    /// Two-way classification used when an existing credential stops working
    pub fn credential_message(&self) -> &'static str {
        if self.is_expiry() {
            SESSION_EXPIRED_MESSAGE
        } else {
            AUTHENTICATION_FAILED_MESSAGE
        }
    }

    /// Three-way classification used by the login flows
    pub fn login_message(&self) -> &'static str {
        if self.is_expiry() {
            SESSION_EXPIRED_MESSAGE
        } else if self.is_unavailable() {
            SERVICE_UNAVAILABLE_MESSAGE
        } else {
            AUTHENTICATION_FAILED_MESSAGE
        }
    }

    /// Create an API error from status code and message
    pub fn api_error(status: StatusCode, message: impl Into<String>) -> Self {
        SessionError::Api {
            code: status.as_u16(),
            message: message.into(),
        }
    }

    /// Map a signer's error text onto the wallet-flow failure it stands for
    pub fn from_signer_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if contains_marker(&message, REJECTION_MARKER) {
            SessionError::SignatureRejected
        } else {
            SessionError::Signing(message)
        }
    }
}

fn contains_marker(haystack: &str, marker: &str) -> bool {
    haystack.to_ascii_lowercase().contains(marker)
}

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(SessionError::api_error(StatusCode::UNAUTHORIZED, "Refresh token expired"), true)]
    #[case(SessionError::Rejected { message: "jwt EXPIRED".to_string() }, true)]
    #[case(SessionError::api_error(StatusCode::UNAUTHORIZED, "invalid token"), false)]
    #[case(SessionError::NoRefreshToken, false)]
    fn test_expiry_classification(#[case] err: SessionError, #[case] expired: bool) {
        assert_eq!(err.is_expiry(), expired);
    }

    #[test]
    fn test_credential_message_is_two_way() {
        assert_eq!(
            SessionError::api_error(StatusCode::UNAUTHORIZED, "token expired").credential_message(),
            SESSION_EXPIRED_MESSAGE
        );
        assert_eq!(
            SessionError::api_error(StatusCode::BAD_GATEWAY, "upstream").credential_message(),
            AUTHENTICATION_FAILED_MESSAGE
        );
    }

    #[test]
    fn test_login_message_reports_unavailable_backend() {
        let err = SessionError::api_error(StatusCode::SERVICE_UNAVAILABLE, "maintenance");
        assert!(err.is_unavailable());
        assert_eq!(err.login_message(), SERVICE_UNAVAILABLE_MESSAGE);
    }

    #[rstest]
    #[case("User rejected the request.", true)]
    #[case("WalletSignMessageError: user rejected", true)]
    #[case("device disconnected", false)]
    fn test_signer_message_mapping(#[case] message: &str, #[case] rejected: bool) {
        let err = SessionError::from_signer_message(message);
        assert_eq!(err.is_rejection(), rejected);
    }

    #[test]
    fn test_api_error_creation() {
        let err = SessionError::api_error(StatusCode::BAD_REQUEST, "Invalid address");
        match err {
            SessionError::Api { code, message } => {
                assert_eq!(code, 400);
                assert_eq!(message, "Invalid address");
            }
            _ => panic!("Expected Api error variant"),
        }
    }
}
