use thiserror::Error;

/// Error outputs from `GuardKit`
#[derive(Debug, Clone, PartialEq, Eq, Error, uniffi::Error)]
#[uniffi(flat_error)]
pub enum GuardKitError {
    /// No enrollment ticket could be resolved from the supplied ticket or URI.
    /// Detected locally, before any network activity.
    #[error("invalid_enrollment_uri")]
    InvalidEnrollmentUri,
    /// The presented input is not valid for the requested operation
    #[error("invalid_input: {attribute} - {reason}")]
    InvalidInput {
        /// The attribute that is invalid
        attribute: String,
        /// The reason the input is invalid
        reason: String,
    },
    /// Network connection error with details
    #[error("network_error: {url} - status: {status:?} - error: {error}")]
    NetworkError {
        /// The URL of the request
        url: String,
        /// The HTTP status, if a response was received
        status: Option<u16>,
        /// The error message
        error: String,
    },
    /// The server rejected the request with a structured error body
    #[error("server_error: {status} - {code}: {message}")]
    ServerError {
        /// The HTTP status of the response
        status: u16,
        /// The server-side error code, e.g. `invalid_token`
        code: String,
        /// Human readable description from the server
        message: String,
    },
    /// The server answered successfully but the body could not be decoded
    #[error("invalid_payload: {0}")]
    InvalidPayload(String),
    /// A key implementation failed to export or sign
    #[error("invalid_key: {0}")]
    InvalidKey(String),
}

impl From<reqwest::Error> for GuardKitError {
    fn from(error: reqwest::Error) -> Self {
        Self::NetworkError {
            url: error
                .url()
                .map_or_else(|| "<unknown>".to_string(), ToString::to_string),
            status: error.status().map(|status| status.as_u16()),
            error: error.to_string(),
        }
    }
}

/// Result of every `GuardKit` operation. Exactly one of a payload or a failure cause.
pub type GuardKitResult<T, E = GuardKitError> = std::result::Result<T, E>;
