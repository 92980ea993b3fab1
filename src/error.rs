//! Error types for the relay client.

use relay_core::ApiErrorResponse;
use thiserror::Error;

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error returned by credential providers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by the relay client.
///
/// Every failure reaches the caller through the same channel as the success
/// value; the client never retries or swallows one.
#[derive(Error, Debug)]
pub enum Error {
    /// The token or user-id provider failed.
    #[error("Credential provider failed: {0}")]
    Credential(#[source] BoxError),

    /// The client was configured with an unusable value.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message describing the configuration issue.
        message: String,
    },

    /// The outbound request could not be assembled.
    #[error("Failed to build request: {message}")]
    Build {
        /// Error message describing the build failure.
        message: String,
    },

    /// The query could not be serialized.
    #[error("Failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Connection-level failure reported by a non-reqwest transport.
    #[error("Connection error: {message}")]
    Connection {
        /// Error message describing the connection error.
        message: String,
    },

    /// A streaming response came back with a non-success status and no
    /// structured error body.
    #[error("Unexpected status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// The backend answered with a zero-length body.
    #[error("Empty response body")]
    EmptyResponse,

    /// The body did not match the expected schema.
    #[error("Failed to decode response: {0}")]
    Decode(#[source] serde_json::Error),

    /// The backend returned a structured error payload.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code, `0` when the error arrived inside a stream frame.
        status: u16,
        /// Error message from the provider.
        message: String,
        /// Error category from the provider.
        error_type: Option<String>,
        /// Machine-readable error code.
        code: Option<String>,
        /// Parameter the provider rejected.
        param: Option<String>,
    },

    /// Streaming session failure.
    #[error("Streaming error: {message}")]
    Streaming {
        /// Error message describing the streaming error.
        message: String,
    },
}

impl Error {
    /// Wrap a credential provider failure.
    pub fn credential(error: impl Into<BoxError>) -> Self {
        Self::Credential(error.into())
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a request build error.
    pub fn build(message: impl Into<String>) -> Self {
        Self::Build {
            message: message.into(),
        }
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a streaming error.
    pub fn streaming(message: impl Into<String>) -> Self {
        Self::Streaming {
            message: message.into(),
        }
    }

    /// Create an API error from a decoded error envelope.
    pub fn api(status: u16, response: ApiErrorResponse) -> Self {
        let detail = response.error;
        Self::Api {
            status,
            message: detail.message,
            error_type: detail.error_type,
            code: detail.code,
            param: detail.param,
        }
    }

    /// Get the HTTP status code if available.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } if *status != 0 => Some(*status),
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Check whether this is a structured provider error.
    pub fn is_api_error(&self) -> bool {
        matches!(self, Self::Api { .. })
    }

    /// Check whether the failure happened on the wire.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Connection { .. })
    }
}

impl From<ApiErrorResponse> for Error {
    fn from(response: ApiErrorResponse) -> Self {
        Self::api(0, response)
    }
}
