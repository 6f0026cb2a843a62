//! Error types for the Obelisk integration.
//!
//! The top-level [`ObeliskError`] follows the failure taxonomy of the client:
//! authentication failures, retriable transient faults, non-retriable client
//! rejections and page-consistency protocol violations. Everything else
//! (configuration, malformed responses, input validation) gets its own
//! variant so callers can match on what went wrong.

use reqwest::StatusCode;
use thiserror::Error;

/// Result type for Obelisk operations.
pub type ObeliskResult<T> = Result<T, ObeliskError>;

/// Top-level error type for the Obelisk integration.
#[derive(Debug, Error)]
pub enum ObeliskError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Credential exchange failed.
    #[error("Authentication error: {0}")]
    Authentication(#[from] AuthenticationError),

    /// Retriable server or network fault.
    #[error("Transient error: {0}")]
    Transient(#[from] TransientError),

    /// Non-retriable request rejection.
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    /// Server response violated the paging contract.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Response could not be interpreted.
    #[error("Response error: {0}")]
    Response(#[from] ResponseError),

    /// Caller input was rejected before anything was sent.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Coarse error classification.
///
/// Two errors with the same kind were raised for the same reason, which is
/// what callers (and the blocking/async equivalence tests) compare on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`ObeliskError::Configuration`].
    Configuration,
    /// See [`ObeliskError::Authentication`].
    Authentication,
    /// See [`ObeliskError::Transient`].
    Transient,
    /// See [`ObeliskError::Client`].
    Client,
    /// See [`ObeliskError::Protocol`].
    Protocol,
    /// See [`ObeliskError::Response`].
    Response,
    /// See [`ObeliskError::Validation`].
    Validation,
}

impl ObeliskError {
    /// Creates a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        ObeliskError::Configuration(ConfigurationError::InvalidConfiguration(msg.into()))
    }

    /// Creates a deserialization error.
    pub fn deserialization(msg: impl Into<String>) -> Self {
        ObeliskError::Response(ResponseError::Deserialization(msg.into()))
    }

    /// Creates an invalid parameter error.
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        ObeliskError::Validation(ValidationError::InvalidParameter(msg.into()))
    }

    /// Returns the error classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ObeliskError::Configuration(_) => ErrorKind::Configuration,
            ObeliskError::Authentication(_) => ErrorKind::Authentication,
            ObeliskError::Transient(_) => ErrorKind::Transient,
            ObeliskError::Client(_) => ErrorKind::Client,
            ObeliskError::Protocol(_) => ErrorKind::Protocol,
            ObeliskError::Response(_) => ErrorKind::Response,
            ObeliskError::Validation(_) => ErrorKind::Validation,
        }
    }

    /// Returns true if the error may go away by re-issuing the request.
    ///
    /// Only transient faults are handed to a retry policy; everything else
    /// fails the operation immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ObeliskError::Transient(_))
    }

    /// Returns true for the 401 response that triggers a token refresh.
    pub fn is_auth_expiry(&self) -> bool {
        matches!(self, ObeliskError::Client(ClientError::Unauthorized { .. }))
    }

    /// Returns the HTTP status code if one was involved.
    pub fn status_code(&self) -> Option<StatusCode> {
        let status = match self {
            ObeliskError::Authentication(AuthenticationError::Rejected { status, .. }) => *status,
            ObeliskError::Transient(TransientError::Server { status, .. }) => *status,
            ObeliskError::Client(ClientError::Rejected { status, .. }) => *status,
            ObeliskError::Client(ClientError::Unauthorized { .. }) => 401,
            ObeliskError::Client(ClientError::NotFound { .. }) => 404,
            ObeliskError::Response(ResponseError::UnexpectedStatus { status, .. }) => *status,
            _ => return None,
        };
        StatusCode::from_u16(status).ok()
    }

    /// Returns the number of attempts made before a transient error surfaced.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            ObeliskError::Transient(err) => Some(err.attempts()),
            _ => None,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Missing credentials.
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The operation does not exist on the configured deployment.
    #[error("{operation} is not available on {kind} deployments")]
    UnsupportedKind {
        /// Operation that was attempted.
        operation: &'static str,
        /// Configured deployment kind.
        kind: String,
    },

    /// Blocking runtime could not be created.
    #[error("Failed to create runtime: {0}")]
    Runtime(String),
}

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthenticationError {
    /// The token endpoint refused the credentials.
    #[error("Credential exchange rejected with status {status}: {message}")]
    Rejected {
        /// HTTP status returned by the token endpoint.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// The token endpoint answered with something that is not a token.
    #[error("Malformed token response: {0}")]
    MalformedResponse(String),

    /// Credentials cannot be encoded into a request.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),
}

/// Retriable faults.
#[derive(Debug, Error)]
pub enum TransientError {
    /// The server answered with a retriable status (408, 429, 5xx).
    #[error("HTTP {status} after {attempts} attempt(s): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
        /// Attempts made, including the first.
        attempts: u32,
    },

    /// The request timed out.
    #[error("Request timeout after {attempts} attempt(s): {message}")]
    Timeout {
        /// Underlying cause.
        message: String,
        /// Attempts made, including the first.
        attempts: u32,
    },

    /// Connection or I/O failure.
    #[error("Network failure after {attempts} attempt(s): {message}")]
    Network {
        /// Underlying cause.
        message: String,
        /// Attempts made, including the first.
        attempts: u32,
    },
}

impl TransientError {
    /// Attempts made before this error was raised.
    pub fn attempts(&self) -> u32 {
        match self {
            TransientError::Server { attempts, .. }
            | TransientError::Timeout { attempts, .. }
            | TransientError::Network { attempts, .. } => *attempts,
        }
    }

    /// Returns the same error stamped with a new attempt count.
    pub fn with_attempts(self, attempts: u32) -> Self {
        match self {
            TransientError::Server {
                status, message, ..
            } => TransientError::Server {
                status,
                message,
                attempts,
            },
            TransientError::Timeout { message, .. } => TransientError::Timeout { message, attempts },
            TransientError::Network { message, .. } => TransientError::Network { message, attempts },
        }
    }
}

/// Non-retriable request rejections.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Generic 4xx rejection.
    #[error("Request rejected with status {status}: {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// The resource does not exist.
    #[error("Not found: {message}")]
    NotFound {
        /// Response body or reason.
        message: String,
    },

    /// The bearer token was refused.
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Response body or reason.
        message: String,
    },

    /// The request could not be built.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Paging contract violations.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A page announced more data but came back short.
    #[error(
        "Inconsistent page: requested {requested} items, received {received}, but a cursor was returned"
    )]
    InconsistentPage {
        /// Page size sent to the server.
        requested: usize,
        /// Items actually received.
        received: usize,
        /// Continuation cursor the server returned.
        cursor: String,
    },
}

/// Response errors.
#[derive(Debug, Error)]
pub enum ResponseError {
    /// Deserialization error.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// A success status other than the one the endpoint documents.
    #[error("Unexpected status {status}: {message}")]
    UnexpectedStatus {
        /// HTTP status code.
        status: u16,
        /// Response body.
        message: String,
    },
}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Metric name is not of the form `name::type`.
    #[error("Invalid metric '{0}': expected exactly one '::' type qualifier")]
    InvalidMetric(String),

    /// Unknown type suffix.
    #[error("Unknown type suffix '{0}'")]
    UnknownDataType(String),

    /// Value does not match the metric's type suffix.
    #[error("Type suffix mismatch for '{metric}': expected {expected}")]
    TypeMismatch {
        /// Metric name.
        metric: String,
        /// Expected data type.
        expected: String,
    },

    /// A `value` field is requested without a data type.
    #[error("Value field requested, a data type must be specified")]
    MissingDataType,

    /// Invalid parameter.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network error.
    #[error("Network error: {0}")]
    Network(String),

    /// Timeout error.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The request could not be constructed.
    #[error("Request error: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_builder() {
            TransportError::Request(err.to_string())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

impl From<TransportError> for ObeliskError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout(message) => {
                ObeliskError::Transient(TransientError::Timeout {
                    message,
                    attempts: 1,
                })
            }
            TransportError::Network(message) => {
                ObeliskError::Transient(TransientError::Network {
                    message,
                    attempts: 1,
                })
            }
            TransportError::Request(msg) => ObeliskError::Client(ClientError::InvalidRequest(msg)),
        }
    }
}
