//! Error types for request execution.
//!
//! Every failure a call can produce maps to exactly one [`Error`] variant, so callers
//! can always tell a transport problem ("the network failed") from a server refusal
//! ("the server said no", [`Error::Api`]) from an unusable success body ("the server
//! said yes but the body could not be decoded", [`Error::DeserializationFailed`]).

use bytes::Bytes;
use http::StatusCode;
use std::fmt;

/// Boxed error produced by middleware steps.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The main error type for request execution.
///
/// # Examples
///
/// ```no_run
/// use callpipe::{Client, Error};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")
///     .build()?;
///
/// match client.get("/endpoint").send::<serde_json::Value>().await {
///     Ok(response) => println!("Success: {:?}", response.data),
///     Err(Error::Api(api)) if api.is_not_found() => eprintln!("missing: {}", api.message),
///     Err(Error::DeserializationFailed { raw_response, serde_error, .. }) => {
///         eprintln!("Failed to deserialize. Raw response: {}", raw_response);
///         eprintln!("Serde error: {}", serde_error);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A network-level error occurred (connection failed, DNS lookup failed, etc.).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The transport gave up waiting for the exchange.
    #[error("Request timed out")]
    Timeout,

    /// The caller's cancellation token fired while the call was waiting.
    ///
    /// Distinct from [`Error::Timeout`] and [`Error::MaxRetriesExceeded`] so callers can
    /// tell "we gave up" apart from "we were told to stop".
    #[error("Request cancelled")]
    Cancelled,

    /// The server answered with a status outside `200..300`.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The server reported success but the body could not be decoded into the
    /// destination type.
    #[error("Failed to deserialize response (status {status}): {serde_error}")]
    DeserializationFailed {
        /// The raw response body that failed to deserialize
        raw_response: String,
        /// The serde error message
        serde_error: String,
        /// The HTTP status code
        status: StatusCode,
    },

    /// Failed to serialize the request body.
    #[error("Failed to serialize request: {0}")]
    SerializationFailed(String),

    /// Invalid configuration or request assembly (bad header, unreplayable body, ...).
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The joined address is not a valid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A request middleware step refused the request. Nothing was sent.
    #[error("Request middleware error: {0}")]
    RequestMiddleware(#[source] BoxError),

    /// A response middleware step failed after the body was buffered.
    #[error("Response middleware error (status {status}): {source}")]
    ResponseMiddleware {
        /// The HTTP status code of the response
        status: StatusCode,
        /// The buffered response body
        body: Bytes,
        /// The fault returned by the step
        #[source]
        source: BoxError,
    },

    /// The response body could not be read.
    #[error("Failed to read response body: {0}")]
    BodyRead(#[source] reqwest::Error),

    /// Every allowed attempt failed at the transport level.
    #[error("Request failed after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded {
        /// The number of attempts made
        attempts: usize,
        /// The transport fault from the final attempt
        last_error: Box<Error>,
    },
}

impl Error {
    /// Returns `true` if this error is potentially retryable.
    ///
    /// Network errors and timeouts are retryable, as are [`Error::Api`] values carrying a
    /// 5xx or 429 status. Cancellation, build faults and decode faults are not.
    ///
    /// # Examples
    ///
    /// ```
    /// use callpipe::{ApiError, Error};
    /// use http::StatusCode;
    ///
    /// let err = Error::Api(ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "down", ""));
    /// assert!(err.is_retryable());
    ///
    /// let err = Error::Api(ApiError::new(StatusCode::BAD_REQUEST, "bad", ""));
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(_) | Error::Timeout => true,
            Error::Api(api) => {
                api.status.is_server_error() || api.status == StatusCode::TOO_MANY_REQUESTS
            }
            Error::Cancelled
            | Error::DeserializationFailed { .. }
            | Error::SerializationFailed(_)
            | Error::ConfigurationError(_)
            | Error::InvalidUrl(_)
            | Error::RequestMiddleware(_)
            | Error::ResponseMiddleware { .. }
            | Error::BodyRead(_)
            | Error::MaxRetriesExceeded { .. } => false,
        }
    }

    /// Returns `true` if the call stopped because its cancellation token fired.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Api(api) => Some(api.status),
            Error::DeserializationFailed { status, .. } => Some(*status),
            Error::ResponseMiddleware { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&[u8]> {
        match self {
            Error::Api(api) => Some(&api.body),
            Error::DeserializationFailed { raw_response, .. } => Some(raw_response.as_bytes()),
            Error::ResponseMiddleware { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Returns the structured API error, if the server rejected the request.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Error::Api(api) => Some(api),
            _ => None,
        }
    }
}

/// A terminal non-2xx response, classified.
///
/// Built once by the error classifier and never mutated. The raw body is always kept,
/// whichever field the message was taken from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// The HTTP status code.
    pub status: StatusCode,
    /// Human-readable message extracted from the body.
    pub message: String,
    /// The raw response body.
    pub body: Bytes,
}

impl ApiError {
    /// Creates a new `ApiError`.
    pub fn new(status: StatusCode, message: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            message: message.into(),
            body: body.into(),
        }
    }

    /// `404 Not Found`
    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND
    }

    /// `401 Unauthorized`
    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
    }

    /// `403 Forbidden`
    pub fn is_forbidden(&self) -> bool {
        self.status == StatusCode::FORBIDDEN
    }

    /// Any status in `400..500`.
    pub fn is_client_error(&self) -> bool {
        self.status.is_client_error()
    }

    /// Any status in `500..600`.
    pub fn is_server_error(&self) -> bool {
        self.status.is_server_error()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}: {}", self.status.as_u16(), self.message)
    }
}

impl std::error::Error for ApiError {}

/// A specialized `Result` type for request execution.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_predicates() {
        let err = ApiError::new(StatusCode::NOT_FOUND, "missing", "");
        assert!(err.is_not_found());
        assert!(err.is_client_error());
        assert!(!err.is_server_error());
        assert!(!err.is_unauthorized());
        assert!(!err.is_forbidden());
    }

    #[test]
    fn test_service_unavailable_predicates() {
        let err = ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "down", "");
        assert!(err.is_server_error());
        assert!(!err.is_not_found());
        assert!(!err.is_client_error());
        assert!(!err.is_unauthorized());
        assert!(!err.is_forbidden());
    }

    #[test]
    fn test_auth_predicates() {
        assert!(ApiError::new(StatusCode::UNAUTHORIZED, "", "").is_unauthorized());
        assert!(ApiError::new(StatusCode::FORBIDDEN, "", "").is_forbidden());
    }

    #[test]
    fn test_display() {
        let err = ApiError::new(StatusCode::NOT_FOUND, "user not found", "{}");
        assert_eq!(err.to_string(), "HTTP 404: user not found");
        assert_eq!(Error::Api(err).to_string(), "HTTP 404: user not found");
    }

    #[test]
    fn test_error_accessors() {
        let err = Error::Api(ApiError::new(StatusCode::CONFLICT, "taken", "raw"));
        assert_eq!(err.status(), Some(StatusCode::CONFLICT));
        assert_eq!(err.raw_response(), Some(&b"raw"[..]));
        assert!(err.api_error().is_some());

        assert_eq!(Error::Cancelled.status(), None);
        assert!(Error::Cancelled.is_cancelled());
        assert!(!Error::Cancelled.is_retryable());
        assert!(Error::Timeout.is_retryable());
    }
}
