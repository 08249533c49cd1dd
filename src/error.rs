//! Error types for introspection service calls.
//!
//! Every failure the client can surface is a variant of [`Error`]. Only one
//! of them, an [`Error::Unauthorized`] caused by an expired token, is ever
//! recovered locally; everything else reaches the caller unchanged, with the
//! raw response body and status preserved when there is one.

use http::{HeaderMap, StatusCode};
use std::path::PathBuf;

/// Body the identity service sends back when the credentials themselves are
/// wrong rather than merely expired.
pub const BAD_CREDENTIALS_MARKER: &str = "Bad username or password";

/// Why a request was rejected with `401 Unauthorized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnauthorizedReason {
    /// The response body matched [`BAD_CREDENTIALS_MARKER`].
    BadCredentials,
    /// Any other 401; the token is assumed to have expired.
    TokenExpired,
}

impl UnauthorizedReason {
    /// Classifies a 401 response body.
    ///
    /// Only an exact match on [`BAD_CREDENTIALS_MARKER`] counts as a
    /// credential failure.
    ///
    /// # Examples
    ///
    /// ```
    /// use inspector_client::error::UnauthorizedReason;
    ///
    /// assert_eq!(
    ///     UnauthorizedReason::from_body("Bad username or password"),
    ///     UnauthorizedReason::BadCredentials
    /// );
    /// assert_eq!(
    ///     UnauthorizedReason::from_body("token expired"),
    ///     UnauthorizedReason::TokenExpired
    /// );
    /// ```
    pub fn from_body(body: &str) -> Self {
        if body == BAD_CREDENTIALS_MARKER {
            UnauthorizedReason::BadCredentials
        } else {
            UnauthorizedReason::TokenExpired
        }
    }
}

impl std::fmt::Display for UnauthorizedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnauthorizedReason::BadCredentials => f.write_str("bad credentials"),
            UnauthorizedReason::TokenExpired => f.write_str("token expired"),
        }
    }
}

/// The main error type for introspection service calls.
///
/// # Examples
///
/// ```no_run
/// use inspector_client::{Client, ClientConfig, Error, IntrospectionService};
///
/// # async fn example(config: ClientConfig) -> Result<(), Error> {
/// let mut client = Client::connect(config).await?;
///
/// match client.get_introspection("node-1").await {
///     Ok(response) => println!("Job: {:?}", response.data),
///     Err(Error::NotFound { raw_response, .. }) => {
///         eprintln!("No introspection for node-1: {}", raw_response);
///     }
///     Err(Error::Unauthorized { reason, .. }) => eprintln!("Rejected: {}", reason),
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The identity backend rejected the credentials outright.
    ///
    /// Raised while establishing or refreshing a session. Never retried.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The service answered `401 Unauthorized`.
    ///
    /// A [`UnauthorizedReason::TokenExpired`] rejection is retried once after
    /// reauthenticating; this variant only escapes for bad credentials or
    /// when the retried attempt is rejected again.
    #[error("Unauthorized ({reason}): {raw_response}")]
    Unauthorized {
        /// How the rejection was classified
        reason: UnauthorizedReason,
        /// The raw response body
        raw_response: String,
    },

    /// The service answered `404 Not Found`.
    #[error("Not found: {raw_response}")]
    NotFound {
        /// The HTTP status code
        status: StatusCode,
        /// The raw response body
        raw_response: String,
        /// The response headers
        headers: HeaderMap,
    },

    /// None of the API versions advertised by the service matches the
    /// supported-version pattern.
    #[error("No supported API version matching '{pattern}' (advertised: {advertised:?})")]
    UnsupportedVersion {
        /// The supported-version pattern
        pattern: String,
        /// Version identifiers the service advertised
        advertised: Vec<String>,
    },

    /// A network-level error occurred (connection failed, DNS lookup failed, etc.).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The request timed out.
    #[error("Request timed out")]
    Timeout,

    /// The response body was present but could not be decoded.
    ///
    /// # Fields
    ///
    /// * `raw_response` - The raw response body as a string
    /// * `serde_error` - The error message from serde
    /// * `status` - The HTTP status code of the response
    #[error("Failed to deserialize response (status {status}): {serde_error}")]
    DeserializationFailed {
        /// The raw response body that failed to deserialize
        raw_response: String,
        /// The serde error message
        serde_error: String,
        /// The HTTP status code
        status: StatusCode,
    },

    /// Any other failing HTTP status.
    #[error("HTTP error {status}: {raw_response}")]
    HttpError {
        /// The HTTP status code
        status: StatusCode,
        /// The raw response body
        raw_response: String,
        /// The response headers
        headers: HeaderMap,
    },

    /// Invalid configuration was provided.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Failed to serialize the request body.
    #[error("Failed to serialize request: {0}")]
    SerializationFailed(String),

    /// An invalid URL was provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The mock backend could not read or parse its fixture.
    #[error("Failed to load fixture {}: {message}", path.display())]
    Fixture {
        /// Location of the fixture document
        path: PathBuf,
        /// What went wrong
        message: String,
    },
}

impl Error {
    /// Maps a failing HTTP status to its error variant.
    ///
    /// 401 becomes [`Error::Unauthorized`], 404 becomes [`Error::NotFound`]
    /// and everything else an [`Error::HttpError`].
    pub fn from_status(status: StatusCode, raw_response: String, headers: HeaderMap) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => Error::Unauthorized {
                reason: UnauthorizedReason::from_body(&raw_response),
                raw_response,
            },
            StatusCode::NOT_FOUND => Error::NotFound {
                status,
                raw_response,
                headers,
            },
            _ => Error::HttpError {
                status,
                raw_response,
                headers,
            },
        }
    }

    /// Wraps a transport error, separating out timeouts.
    pub(crate) fn transport(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Error::Timeout
        } else {
            Error::Network(error)
        }
    }

    /// Returns `true` for a 401 that should trigger reauthentication.
    pub fn is_token_expired(&self) -> bool {
        matches!(
            self,
            Error::Unauthorized {
                reason: UnauthorizedReason::TokenExpired,
                ..
            }
        )
    }

    /// Returns `true` if this is a [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Unauthorized { .. } => Some(StatusCode::UNAUTHORIZED),
            Error::NotFound { status, .. } => Some(*status),
            Error::HttpError { status, .. } => Some(*status),
            Error::DeserializationFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::Unauthorized { raw_response, .. } => Some(raw_response),
            Error::NotFound { raw_response, .. } => Some(raw_response),
            Error::HttpError { raw_response, .. } => Some(raw_response),
            Error::DeserializationFailed { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }
}

/// A specialized `Result` type for introspection service calls.
pub type Result<T> = std::result::Result<T, Error>;
