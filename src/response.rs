//! Response wrapper that preserves both decoded data and raw response details.
//!
//! Service responses are JSON documents whose shape belongs to the caller, so
//! the client hands back a [`Response<Body>`]: the decoded document, or
//! `None` when the service sent an empty body. [`Response::decode`] turns it
//! into a typed response when the caller knows the shape.

use crate::{Error, Result};
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// A decoded response body; `None` when the body was empty.
pub type Body = Option<serde_json::Value>;

/// A successful response from the service.
///
/// # Examples
///
/// ```no_run
/// use inspector_client::{Client, ClientConfig, IntrospectionService};
///
/// # async fn example(config: ClientConfig) -> Result<(), inspector_client::Error> {
/// let mut client = Client::connect(config).await?;
/// let response = client.list_rules().await?;
///
/// println!("Rules: {:?}", response.data);
/// println!("Request took {:?}", response.latency);
/// if response.was_retried() {
///     println!("Token was refreshed along the way");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The decoded response data.
    pub data: T,

    /// The raw response body as a string.
    pub raw_body: String,

    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// The total latency of the request, including reauthentication.
    pub latency: Duration,

    /// The number of attempts made: `1`, or `2` after a token refresh.
    pub attempts: usize,
}

impl<T> Response<T> {
    /// Creates a new `Response`.
    pub fn new(
        data: T,
        raw_body: String,
        status: StatusCode,
        headers: HeaderMap,
        latency: Duration,
        attempts: usize,
    ) -> Self {
        Self {
            data,
            raw_body,
            status,
            headers,
            latency,
            attempts,
        }
    }

    /// Maps the response data to a different type using the provided function.
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: f(self.data),
            raw_body: self.raw_body,
            status: self.status,
            headers: self.headers,
            latency: self.latency,
            attempts: self.attempts,
        }
    }

    /// Returns `true` if the request had to be sent a second time.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a reference to a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}

impl Response<Body> {
    /// Decodes the body into `T`.
    ///
    /// An empty body is decoded as JSON `null`, so `Option<T>` targets accept it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeserializationFailed`] if the document doesn't fit `T`.
    ///
    /// # Examples
    ///
    /// ```
    /// use inspector_client::Response;
    /// use http::{HeaderMap, StatusCode};
    /// use serde::Deserialize;
    /// use std::time::Duration;
    ///
    /// #[derive(Deserialize)]
    /// struct Job { finished: bool }
    ///
    /// let response = Response::new(
    ///     Some(serde_json::json!({"finished": true})),
    ///     r#"{"finished": true}"#.to_string(),
    ///     StatusCode::OK,
    ///     HeaderMap::new(),
    ///     Duration::from_millis(3),
    ///     1,
    /// );
    ///
    /// let job = response.decode::<Job>().unwrap();
    /// assert!(job.data.finished);
    /// ```
    pub fn decode<T>(self) -> Result<Response<T>>
    where
        T: DeserializeOwned,
    {
        let value = self.data.clone().unwrap_or(serde_json::Value::Null);
        match serde_json::from_value::<T>(value) {
            Ok(data) => Ok(self.map(|_| data)),
            Err(e) => Err(Error::DeserializationFailed {
                raw_response: self.raw_body,
                serde_error: e.to_string(),
                status: self.status,
            }),
        }
    }
}

impl<T> AsRef<T> for Response<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}

impl<T> std::ops::Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

/// Decodes a raw body the way the service contract requires: empty bodies pass
/// through as `None`, anything else must be JSON.
pub(crate) fn decode_body(raw_body: &str, status: StatusCode) -> Result<Body> {
    if raw_body.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(raw_body)
        .map(Some)
        .map_err(|e| {
            tracing::error!(
                error = %e,
                raw_response = %raw_body,
                "Failed to deserialize response"
            );
            Error::DeserializationFailed {
                raw_response: raw_body.to_string(),
                serde_error: e.to_string(),
                status,
            }
        })
}
