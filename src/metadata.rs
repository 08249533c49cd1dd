//! Request metadata and the header/path helpers shared by the real and mock
//! clients.

use http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use std::collections::HashMap;

/// Header carrying the bearer token.
pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";

/// Metadata for a single logical request against the service.
///
/// The path is relative to the negotiated API prefix, so `introspection/abc`
/// is sent as `/v1/introspection/abc`.
#[derive(Debug, Clone)]
pub struct RequestMetadata {
    /// The HTTP method (GET, POST, etc.).
    pub method: Method,

    /// The request path, relative to the API prefix.
    pub path: String,

    /// Headers added to, or overriding, the defaults.
    pub headers: HeaderMap,

    /// Query parameters for this request.
    pub query_params: HashMap<String, String>,

    /// Statuses that count as success. Empty means any 2xx or 3xx.
    pub expects: Vec<StatusCode>,
}

impl RequestMetadata {
    /// Creates a new `RequestMetadata` with the given method and path.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            query_params: HashMap::new(),
            expects: Vec::new(),
        }
    }

    /// Adds a header to the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(
        mut self,
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> Result<Self, crate::Error> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| crate::Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| crate::Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Adds a query parameter to the request.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(key.into(), value.into());
        self
    }

    /// Restricts the statuses treated as success.
    pub fn expecting(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.expects = statuses
            .into_iter()
            .filter_map(|code| StatusCode::from_u16(code).ok())
            .collect();
        self
    }

    /// Returns `true` if `status` counts as a successful response.
    ///
    /// # Examples
    ///
    /// ```
    /// use inspector_client::metadata::RequestMetadata;
    /// use http::{Method, StatusCode};
    ///
    /// let any = RequestMetadata::new(Method::GET, "rules");
    /// assert!(any.accepts(StatusCode::OK));
    /// assert!(any.accepts(StatusCode::MULTIPLE_CHOICES));
    /// assert!(!any.accepts(StatusCode::NOT_FOUND));
    ///
    /// let strict = RequestMetadata::new(Method::DELETE, "rules").expecting([204]);
    /// assert!(!strict.accepts(StatusCode::OK));
    /// ```
    pub fn accepts(&self, status: StatusCode) -> bool {
        let success = status.is_success() || status.is_redirection();
        success && (self.expects.is_empty() || self.expects.contains(&status))
    }
}

impl Default for RequestMetadata {
    fn default() -> Self {
        Self::new(Method::GET, "")
    }
}

/// Headers every request carries: JSON content type and the auth token.
///
/// # Errors
///
/// Returns an error if the token is not a valid header value.
pub fn default_headers(auth_token: &str) -> Result<HeaderMap, crate::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    let token = HeaderValue::try_from(auth_token)
        .map_err(|e| crate::Error::ConfigurationError(format!("Invalid auth token: {}", e)))?;
    headers.insert(HeaderName::from_static(AUTH_TOKEN_HEADER), token);
    Ok(headers)
}

/// Merges `overrides` on top of `base`; a header present in both takes the
/// value from `overrides`.
pub fn merge_headers(mut base: HeaderMap, overrides: &HeaderMap) -> HeaderMap {
    for name in overrides.keys() {
        base.remove(name);
    }
    for (name, value) in overrides {
        base.append(name, value.clone());
    }
    base
}

/// Joins the API prefix and a relative path with exactly one `/` between them.
///
/// # Examples
///
/// ```
/// use inspector_client::metadata::join_path;
///
/// assert_eq!(join_path("/v1", "introspection/abc"), "/v1/introspection/abc");
/// assert_eq!(join_path("/v1/", "/rules"), "/v1/rules");
/// ```
pub fn join_path(prefix: &str, relative: &str) -> String {
    format!(
        "{}/{}",
        prefix.trim_end_matches('/'),
        relative.trim_start_matches('/')
    )
}
