//! Request dispatching: one logical request, at most one token refresh.
//!
//! [`Dispatcher`] owns the transport and the current [`Session`]. It sends a
//! request, classifies the failure if there is one, and recovers from exactly
//! one case: a `401` whose body is not the bad-credentials marker. Then it
//! asks the identity backend for a fresh session, replaces the old one
//! wholesale, and sends the identical request a second and last time.

use crate::{
    identity::{AuthRequest, IdentityBackend, Session},
    metadata::{default_headers, join_path, merge_headers, RequestMetadata},
    response::{decode_body, Body},
    Error, Response, Result,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Upper bound on sends per logical request: the original and one retry.
pub const MAX_ATTEMPTS: usize = 2;

/// Sends requests for one client.
///
/// Requests take `&mut self`: a dispatcher serves one request at a time, so
/// a token refresh can never race with another request using the old token.
pub struct Dispatcher {
    http_client: reqwest::Client,
    base_url: Url,
    path_prefix: String,
    session: Session,
    identity: Arc<dyn IdentityBackend>,
    auth_request: AuthRequest,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("base_url", &self.base_url.as_str())
            .field("path_prefix", &self.path_prefix)
            .field("expires_at", &self.session.expires_at)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Creates a dispatcher sending to the scheme, host and port of the
    /// session's management URL, under `path_prefix`.
    pub fn new(
        http_client: reqwest::Client,
        session: Session,
        path_prefix: String,
        identity: Arc<dyn IdentityBackend>,
        auth_request: AuthRequest,
    ) -> Self {
        let mut base_url = session.management_url.clone();
        base_url.set_path("/");
        base_url.set_query(None);
        base_url.set_fragment(None);

        Self {
            http_client,
            base_url,
            path_prefix,
            session,
            identity,
            auth_request,
        }
    }

    /// The current session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The negotiated path prefix, e.g. `/v1`.
    pub fn path_prefix(&self) -> &str {
        &self.path_prefix
    }

    /// Sends a request, refreshing the token once if it has expired.
    ///
    /// # Errors
    ///
    /// * [`Error::Unauthorized`] for bad credentials, or when the retried
    ///   attempt is rejected too
    /// * [`Error::NotFound`] for a 404
    /// * [`Error::HttpError`] for any other failing status
    /// * [`Error::DeserializationFailed`] for a non-JSON body
    /// * whatever the identity backend returns if reauthentication fails
    pub async fn request(
        &mut self,
        metadata: &RequestMetadata,
        body: Option<&serde_json::Value>,
    ) -> Result<Response<Body>> {
        let start_time = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let result = match self.send_once(metadata, body, attempt).await {
                Ok(response) => {
                    let latency = start_time.elapsed();
                    self.parse_response(metadata, response, latency, attempt).await
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(response) => return Ok(response),
                Err(e) if e.is_token_expired() && attempt < MAX_ATTEMPTS => {
                    tracing::warn!(
                        attempt = attempt,
                        method = %metadata.method,
                        path = %metadata.path,
                        "Token rejected - reauthenticating"
                    );
                    self.session = self.reauthenticate().await?;
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        attempt = attempt,
                        method = %metadata.method,
                        path = %metadata.path,
                        "Request failed"
                    );
                    return Err(e);
                }
            }
        }
    }

    /// Obtains a fresh session from the identity backend.
    ///
    /// Does not touch the current session; the caller swaps it in.
    pub async fn reauthenticate(&self) -> Result<Session> {
        let request = self.auth_request.reauthenticating();
        let session = self.identity.authenticate(&request).await?;
        tracing::info!(expires_at = ?session.expires_at, "Reauthenticated");
        Ok(session)
    }

    /// Builds the full URL for `metadata`.
    fn url_for(&self, metadata: &RequestMetadata) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(&join_path(&self.path_prefix, &metadata.path));
        for (key, value) in &metadata.query_params {
            url.query_pairs_mut().append_pair(key, value);
        }
        url
    }

    /// Executes a single request attempt.
    async fn send_once(
        &self,
        metadata: &RequestMetadata,
        body: Option<&serde_json::Value>,
        attempt: usize,
    ) -> Result<reqwest::Response> {
        let url = self.url_for(metadata);

        tracing::debug!(
            method = %metadata.method,
            url = %url,
            attempt = attempt,
            "Executing HTTP request"
        );

        let headers = merge_headers(default_headers(&self.session.auth_token)?, &metadata.headers);
        let mut request = self
            .http_client
            .request(metadata.method.clone(), url)
            .headers(headers);

        if let Some(body) = body {
            let json = serde_json::to_vec(body).map_err(|e| Error::SerializationFailed(e.to_string()))?;
            request = request.body(json);
        }

        request.send().await.map_err(Error::transport)
    }

    /// Classifies the status and decodes the body.
    async fn parse_response(
        &self,
        metadata: &RequestMetadata,
        response: reqwest::Response,
        latency: Duration,
        attempts: usize,
    ) -> Result<Response<Body>> {
        let status = response.status();
        let headers = response.headers().clone();

        tracing::info!(
            status = status.as_u16(),
            latency_ms = latency.as_millis(),
            attempts = attempts,
            "Received HTTP response"
        );

        if !metadata.accepts(status) {
            let raw_response = response.text().await.unwrap_or_default();

            if status.is_client_error() {
                tracing::error!(
                    status = status.as_u16(),
                    response = %raw_response,
                    "Client error (4xx)"
                );
            } else if status.is_server_error() {
                tracing::warn!(
                    status = status.as_u16(),
                    response = %raw_response,
                    "Server error (5xx)"
                );
            }

            return Err(Error::from_status(status, raw_response, headers));
        }

        let raw_body = response.text().await.map_err(Error::transport)?;
        let data = decode_body(&raw_body, status)?;
        Ok(Response::new(data, raw_body, status, headers, latency, attempts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::ClientConfig, identity::IdentityInfo};
    use async_trait::async_trait;
    use http::Method;

    struct NoIdentity;

    #[async_trait]
    impl IdentityBackend for NoIdentity {
        async fn authenticate(&self, _request: &AuthRequest) -> Result<Session> {
            Err(Error::Authentication("no identity".into()))
        }
    }

    fn dispatcher(management_url: &str, prefix: &str) -> Dispatcher {
        let session = Session {
            auth_token: "tok".into(),
            expires_at: None,
            management_url: Url::parse(management_url).unwrap(),
            region: None,
            endpoint_type: "public".into(),
            service: None,
            identity: IdentityInfo::default(),
        };
        Dispatcher::new(
            reqwest::Client::new(),
            session,
            prefix.to_string(),
            Arc::new(NoIdentity),
            AuthRequest::new(ClientConfig::default()),
        )
    }

    #[test]
    fn test_url_for_joins_prefix_and_keeps_authority() {
        let dispatcher = dispatcher("https://inspector.example.com:5050/ignored?x=1", "/v1");
        let url = dispatcher.url_for(&RequestMetadata::new(Method::GET, "introspection/abc"));
        assert_eq!(url.as_str(), "https://inspector.example.com:5050/v1/introspection/abc");
    }

    #[test]
    fn test_url_for_appends_query() {
        let dispatcher = dispatcher("http://inspector:5050", "/v1");
        let metadata = RequestMetadata::new(Method::GET, "introspection").with_query_param("limit", "5");
        assert_eq!(
            dispatcher.url_for(&metadata).as_str(),
            "http://inspector:5050/v1/introspection?limit=5"
        );
    }

    #[tokio::test]
    async fn test_reauthenticate_leaves_session_untouched_on_failure() {
        let dispatcher = dispatcher("http://inspector:5050", "/v1");
        assert!(matches!(
            dispatcher.reauthenticate().await,
            Err(Error::Authentication(_))
        ));
        assert_eq!(dispatcher.session().auth_token, "tok");
        assert_eq!(dispatcher.path_prefix(), "/v1");
    }
}
