//! Identity sessions.
//!
//! The client never looks inside a token. It asks an [`IdentityBackend`] for
//! a [`Session`] (token, advisory expiration, management URL) and trusts what
//! comes back. [`KeystoneIdentity`] is the backend used by default; tests and
//! embedders can plug in their own.

use crate::{
    config::ClientConfig,
    metadata::join_path,
    response::decode_body,
    Error, Result,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::{header, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

/// Header in which Keystone returns the issued token.
const SUBJECT_TOKEN_HEADER: &str = "x-subject-token";

/// Who a session belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityInfo {
    /// User id.
    pub user_id: Option<String>,
    /// User name.
    pub user_name: Option<String>,
    /// Project id.
    pub project_id: Option<String>,
    /// Project name.
    pub project_name: Option<String>,
}

/// The catalog entry the management URL was taken from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogService {
    /// Service type, e.g. `baremetal-introspection`.
    pub service_type: String,
    /// Service name, e.g. `ironic-inspector`.
    pub name: Option<String>,
    /// Service id.
    pub id: Option<String>,
}

/// An authenticated context.
///
/// A session is only ever replaced as a whole; the client never patches
/// individual fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Opaque bearer token.
    pub auth_token: String,
    /// When the identity service says the token expires. Advisory only.
    pub expires_at: Option<DateTime<Utc>>,
    /// Base endpoint of the introspection service.
    pub management_url: Url,
    /// Region the endpoint was selected from.
    pub region: Option<String>,
    /// Interface the endpoint was selected for.
    pub endpoint_type: String,
    /// Catalog entry of the service, when a catalog was consulted.
    pub service: Option<CatalogService>,
    /// Identity the token was issued to.
    pub identity: IdentityInfo,
}

impl Session {
    /// Returns `true` if the advertised expiration has passed.
    ///
    /// The client doesn't act on this; the service decides when a token is
    /// no longer valid.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// Input to [`IdentityBackend::authenticate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    /// Credentials, scope and catalog selectors.
    pub config: ClientConfig,
    /// Set when the current token was rejected; a cached or pre-supplied
    /// token must not be reused.
    pub must_reauthenticate: bool,
}

impl AuthRequest {
    /// Creates a request for the initial authentication.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            must_reauthenticate: false,
        }
    }

    /// The same request, flagged as a forced reauthentication.
    pub fn reauthenticating(&self) -> Self {
        Self {
            config: self.config.clone(),
            must_reauthenticate: true,
        }
    }

    /// Session from a pre-supplied token and management URL, if the request
    /// allows skipping the identity service.
    ///
    /// # Errors
    ///
    /// Returns an error if the management URL doesn't parse.
    pub fn presupplied_session(&self) -> Result<Option<Session>> {
        if self.must_reauthenticate {
            return Ok(None);
        }
        let config = &self.config;
        let (Some(token), Some(management_url)) = (&config.auth_token, &config.management_url)
        else {
            return Ok(None);
        };
        Ok(Some(Session {
            auth_token: token.clone(),
            expires_at: None,
            management_url: Url::parse(management_url)?,
            region: config.region.clone(),
            endpoint_type: config.effective_endpoint_type(),
            service: None,
            identity: IdentityInfo {
                user_name: config.username.clone(),
                project_id: config.effective_project_id().map(str::to_string),
                project_name: config.effective_project_name().map(str::to_string),
                ..Default::default()
            },
        }))
    }
}

/// Something that can turn credentials into a [`Session`].
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use inspector_client::identity::{AuthRequest, IdentityBackend, IdentityInfo, Session};
/// use url::Url;
///
/// struct FixedToken;
///
/// #[async_trait]
/// impl IdentityBackend for FixedToken {
///     async fn authenticate(&self, request: &AuthRequest) -> inspector_client::Result<Session> {
///         Ok(Session {
///             auth_token: "fixed".to_string(),
///             expires_at: None,
///             management_url: Url::parse("http://localhost:5050/v1")?,
///             region: request.config.region.clone(),
///             endpoint_type: request.config.effective_endpoint_type(),
///             service: None,
///             identity: IdentityInfo::default(),
///         })
///     }
/// }
/// ```
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    /// Authenticates and returns a complete session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authentication`] when the credentials are rejected.
    async fn authenticate(&self, request: &AuthRequest) -> Result<Session>;
}

/// Identity backend speaking the Keystone v3 token API.
#[derive(Debug, Clone)]
pub struct KeystoneIdentity {
    http_client: reqwest::Client,
}

impl KeystoneIdentity {
    /// Creates a backend that talks to Keystone through `http_client`.
    pub fn new(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    async fn issue_token(&self, request: &AuthRequest) -> Result<Session> {
        let config = &request.config;
        let auth_url = config
            .auth_url
            .as_deref()
            .ok_or_else(|| Error::ConfigurationError("auth_url is required".to_string()))?;
        let url = tokens_url(auth_url)?;
        let body = token_request_body(request)?;

        tracing::debug!(url = %url, reauthenticate = request.must_reauthenticate, "Requesting identity token");

        let response = self
            .http_client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(Error::transport)?;

        let status = response.status();
        let headers = response.headers().clone();
        let raw_body = response.text().await.map_err(Error::transport)?;

        if status == StatusCode::UNAUTHORIZED {
            tracing::error!(status = status.as_u16(), "Identity service rejected credentials");
            return Err(Error::Authentication(raw_body));
        }
        if !status.is_success() {
            return Err(Error::from_status(status, raw_body, headers));
        }

        let auth_token = headers
            .get(SUBJECT_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                Error::Authentication("Identity service returned no X-Subject-Token".to_string())
            })?
            .to_string();

        let document = decode_body(&raw_body, status)?.unwrap_or(Value::Null);
        let token: TokenEnvelope =
            serde_json::from_value(document).map_err(|e| Error::DeserializationFailed {
                raw_response: raw_body.clone(),
                serde_error: e.to_string(),
                status,
            })?;

        session_from_token(auth_token, token.token, config)
    }
}

#[async_trait]
impl IdentityBackend for KeystoneIdentity {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Session> {
        if let Some(session) = request.presupplied_session()? {
            tracing::debug!("Using pre-supplied token and management URL");
            return Ok(session);
        }

        let session = self.issue_token(request).await?;
        tracing::info!(
            management_url = %session.management_url,
            expires_at = ?session.expires_at,
            reauthenticated = request.must_reauthenticate,
            "Authenticated against identity service"
        );
        Ok(session)
    }
}

#[derive(Debug, Deserialize)]
struct TokenEnvelope {
    token: TokenBody,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TokenBody {
    expires_at: Option<DateTime<Utc>>,
    user: Option<NamedRef>,
    project: Option<NamedRef>,
    catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NamedRef {
    id: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CatalogEntry {
    #[serde(rename = "type")]
    service_type: String,
    name: Option<String>,
    id: Option<String>,
    endpoints: Vec<CatalogEndpoint>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CatalogEndpoint {
    interface: String,
    region: Option<String>,
    region_id: Option<String>,
    url: String,
}

impl CatalogEndpoint {
    fn in_region(&self, region: &str) -> bool {
        self.region_id.as_deref() == Some(region) || self.region.as_deref() == Some(region)
    }
}

/// `<auth_url>/v3/auth/tokens`, without doubling a trailing `v3`.
fn tokens_url(auth_url: &str) -> Result<Url> {
    let mut url = Url::parse(auth_url)?;
    let base = url.path().trim_end_matches('/').to_string();
    let path = if base.ends_with("/v3") {
        join_path(&base, "auth/tokens")
    } else {
        join_path(&base, "v3/auth/tokens")
    };
    url.set_path(&path);
    Ok(url)
}

fn domain_ref(id: Option<&str>, name: Option<&str>) -> Option<Value> {
    match (id, name) {
        (Some(id), _) => Some(json!({ "id": id })),
        (None, Some(name)) => Some(json!({ "name": name })),
        (None, None) => None,
    }
}

fn token_request_body(request: &AuthRequest) -> Result<Value> {
    let config = &request.config;
    let default_domain = || {
        domain_ref(config.domain_id.as_deref(), config.domain_name.as_deref())
            .unwrap_or_else(|| json!({ "id": "default" }))
    };

    let identity = match (&config.username, &config.api_key) {
        (Some(username), Some(password)) => {
            let domain = domain_ref(config.user_domain_id.as_deref(), config.user_domain.as_deref())
                .unwrap_or_else(default_domain);
            json!({
                "methods": ["password"],
                "password": {
                    "user": { "name": username, "domain": domain, "password": password }
                }
            })
        }
        _ => match &config.auth_token {
            Some(token) if !request.must_reauthenticate => json!({
                "methods": ["token"],
                "token": { "id": token }
            }),
            Some(_) => {
                return Err(Error::Authentication(
                    "Token rejected and no username/api_key to reauthenticate with".to_string(),
                ))
            }
            None => {
                return Err(Error::ConfigurationError(
                    "username and api_key, or auth_token, are required".to_string(),
                ))
            }
        },
    };

    let scope = if let Some(project_id) = config.effective_project_id() {
        Some(json!({ "project": { "id": project_id } }))
    } else if let Some(project_name) = config.effective_project_name() {
        let domain = domain_ref(
            config.project_domain_id.as_deref(),
            config.project_domain.as_deref(),
        )
        .unwrap_or_else(default_domain);
        Some(json!({ "project": { "name": project_name, "domain": domain } }))
    } else {
        domain_ref(config.domain_id.as_deref(), config.domain_name.as_deref())
            .map(|domain| json!({ "domain": domain }))
    };

    let mut auth = json!({ "identity": identity });
    if let Some(scope) = scope {
        auth["scope"] = scope;
    }
    Ok(json!({ "auth": auth }))
}

/// Picks the endpoint for the first configured service type that has one.
fn select_endpoint<'a>(
    catalog: &'a [CatalogEntry],
    config: &ClientConfig,
) -> Option<(&'a CatalogEntry, &'a CatalogEndpoint)> {
    let interface = config.effective_endpoint_type();
    config.effective_service_types().iter().find_map(|service_type| {
        catalog
            .iter()
            .filter(|entry| &entry.service_type == service_type)
            .filter(|entry| match &config.service_name {
                Some(name) => entry.name.as_ref() == Some(name),
                None => true,
            })
            .find_map(|entry| {
                entry
                    .endpoints
                    .iter()
                    .filter(|endpoint| endpoint.interface == interface)
                    .find(|endpoint| match &config.region {
                        Some(region) => endpoint.in_region(region),
                        None => true,
                    })
                    .map(|endpoint| (entry, endpoint))
            })
    })
}

fn session_from_token(auth_token: String, token: TokenBody, config: &ClientConfig) -> Result<Session> {
    let (management_url, service) = match &config.management_url {
        Some(url) => (Url::parse(url)?, None),
        None => {
            let (entry, endpoint) = select_endpoint(&token.catalog, config).ok_or_else(|| {
                Error::ConfigurationError(format!(
                    "No {} endpoint for service types {:?} in the catalog{}",
                    config.effective_endpoint_type(),
                    config.effective_service_types(),
                    config
                        .region
                        .as_ref()
                        .map(|region| format!(" (region {})", region))
                        .unwrap_or_default()
                ))
            })?;
            let service = CatalogService {
                service_type: entry.service_type.clone(),
                name: entry.name.clone(),
                id: entry.id.clone(),
            };
            (Url::parse(&endpoint.url)?, Some(service))
        }
    };

    let user = token.user.unwrap_or_default();
    let project = token.project.unwrap_or_default();

    Ok(Session {
        auth_token,
        expires_at: token.expires_at,
        management_url,
        region: config.region.clone(),
        endpoint_type: config.effective_endpoint_type(),
        service,
        identity: IdentityInfo {
            user_id: user.id,
            user_name: user.name.or_else(|| config.username.clone()),
            project_id: project.id,
            project_name: project.name,
        },
    })
}
