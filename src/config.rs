//! Client configuration.
//!
//! [`ClientConfig`] lists every option the client recognizes as a named,
//! typed field. It can be filled in directly, through
//! [`ClientBuilder`](crate::ClientBuilder), or deserialized from JSON.
//! Unknown keys are rejected.

use crate::{Error, Result};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Default interface used when picking an endpoint from the service catalog.
pub const DEFAULT_ENDPOINT_TYPE: &str = "public";

/// Catalog service types tried when none are configured.
pub const DEFAULT_SERVICE_TYPES: &[&str] = &["introspection", "baremetal-introspection"];

/// Options for the underlying HTTP transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionOptions {
    /// Total time allowed for a single request, in seconds.
    pub timeout_secs: Option<u64>,
    /// Time allowed to establish a connection, in seconds.
    pub connect_timeout_secs: Option<u64>,
}

impl ConnectionOptions {
    /// Request timeout as a `Duration`.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Connect timeout as a `Duration`.
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }

    /// Builds a `reqwest::Client` for these options.
    ///
    /// A non-persistent connection keeps no idle sockets between requests.
    pub(crate) fn build_http_client(&self, persistent: bool) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.timeout() {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = self.connect_timeout() {
            builder = builder.connect_timeout(timeout);
        }
        if !persistent {
            builder = builder.pool_max_idle_per_host(0);
        }
        builder
            .build()
            .map_err(|e| Error::ConfigurationError(format!("Failed to build HTTP client: {}", e)))
    }
}

/// Everything needed to authenticate and reach the introspection service.
///
/// # Examples
///
/// ```
/// use inspector_client::ClientConfig;
///
/// let config = ClientConfig::from_json(r#"{
///     "auth_url": "https://keystone.example.com:5000",
///     "username": "admin",
///     "api_key": "secret",
///     "project_name": "admin",
///     "region": "RegionOne"
/// }"#).unwrap();
///
/// assert_eq!(config.username.as_deref(), Some("admin"));
/// assert!(!config.persistent);
///
/// // Unknown keys are rejected.
/// assert!(ClientConfig::from_json(r#"{"auth_url": "http://x", "colour": "blue"}"#).is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Identity service endpoint. Required by the real client.
    pub auth_url: Option<String>,
    /// Pre-issued token. Combined with `management_url` it skips authentication.
    pub auth_token: Option<String>,
    /// Service endpoint override; bypasses the catalog lookup.
    pub management_url: Option<String>,

    /// User name; also the identity key of the mock backend.
    pub username: Option<String>,
    /// Password.
    pub api_key: Option<String>,
    /// Domain name of the user.
    pub user_domain: Option<String>,
    /// Domain id of the user.
    pub user_domain_id: Option<String>,

    /// Project to scope the token to, by name.
    pub project_name: Option<String>,
    /// Project to scope the token to, by id.
    pub project_id: Option<String>,
    /// Domain name of the project.
    pub project_domain: Option<String>,
    /// Domain id of the project.
    pub project_domain_id: Option<String>,
    /// Domain to scope the token to (or default for user/project), by name.
    pub domain_name: Option<String>,
    /// Domain to scope the token to (or default for user/project), by id.
    pub domain_id: Option<String>,
    /// Legacy name for `project_name`.
    pub tenant: Option<String>,
    /// Legacy name for `project_id`.
    pub tenant_id: Option<String>,

    /// Catalog region.
    pub region: Option<String>,
    /// Catalog interface (`public`, `internal`, `admin`).
    pub endpoint_type: Option<String>,
    /// Catalog service types to look for.
    pub service_type: Option<Vec<String>>,
    /// Catalog service name to look for.
    pub service_name: Option<String>,

    /// Keep connections open between requests.
    pub persistent: bool,
    /// Transport options.
    pub connection: ConnectionOptions,
}

impl ClientConfig {
    /// Parses a configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`] for malformed JSON, wrongly typed
    /// values, or unrecognized keys.
    pub fn from_json(document: &str) -> Result<Self> {
        serde_json::from_str(document)
            .map_err(|e| Error::ConfigurationError(format!("Invalid client configuration: {}", e)))
    }

    /// Checks the options the real client cannot work without.
    ///
    /// # Errors
    ///
    /// Returns an error if `auth_url` is missing or any URL fails to parse.
    pub fn validate(&self) -> Result<()> {
        let auth_url = self
            .auth_url
            .as_deref()
            .ok_or_else(|| Error::ConfigurationError("auth_url is required".to_string()))?;
        Url::parse(auth_url)?;
        if let Some(management_url) = &self.management_url {
            Url::parse(management_url)?;
        }
        Ok(())
    }

    /// Effective project name, falling back to the legacy tenant name.
    pub fn effective_project_name(&self) -> Option<&str> {
        self.project_name.as_deref().or(self.tenant.as_deref())
    }

    /// Effective project id, falling back to the legacy tenant id.
    pub fn effective_project_id(&self) -> Option<&str> {
        self.project_id.as_deref().or(self.tenant_id.as_deref())
    }

    /// Catalog interface with any legacy `URL` suffix removed
    /// (`publicURL` becomes `public`).
    pub fn effective_endpoint_type(&self) -> String {
        let endpoint_type = self
            .endpoint_type
            .as_deref()
            .unwrap_or(DEFAULT_ENDPOINT_TYPE);
        endpoint_type
            .strip_suffix("URL")
            .unwrap_or(endpoint_type)
            .to_string()
    }

    /// Catalog service types, or the defaults.
    pub fn effective_service_types(&self) -> Vec<String> {
        match &self.service_type {
            Some(types) if !types.is_empty() => types.clone(),
            _ => DEFAULT_SERVICE_TYPES.iter().map(|s| s.to_string()).collect(),
        }
    }
}
