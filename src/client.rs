//! The networked client.
//!
//! [`Client`] authenticates, negotiates the API version and then sends every
//! request through a [`Dispatcher`]. Use [`ClientBuilder`] to configure it,
//! or [`Client::connect`] with a ready [`ClientConfig`].

use crate::{
    config::ClientConfig,
    dispatch::Dispatcher,
    identity::{AuthRequest, IdentityBackend, KeystoneIdentity, Session},
    metadata::RequestMetadata,
    response::Body,
    service::IntrospectionService,
    version::{SupportedVersions, VersionNegotiator, DEFAULT_SUPPORTED_VERSIONS},
    Response, Result,
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// A client for the introspection service.
///
/// Construction authenticates and resolves the API path prefix, so a
/// `Client` always has a session and an endpoint. One client serves one
/// request at a time; create more clients for parallel work.
///
/// # Examples
///
/// ```no_run
/// use inspector_client::{Client, IntrospectionService};
///
/// # async fn example() -> Result<(), inspector_client::Error> {
/// let mut client = Client::builder()
///     .auth_url("https://keystone.example.com:5000")
///     .credentials("admin", "secret")
///     .project_name("admin")
///     .region("RegionOne")
///     .connect()
///     .await?;
///
/// client.create_introspection("8a6e2dd1-8f4b-4b9a-a2b0-0f6c1c3e1a11", None).await?;
/// let status = client.get_introspection("8a6e2dd1-8f4b-4b9a-a2b0-0f6c1c3e1a11").await?;
/// println!("Status: {:?}", status.data);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Client {
    dispatcher: Dispatcher,
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Connects with `config`, authenticating through Keystone.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration, rejected credentials, or when the
    /// service offers no supported API version.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        ClientBuilder::new().config(config).connect().await
    }
}

#[async_trait]
impl IntrospectionService for Client {
    async fn request(
        &mut self,
        metadata: RequestMetadata,
        body: Option<Value>,
    ) -> Result<Response<Body>> {
        self.dispatcher.request(&metadata, body.as_ref()).await
    }

    fn session(&self) -> &Session {
        self.dispatcher.session()
    }

    fn path_prefix(&self) -> &str {
        self.dispatcher.path_prefix()
    }
}

/// Builder for configuring and creating a [`Client`].
pub struct ClientBuilder {
    config: ClientConfig,
    supported_versions: Option<SupportedVersions>,
    identity: Option<Arc<dyn IdentityBackend>>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            supported_versions: None,
            identity: None,
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the identity service endpoint.
    pub fn auth_url(mut self, url: impl Into<String>) -> Self {
        self.config.auth_url = Some(url.into());
        self
    }

    /// Sets the username and password.
    pub fn credentials(mut self, username: impl Into<String>, api_key: impl Into<String>) -> Self {
        self.config.username = Some(username.into());
        self.config.api_key = Some(api_key.into());
        self
    }

    /// Sets the project to scope the token to.
    pub fn project_name(mut self, project: impl Into<String>) -> Self {
        self.config.project_name = Some(project.into());
        self
    }

    /// Uses a pre-issued token.
    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.config.auth_token = Some(token.into());
        self
    }

    /// Overrides the service endpoint instead of reading the catalog.
    pub fn management_url(mut self, url: impl Into<String>) -> Self {
        self.config.management_url = Some(url.into());
        self
    }

    /// Sets the catalog region.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.config.region = Some(region.into());
        self
    }

    /// Keeps connections open between requests.
    pub fn persistent(mut self, persistent: bool) -> Self {
        self.config.persistent = persistent;
        self
    }

    /// Sets the API versions the client accepts.
    pub fn supported_versions(mut self, supported: SupportedVersions) -> Self {
        self.supported_versions = Some(supported);
        self
    }

    /// Authenticates through `identity` instead of Keystone.
    pub fn identity_backend(mut self, identity: Arc<dyn IdentityBackend>) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Authenticates, negotiates the API version and returns the client.
    ///
    /// # Errors
    ///
    /// * [`Error::ConfigurationError`](crate::Error::ConfigurationError) or
    ///   [`Error::InvalidUrl`](crate::Error::InvalidUrl) for bad options
    /// * [`Error::Authentication`](crate::Error::Authentication) for rejected credentials
    /// * [`Error::UnsupportedVersion`](crate::Error::UnsupportedVersion) if no
    ///   advertised version matches
    pub async fn connect(self) -> Result<Client> {
        self.config.validate()?;

        let http_client = self
            .config
            .connection
            .build_http_client(self.config.persistent)?;
        let identity = self
            .identity
            .unwrap_or_else(|| Arc::new(KeystoneIdentity::new(http_client.clone())));

        let auth_request = AuthRequest::new(self.config);
        let session = identity.authenticate(&auth_request).await?;

        let supported = match self.supported_versions {
            Some(supported) => supported,
            None => SupportedVersions::new(DEFAULT_SUPPORTED_VERSIONS)?,
        };
        let negotiator = VersionNegotiator::new(supported, http_client.clone());
        let path_prefix = negotiator
            .resolve(&session.management_url, &session.auth_token)
            .await?;

        tracing::info!(
            management_url = %session.management_url,
            path_prefix = %path_prefix,
            "Introspection client ready"
        );

        Ok(Client {
            dispatcher: Dispatcher::new(http_client, session, path_prefix, identity, auth_request),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
