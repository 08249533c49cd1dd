//! In-memory stand-in for the introspection service.
//!
//! [`MockClient`] implements [`IntrospectionService`] against a
//! [`MockStore`] instead of the network, so code written against the trait
//! can be tested without a live service. Data is seeded per username from a
//! fixture and shared by every mock client of that username.

mod routes;
pub mod store;

pub use store::{MockIdentityRecord, MockStore, SharedRecord};

use crate::{
    config::ClientConfig,
    identity::{IdentityInfo, Session},
    metadata::RequestMetadata,
    response::Body,
    service::IntrospectionService,
    Error, Response, Result,
};
use async_trait::async_trait;
use chrono::{Duration as TimeDelta, Utc};
use http::{header, HeaderMap, HeaderValue};
use rand::{distributions::Alphanumeric, Rng};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use url::Url;

/// Management URL reported when none is configured.
pub const DEFAULT_MOCK_MANAGEMENT_URL: &str = "http://localhost:5050/v1";

const MOCK_PATH_PREFIX: &str = "/v1";
const MOCK_TOKEN_LENGTH: usize = 64;

/// A client that serves requests from fixture data.
///
/// # Examples
///
/// ```
/// use inspector_client::mock::{MockClient, MockStore};
/// use inspector_client::{ClientConfig, IntrospectionService};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), inspector_client::Error> {
/// let config = ClientConfig {
///     username: Some("doc-example".to_string()),
///     ..Default::default()
/// };
/// let mut client = MockClient::new(config)?;
///
/// client.create_introspection("node-1", None).await?;
/// let job = client.get_introspection("node-1").await?;
/// assert_eq!(job.data.as_ref().unwrap()["finished"], false);
///
/// client.reset_data();
/// assert!(client.get_introspection("node-1").await.unwrap_err().is_not_found());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MockClient {
    store: Arc<MockStore>,
    username: String,
    session: Session,
}

impl MockClient {
    /// Creates a mock client backed by the process-wide store.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured management URL doesn't parse.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_store(config, MockStore::global())
    }

    /// Creates a mock client backed by `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured management URL doesn't parse.
    pub fn with_store(config: ClientConfig, store: Arc<MockStore>) -> Result<Self> {
        let management_url = Url::parse(
            config
                .management_url
                .as_deref()
                .unwrap_or(DEFAULT_MOCK_MANAGEMENT_URL),
        )?;

        let auth_token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(MOCK_TOKEN_LENGTH)
            .map(char::from)
            .collect();

        let session = Session {
            auth_token,
            expires_at: Some(Utc::now() + TimeDelta::days(1)),
            management_url,
            region: config.region.clone(),
            endpoint_type: config.effective_endpoint_type(),
            service: None,
            identity: IdentityInfo {
                user_name: config.username.clone(),
                project_id: config.effective_project_id().map(str::to_string),
                project_name: config.effective_project_name().map(str::to_string),
                ..Default::default()
            },
        };

        Ok(Self {
            store,
            username: config.username.unwrap_or_default(),
            session,
        })
    }

    /// The data this client's username sees, loading it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fixture`] if the fixture can't be loaded.
    pub fn data(&self) -> Result<SharedRecord> {
        self.store.load(&self.username)
    }

    /// Forgets this username's data; the next access re-reads the fixture.
    pub fn reset_data(&self) {
        self.store.evict(&self.username);
    }

    /// The store backing this client.
    pub fn store(&self) -> &Arc<MockStore> {
        &self.store
    }
}

#[async_trait]
impl IntrospectionService for MockClient {
    async fn request(
        &mut self,
        metadata: RequestMetadata,
        body: Option<Value>,
    ) -> Result<Response<Body>> {
        let start_time = Instant::now();
        tracing::debug!(
            method = %metadata.method,
            path = %metadata.path,
            identity = %self.username,
            "Serving mock request"
        );

        let record = self.data()?;
        let (status, data) = {
            let mut record = record.lock();
            routes::route(&mut record, &metadata.method, &metadata.path, body)?
        };

        let raw_body = match &data {
            Some(value) => value.to_string(),
            None => String::new(),
        };
        if !metadata.accepts(status) {
            return Err(Error::from_status(status, raw_body, HeaderMap::new()));
        }

        let mut headers = HeaderMap::new();
        if data.is_some() {
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
        }
        Ok(Response::new(
            data,
            raw_body,
            status,
            headers,
            start_time.elapsed(),
            1,
        ))
    }

    fn session(&self) -> &Session {
        &self.session
    }

    fn path_prefix(&self) -> &str {
        MOCK_PATH_PREFIX
    }
}
