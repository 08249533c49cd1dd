//! API version negotiation.
//!
//! The service publishes its API under a versioned path prefix (`/v1`). When
//! the management URL handed out by the identity service already carries a
//! supported version, it is used as is. Otherwise the service root is asked
//! for its discovery document and a supported version is picked from it.

use crate::{
    metadata::{default_headers, join_path},
    response::decode_body,
    Error, Result,
};
use http::{header, HeaderValue, StatusCode};
use regex::Regex;
use serde::Deserialize;
use url::Url;

/// Versions accepted when none are configured.
pub const DEFAULT_SUPPORTED_VERSIONS: &str = "v1";

/// Statuses a discovery document may be served with.
const DISCOVERY_STATUSES: [StatusCode; 3] = [
    StatusCode::OK,
    StatusCode::NO_CONTENT,
    StatusCode::MULTIPLE_CHOICES,
];

/// Matcher for the API versions this client can speak.
///
/// # Examples
///
/// ```
/// use inspector_client::version::{SupportedVersions, DEFAULT_SUPPORTED_VERSIONS};
///
/// let supported = SupportedVersions::new(DEFAULT_SUPPORTED_VERSIONS).unwrap();
/// assert!(supported.matches("/v1"));
/// assert!(supported.matches("/inspector/v1/"));
/// assert!(!supported.matches("/"));
/// assert!(!supported.matches("/v2"));
/// ```
#[derive(Debug, Clone)]
pub struct SupportedVersions {
    pattern: Regex,
}

impl SupportedVersions {
    /// Builds a matcher from a regular expression.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`] if the pattern doesn't compile.
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern).map_err(|e| {
            Error::ConfigurationError(format!("Invalid supported-version pattern: {}", e))
        })?;
        Ok(Self { pattern })
    }

    /// Returns `true` if `candidate` (a path or version id) matches.
    pub fn matches(&self, candidate: &str) -> bool {
        self.pattern.is_match(candidate)
    }

    /// The pattern source.
    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }
}


/// One advertised API version.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AdvertisedVersion {
    /// Version identifier, e.g. `v1`.
    pub id: String,
    /// Lifecycle status, e.g. `CURRENT`, `SUPPORTED`, `DEPRECATED`.
    #[serde(default)]
    pub status: Option<String>,
}

impl AdvertisedVersion {
    /// Lower is better.
    fn preference(&self) -> u8 {
        match self.status.as_deref().map(str::to_ascii_uppercase).as_deref() {
            Some("CURRENT") => 0,
            Some("SUPPORTED") => 1,
            None => 2,
            Some(_) => 3,
        }
    }
}

/// The discovery document in any of the shapes services publish it in.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DiscoveryDocument {
    versions: Option<VersionList>,
    version: Option<AdvertisedVersion>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VersionList {
    Plain(Vec<AdvertisedVersion>),
    Wrapped { values: Vec<AdvertisedVersion> },
}

impl DiscoveryDocument {
    fn into_versions(self) -> Vec<AdvertisedVersion> {
        let versions = match self.versions {
            Some(VersionList::Plain(versions)) => versions,
            Some(VersionList::Wrapped { values }) => values,
            None => Vec::new(),
        };
        if versions.is_empty() {
            self.version.into_iter().collect()
        } else {
            versions
        }
    }
}

/// Picks the best advertised version matching `supported`.
///
/// Matches are ranked `CURRENT`, then `SUPPORTED`, then unlabelled, then
/// anything else; ties go to the earliest advertised.
pub fn select_version<'a>(
    supported: &SupportedVersions,
    advertised: &'a [AdvertisedVersion],
) -> Option<&'a AdvertisedVersion> {
    advertised
        .iter()
        .filter(|version| supported.matches(&version.id))
        .min_by_key(|version| version.preference())
}

/// Resolves the path prefix requests are sent under.
#[derive(Debug, Clone)]
pub struct VersionNegotiator {
    supported: SupportedVersions,
    http_client: reqwest::Client,
}

impl VersionNegotiator {
    /// Creates a negotiator that queries discovery documents through `http_client`.
    pub fn new(supported: SupportedVersions, http_client: reqwest::Client) -> Self {
        Self {
            supported,
            http_client,
        }
    }

    /// Returns the path prefix to use for `management_url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedVersion`] if discovery advertises no
    /// matching version, or the classified error if discovery itself fails.
    pub async fn resolve(&self, management_url: &Url, auth_token: &str) -> Result<String> {
        let configured = management_url.path().trim_end_matches('/');
        if self.supported.matches(configured) {
            tracing::debug!(path = %configured, "Management URL already carries a supported version");
            return Ok(configured.to_string());
        }

        let advertised = self.discover(management_url, auth_token).await?;
        let selected = select_version(&self.supported, &advertised).ok_or_else(|| {
            Error::UnsupportedVersion {
                pattern: self.supported.as_str().to_string(),
                advertised: advertised.iter().map(|v| v.id.clone()).collect(),
            }
        })?;

        let prefix = join_path("", &selected.id);
        tracing::info!(
            version = %selected.id,
            status = ?selected.status,
            prefix = %prefix,
            "Selected API version"
        );
        Ok(prefix)
    }

    async fn discover(&self, management_url: &Url, auth_token: &str) -> Result<Vec<AdvertisedVersion>> {
        let mut url = management_url.clone();
        url.set_path("/");
        url.set_query(None);
        url.set_fragment(None);

        tracing::debug!(url = %url, "Querying version discovery document");

        let mut headers = default_headers(auth_token)?;
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let response = self
            .http_client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(Error::transport)?;

        let status = response.status();
        let headers = response.headers().clone();
        let raw_body = response.text().await.map_err(Error::transport)?;

        if !DISCOVERY_STATUSES.contains(&status) {
            return Err(Error::from_status(status, raw_body, headers));
        }

        let document = match decode_body(&raw_body, status)? {
            Some(value) => serde_json::from_value::<DiscoveryDocument>(value).map_err(|e| {
                Error::DeserializationFailed {
                    raw_response: raw_body.clone(),
                    serde_error: e.to_string(),
                    status,
                }
            })?,
            None => DiscoveryDocument::default(),
        };
        Ok(document.into_versions())
    }
}
