//! Signed client for the Uploadcare REST API.
//!
//! One [`ApiClient`] serves both API paths the tool needs: the paginated
//! file listing ([`files`]) and the single-resource project info
//! ([`project`]). Every request is signed through [`crate::signer`], so
//! the two paths cannot drift apart in how they authenticate.

use reqwest::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::ProjectCredential;
use crate::signer::{self, SignError};

pub mod files;
pub mod project;

pub use files::{FileLister, Page};
pub use project::ProjectInfo;

/// Production API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.uploadcare.com";

/// Connect timeout for API requests.
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Read timeout for API requests. Listing pages are small; this only
/// needs to cover a slow API, not large transfers.
const READ_TIMEOUT_SECS: u64 = 60;

/// Errors from talking to the API.
///
/// Any of these is fatal to the metadata phase of the project being
/// dumped: pagination aborts at the first failure with no partial retry.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network-level error (DNS, connection, TLS, timeout).
    #[error("network error calling {url}: {source}")]
    Network {
        /// The request URL.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Non-success HTTP status other than an auth rejection.
    #[error("HTTP {status} from {url}")]
    Status {
        /// The request URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The server rejected the request signature.
    #[error("signature rejected (HTTP {status}) by {url}; check publicKey/secretKey")]
    Auth {
        /// The request URL.
        url: String,
        /// The HTTP status code (401 or 403).
        status: u16,
    },

    /// The response body was not the expected JSON shape.
    #[error("unexpected response body from {url}: {source}")]
    Decode {
        /// The request URL.
        url: String,
        /// The underlying decode error.
        #[source]
        source: reqwest::Error,
    },

    /// A request URL could not be parsed.
    #[error("invalid API URL: {url}")]
    InvalidUrl {
        /// The offending URL string.
        url: String,
    },

    /// Signing the request failed.
    #[error(transparent)]
    Sign(#[from] SignError),
}

impl ApiError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn status(url: impl Into<String>, status: u16) -> Self {
        Self::Status {
            url: url.into(),
            status,
        }
    }

    /// Creates an auth rejection error.
    pub fn auth(url: impl Into<String>, status: u16) -> Self {
        Self::Auth {
            url: url.into(),
            status,
        }
    }

    /// Creates a decode error.
    pub fn decode(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Decode {
            url: url.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }
}

/// Authenticated client for one project's API credentials.
///
/// Designed to be created once per project and reused, taking advantage
/// of connection pooling.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    credential: ProjectCredential,
}

impl ApiClient {
    /// Creates a client against the production API endpoint.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    pub fn new(credential: ProjectCredential) -> Self {
        Self::with_base_url(credential, DEFAULT_BASE_URL)
    }

    /// Creates a client against a custom endpoint (for testing with wiremock).
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_base_url(credential: ProjectCredential, base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(std::time::Duration::from_secs(READ_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client with static configuration");
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            credential,
        }
    }

    /// Returns the configured project name.
    #[must_use]
    pub fn project_name(&self) -> &str {
        &self.credential.name
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Starts a fresh pagination walk over the project's file catalog.
    ///
    /// The walk is single-pass; to list again, start a new one.
    #[must_use]
    pub fn list_files(&self) -> FileLister {
        FileLister::new(self.clone())
    }

    /// Fetches the project resource for credential verification.
    ///
    /// # Errors
    ///
    /// Propagates [`ApiError`] unchanged; an [`ApiError::Auth`] here means
    /// the credential pair is wrong.
    pub async fn project_info(&self) -> Result<ProjectInfo, ApiError> {
        let url = format!("{}/project/", self.base_url);
        self.get_json(&url).await
    }

    /// Issues one signed GET and decodes the JSON response.
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let parsed = Url::parse(url).map_err(|_| ApiError::invalid_url(url))?;
        let uri = match parsed.query() {
            Some(query) => format!("{}?{query}", parsed.path()),
            None => parsed.path().to_string(),
        };

        let date = signer::http_date();
        let headers = signer::sign(&self.credential, "GET", &uri, None, &date)?;

        debug!(url = %url, "signed API request");
        let response = self
            .client
            .get(parsed)
            .headers(headers)
            .send()
            .await
            .map_err(|e| ApiError::network(url, e))?;

        let status = response.status();
        if matches!(status.as_u16(), 401 | 403) {
            return Err(ApiError::auth(url, status.as_u16()));
        }
        if !status.is_success() {
            return Err(ApiError::status(url, status.as_u16()));
        }

        response.json::<T>().await.map_err(|e| ApiError::decode(url, e))
    }
}
