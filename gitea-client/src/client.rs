//! Gitea REST API client.

use std::fmt;
use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::error::{ApiError, Result};
use crate::model::{Organization, PullRequest, Repository, User};

/// User agent sent with every API request.
pub const USER_AGENT: &str = concat!("gitea-exporter/", env!("CARGO_PKG_VERSION"));

/// Path prefix of the Gitea v1 API.
const API_PREFIX: [&str; 2] = ["api", "v1"];

/// Build the HTTP transport shared by all [`GiteaClient`] values.
///
/// The transport owns the connection pool; clients bound to different
/// servers can share it safely.
pub fn build_http_client(timeout: Option<Duration>) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    let mut builder = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers);

    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }

    Ok(builder.build()?)
}

/// Client bound to a single Gitea server and token.
///
/// Cheap to construct: the underlying [`reqwest::Client`] is reference counted.
#[derive(Clone)]
pub struct GiteaClient {
    http: reqwest::Client,
    base_url: Url,
    token: String,
}

impl fmt::Debug for GiteaClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GiteaClient")
            .field("base_url", &self.base_url.as_str())
            .field("token", &if self.token.is_empty() { "" } else { "***" })
            .finish()
    }
}

impl GiteaClient {
    /// Bind a client to a server. An empty token sends unauthenticated requests.
    pub fn new(http: reqwest::Client, base_url: Url, token: impl Into<String>) -> Self {
        Self {
            http,
            base_url,
            token: token.into(),
        }
    }

    /// List all organizations visible to the token.
    pub async fn list_organizations(&self) -> Vec<Organization> {
        self.fetch_soft(&["orgs"], None).await
    }

    /// List the members of an organization.
    pub async fn list_organization_members(&self, org: &str) -> Vec<User> {
        self.fetch_soft(&["orgs", org, "members"], None).await
    }

    /// List the repositories of an organization.
    pub async fn list_repositories(&self, org: &str) -> Vec<Repository> {
        self.fetch_soft(&["orgs", org, "repos"], None).await
    }

    /// List the open pull requests of a repository.
    pub async fn list_open_pull_requests(&self, owner: &str, repo: &str) -> Vec<PullRequest> {
        self.fetch_soft(&["repos", owner, repo, "pulls"], Some(("state", "open")))
            .await
    }

    /// Build the URL of an API endpoint from its path segments.
    ///
    /// Segments are percent-encoded, so names containing `/` or spaces stay
    /// inside their segment.
    pub fn endpoint(&self, segments: &[&str], query: Option<(&str, &str)>) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidBaseUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(API_PREFIX)
            .extend(segments);

        if let Some((key, value)) = query {
            url.query_pairs_mut().append_pair(key, value);
        }

        Ok(url)
    }

    /// Perform one GET and decode a JSON array body.
    pub async fn fetch<T: DeserializeOwned>(&self, url: &Url) -> Result<Vec<T>> {
        debug!(url = %url, "Calling Gitea API");

        let mut request = self.http.get(url.clone());
        if !self.token.is_empty() {
            request = request.bearer_auth(&self.token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(ApiError::Status(status));
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn fetch_soft<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: Option<(&str, &str)>,
    ) -> Vec<T> {
        let url = match self.endpoint(segments, query) {
            Ok(url) => url,
            Err(e) => {
                error!(error = %e, "Cannot build Gitea API URL");
                return Vec::new();
            }
        };

        match self.fetch(&url).await {
            Ok(items) => items,
            Err(ApiError::Status(status)) => {
                error!(url = %url, status = status.as_u16(), "Gitea API returned {status}");
                Vec::new()
            }
            Err(e) => {
                error!(url = %url, error = %e, "Gitea API call failed");
                Vec::new()
            }
        }
    }
}
