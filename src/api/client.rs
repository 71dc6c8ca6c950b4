//! REST client for the managed database API

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use zeroize::Zeroizing;

use crate::config::ApiConfig;
use crate::error::{Result, ShellError};
use crate::ports::{ApiError, Branch, BranchApi, BranchStatus, CertSource, TunnelIdentity};

/// Paginated list envelope, `{"data": [...]}`
#[derive(Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
}

/// Bearer-token HTTP client implementing [`BranchApi`] and [`CertSource`]
pub struct HttpApiClient {
    client: Client,
    base_url: Url,
    token: Zeroizing<String>,
}

impl fmt::Debug for HttpApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl HttpApiClient {
    /// Build a client from the API configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` for an unparsable base URL, `Config` if the
    /// HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| ShellError::ConfigInvalid {
            field: "api.base_url".to_string(),
            reason: e.to_string(),
        })?;

        if base_url.cannot_be_a_base() {
            return Err(ShellError::ConfigInvalid {
                field: "api.base_url".to_string(),
                reason: format!("{base_url} cannot be used as a base URL"),
            });
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("branch-shell/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ShellError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            token: config.token.clone(),
        })
    }

    /// `<base>/v1/organizations/{org}/databases/{db}/branches[/...]`,
    /// each segment percent-encoded
    fn branches_url(&self, organization: &str, database: &str, rest: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["v1", "organizations", organization, "databases", database, "branches"])
                .extend(rest);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> std::result::Result<T, ApiError> {
        debug!(url = %url, "API request");

        let response = self
            .client
            .get(url)
            .bearer_auth(self.token.as_str())
            .send()
            .await
            .map_err(|e| ApiError::Other(format!("request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Other(error_message(status, &body)));
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::Other(format!("invalid response body: {e}")))
    }
}

/// Prefer the API's own `message` field over the raw body
fn error_message(status: StatusCode, body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => format!("{status}: {}", parsed.message),
        Err(_) if body.trim().is_empty() => status.to_string(),
        Err(_) => format!("{status}: {}", body.trim()),
    }
}

#[async_trait]
impl BranchApi for HttpApiClient {
    async fn list_branches(
        &self,
        organization: &str,
        database: &str,
    ) -> std::result::Result<Vec<Branch>, ApiError> {
        let list: ListResponse<Branch> = self
            .get_json(self.branches_url(organization, database, &[]))
            .await?;
        Ok(list.data)
    }

    async fn get_branch(
        &self,
        organization: &str,
        database: &str,
        branch: &str,
    ) -> std::result::Result<Branch, ApiError> {
        self.get_json(self.branches_url(organization, database, &[branch]))
            .await
    }

    async fn get_branch_status(
        &self,
        organization: &str,
        database: &str,
        branch: &str,
    ) -> std::result::Result<BranchStatus, ApiError> {
        self.get_json(self.branches_url(organization, database, &[branch, "status"]))
            .await
    }
}

#[async_trait]
impl CertSource for HttpApiClient {
    async fn identity(
        &self,
        organization: &str,
        database: &str,
        branch: &str,
    ) -> std::result::Result<TunnelIdentity, ApiError> {
        self.get_json(self.branches_url(organization, database, &[branch, "tunnel-identity"]))
            .await
    }
}
