//! GitHub repository contents API client.

use super::{ContentStore, PutFile, StoreError, StoredFile};
use crate::config::GithubConfig;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use reqwest::{Client, RequestBuilder, Response, StatusCode, header};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";

/// Writes files through `PUT /repos/{owner}/{repo}/contents/{path}`.
///
/// When `update_existing` is set, the current blob sha of the path is looked up first and sent
/// along with the write, so that an existing file is replaced instead of rejected.
pub struct GithubContents {
    client: Client,
    api_url: Url,
    owner: String,
    repo: String,
    token: String,
    branch: Option<String>,
    update_existing: bool,
    request_timeout: Duration,
}

#[derive(Debug, Serialize)]
struct PutContentsBody<'a> {
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PutContentsResponse {
    content: Option<ContentMetadata>,
}

#[derive(Debug, Deserialize)]
struct ContentMetadata {
    sha: Option<String>,
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

impl GithubContents {
    pub fn new(config: &GithubConfig, token: String) -> Result<Self, StoreError> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            token,
            branch: config.branch.clone(),
            update_existing: config.update_existing,
            request_timeout: config.request_timeout,
        })
    }

    /// Build the contents URL for `path`, one URL segment per `/`-separated component.
    ///
    /// URL serialization drops `.` and `..` segments, so paths containing them (or empty
    /// segments) are refused rather than written somewhere else.
    fn contents_url(&self, path: &str) -> Result<Url, StoreError> {
        if path.split('/').any(|segment| matches!(segment, "" | "." | "..")) {
            return Err(StoreError::InvalidPath(path.to_string()));
        }

        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidUrl(self.api_url.to_string()))?
            .pop_if_empty()
            .extend(["repos", self.owner.as_str(), self.repo.as_str(), "contents"])
            .extend(path.split('/'));
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(header::AUTHORIZATION, format!("token {}", self.token))
            .header(header::ACCEPT, GITHUB_ACCEPT)
            .timeout(self.request_timeout)
    }

    /// Current blob sha of the file at `url`, or `None` if nothing is stored there yet.
    #[instrument(skip(self), err)]
    async fn existing_sha(&self, url: &Url) -> Result<Option<String>, StoreError> {
        let mut url = url.clone();
        if let Some(branch) = &self.branch {
            url.query_pairs_mut().append_pair("ref", branch);
        }

        let response = self.authorized(self.client.get(url)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("No existing file at target path");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let metadata: ContentMetadata = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(format!("existing file metadata: {e}")))?;
        debug!(sha = ?metadata.sha, "Found existing file at target path");
        Ok(metadata.sha)
    }
}

#[async_trait]
impl ContentStore for GithubContents {
    #[instrument(skip(self, request), fields(path = %request.path, bytes = request.content.len()), err)]
    async fn put_file(&self, request: PutFile) -> Result<StoredFile, StoreError> {
        let url = self.contents_url(&request.path)?;

        let sha = if self.update_existing { self.existing_sha(&url).await? } else { None };

        let body = PutContentsBody {
            message: &request.message,
            content: general_purpose::STANDARD.encode(&request.content),
            sha,
            branch: self.branch.as_deref(),
        };

        debug!(url = %url, "Writing file to GitHub");
        let response = self.authorized(self.client.put(url)).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let parsed: PutContentsResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(format!("contents response: {e}")))?;
        let content = parsed
            .content
            .ok_or_else(|| StoreError::Decode("response has no content metadata".to_string()))?;
        let html_url = content
            .html_url
            .ok_or_else(|| StoreError::Decode("response has no content.html_url".to_string()))?;

        Ok(StoredFile { html_url, sha: content.sha })
    }
}

/// Turn a non-success response into [`StoreError::Api`], preferring GitHub's `message` field.
async fn api_error(response: Response) -> StoreError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    tracing::debug!(%status, body = %body, "GitHub API returned an error");

    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| status.to_string());

    StoreError::Api {
        status: status.as_u16(),
        message,
    }
}
