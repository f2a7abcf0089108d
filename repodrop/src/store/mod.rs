//! Remote content store abstraction.
//!
//! Submissions end up as files in a remote, version-controlled repository. The [`ContentStore`]
//! trait is the seam between the request handler and that repository; [`github::GithubContents`]
//! is the concrete implementation backed by GitHub's repository contents API.

pub mod github;

use async_trait::async_trait;
use thiserror::Error;

pub use github::GithubContents;

/// Errors raised while talking to the remote store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The remote API answered with a non-success status
    #[error("remote API returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Network failure, timeout, or a client-side request error
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// The remote API answered successfully but with an unexpected body
    #[error("unexpected response from remote API: {0}")]
    Decode(String),

    /// The file path has empty, `.` or `..` segments and cannot be addressed literally
    #[error("invalid file path: {0}")]
    InvalidPath(String),

    /// The configured API base URL cannot carry a path
    #[error("invalid remote API URL: {0}")]
    InvalidUrl(String),
}

/// A single write to the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutFile {
    /// Path inside the repository, `/`-separated
    pub path: String,
    /// Commit message recorded with the write
    pub message: String,
    /// Raw file content; encoding for transport is the store's concern
    pub content: Vec<u8>,
}

/// What the remote store reports back after a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Browser-facing URL of the written file
    pub html_url: String,
    /// Version token of the new file content, if reported
    pub sha: Option<String>,
}

/// Upsert-by-path access to a remote content repository.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Create or replace the file at `request.path`.
    async fn put_file(&self, request: PutFile) -> Result<StoredFile, StoreError>;
}
