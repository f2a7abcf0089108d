//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `REPODROP_CONFIG`
//! environment variable. A missing file is not an error; defaults and environment variables apply.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `REPODROP_` override YAML values
//! 3. **GITHUB_TOKEN** - Special case: overrides `github.token` if set
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `REPODROP_GITHUB__OWNER=acme` sets the `github.owner` field.
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Override server port
//! REPODROP_PORT=8080
//!
//! # Access token for the contents API (preferred method)
//! GITHUB_TOKEN="ghp_..."
//!
//! # Target another repository
//! REPODROP_GITHUB__OWNER=acme
//! REPODROP_GITHUB__REPO=submissions
//! REPODROP_GITHUB__REQUEST_TIMEOUT=10s
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::errors::Error;
use anyhow::anyhow;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "REPODROP_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// Built once at startup and shared read-only with every request handler.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Maximum accepted request body size in bytes
    pub max_body_size: usize,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
    /// Remote repository that submissions are written to
    pub github: GithubConfig,
}

/// Target repository and access settings for the GitHub contents API.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GithubConfig {
    /// Access token. Without it every submission fails with a configuration error.
    #[serde(skip_serializing)]
    pub token: Option<String>,
    /// Repository owner (user or organization)
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// API base URL; override for GitHub Enterprise
    pub api_url: Url,
    /// Branch to commit to. Uses the repository's default branch when unset.
    pub branch: Option<String>,
    /// Timeout for each call to the contents API
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Look up the current file version before writing so existing files are replaced
    pub update_existing: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_body_size: 10 * 1024 * 1024,
            enable_otel_export: false,
            github: GithubConfig::default(),
        }
    }
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            token: None,
            owner: "kakaomames".to_string(),
            repo: "database".to_string(),
            api_url: Url::parse("https://api.github.com").expect("static URL is valid"),
            branch: None,
            request_timeout: Duration::from_secs(30),
            update_existing: true,
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.github.owner.trim().is_empty() || self.github.repo.trim().is_empty() {
            return Err(Error::Other(anyhow!("Config validation: github.owner and github.repo must both be set.")));
        }

        if self.github.request_timeout.is_zero() {
            return Err(Error::Other(anyhow!("Config validation: github.request_timeout must be greater than zero.")));
        }

        if self.max_body_size == 0 {
            return Err(Error::Other(anyhow!("Config validation: max_body_size must be greater than zero.")));
        }

        if self.github.token.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(Error::Other(anyhow!("Config validation: github.token is set but empty. Unset it or provide a token.")));
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("REPODROP_").ignore(&["config"]).split("__"))
            // Common deployment convention for the access token
            .merge(Env::raw().only(&["GITHUB_TOKEN"]).map(|_| "github.token".into()))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
