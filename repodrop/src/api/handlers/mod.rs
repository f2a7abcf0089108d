//! HTTP request handlers.
//!
//! - [`submissions`]: form submission intake and forwarding to the content store
//! - [`static_assets`]: landing page serving
//!
//! Handlers return [`crate::errors::Error`], which renders as `{"error": ...}` with the matching
//! HTTP status.

pub mod static_assets;
pub mod submissions;
