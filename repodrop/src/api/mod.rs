//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response data structures
//!
//! # Routes
//!
//! - `POST /post-data`: store a form submission in the configured GitHub repository
//! - `GET /`: landing page with a submission form
//! - `GET /healthz`: liveness probe
//! - `GET /openapi.json`, `GET /docs`: OpenAPI document and its rendered view

pub mod handlers;
pub mod models;
