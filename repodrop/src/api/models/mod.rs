//! Request and response payloads for the HTTP API.

pub mod submissions;
