//! HTTP handlers

pub mod upload;

pub use upload::{complete_upload, health, issue_token, upload, HealthResponse};
