use reqwest::{StatusCode, Url};
use thiserror::Error;

/// Errors raised while talking to a Gitea server.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected response status: {0}")]
    Status(StatusCode),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Base URL cannot carry a path: {0}")]
    InvalidBaseUrl(Url),
}

/// Result type alias using [`ApiError`].
pub type Result<T> = std::result::Result<T, ApiError>;
