//! Gitea API Client
//!
//! A small read-only client for the parts of the Gitea REST API the exporter needs:
//!
//! - [`client`] - [`GiteaClient`] bound to one server, plus the shared HTTP transport
//! - [`model`] - Typed records decoded from API responses
//! - [`error`] - Error types
//!
//! Every list operation is fail-soft: transport errors, unexpected statuses and
//! undecodable bodies are logged and turned into an empty result.

pub mod client;
pub mod error;
pub mod model;

pub use client::{GiteaClient, USER_AGENT, build_http_client};
pub use error::{ApiError, Result};
pub use model::{Organization, Poster, PullRequest, Repository, User};
