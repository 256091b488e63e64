//! Records returned by the Gitea API.
//!
//! Only the fields the exporter reads are declared; everything else in the
//! response is ignored.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A Gitea organization.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Organization {
    /// Login name of the organization, used in API paths.
    pub username: String,
}

/// A member of an organization.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub login: String,
}

/// A repository owned by an organization.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Repository {
    pub name: String,
}

/// An open pull request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PullRequest {
    /// Server-wide pull request id (not the per-repository number).
    pub id: i64,

    /// Creation time.
    pub created_at: DateTime<Utc>,

    /// Account that opened the pull request.
    #[serde(default)]
    pub user: Option<Poster>,
}

/// Author of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Poster {
    pub login: String,
}

impl PullRequest {
    /// Login of the poster, or an empty string for ghost accounts.
    pub fn poster_login(&self) -> &str {
        self.user.as_ref().map_or("", |u| u.login.as_str())
    }

    /// Creation time as whole seconds since the Unix epoch.
    pub fn created_at_unix(&self) -> i64 {
        self.created_at.timestamp()
    }
}
