//! Per-probe metric registry.
//!
//! Every probe builds a fresh [`ProbeMetrics`]; nothing is carried over between
//! requests, so a series only appears if the most recent probe produced it.

use std::sync::atomic::AtomicU64;
use std::time::Duration;

use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

/// Prefix applied to every metric name.
pub const METRIC_PREFIX: &str = "gitea";

/// Content type of the rendered exposition document.
pub const CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct TargetLabels {
    pub target: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OrganizationLabels {
    pub target: String,
    pub organization: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RepositoryLabels {
    pub target: String,
    pub organization: String,
    pub repository: String,
}

impl RepositoryLabels {
    pub fn new(target: &str, organization: &str, repository: &str) -> Self {
        Self {
            target: escape_label_value(target),
            organization: escape_label_value(organization),
            repository: escape_label_value(repository),
        }
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct PullRequestLabels {
    pub target: String,
    pub organization: String,
    pub repository: String,
    pub pull_request_id: String,
    pub poster_username: String,
}

/// Gauges filled in by a single probe, registered on their own registry.
#[derive(Debug)]
pub struct ProbeMetrics {
    registry: Registry,
    organizations: Family<TargetLabels, Gauge>,
    organization_members: Family<OrganizationLabels, Gauge>,
    repositories: Family<OrganizationLabels, Gauge>,
    pull_requests: Family<RepositoryLabels, Gauge>,
    pull_request_created_at: Family<PullRequestLabels, Gauge>,
    probe_duration: Family<TargetLabels, Gauge<f64, AtomicU64>>,
}

impl ProbeMetrics {
    /// Create an empty registry with all gauge families registered.
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix(METRIC_PREFIX);

        let organizations = Family::<TargetLabels, Gauge>::default();
        registry.register(
            "organizations_total",
            "Gives the total number of orgs in the gitea instance",
            organizations.clone(),
        );

        let organization_members = Family::<OrganizationLabels, Gauge>::default();
        registry.register(
            "organization_members_total",
            "Gives the total number of members in each organization",
            organization_members.clone(),
        );

        let repositories = Family::<OrganizationLabels, Gauge>::default();
        registry.register(
            "repositories_total",
            "Gives the total number of repos in the gitea instance per org",
            repositories.clone(),
        );

        let pull_requests = Family::<RepositoryLabels, Gauge>::default();
        registry.register(
            "pull_requests_total",
            "Gives the total number of open pull requests per repository",
            pull_requests.clone(),
        );

        let pull_request_created_at = Family::<PullRequestLabels, Gauge>::default();
        registry.register(
            "pull_request_created_at_seconds",
            "Gives the creation time of open pull requests in seconds since epoch",
            pull_request_created_at.clone(),
        );

        let probe_duration = Family::<TargetLabels, Gauge<f64, AtomicU64>>::default();
        registry.register(
            "probe_duration_seconds",
            "Gives the time spent querying the gitea instance",
            probe_duration.clone(),
        );

        Self {
            registry,
            organizations,
            organization_members,
            repositories,
            pull_requests,
            pull_request_created_at,
            probe_duration,
        }
    }

    pub fn set_organizations(&self, target: &str, count: usize) {
        self.organizations
            .get_or_create(&TargetLabels {
                target: escape_label_value(target),
            })
            .set(count as i64);
    }

    pub fn set_organization_members(&self, target: &str, organization: &str, count: usize) {
        self.organization_members
            .get_or_create(&OrganizationLabels {
                target: escape_label_value(target),
                organization: escape_label_value(organization),
            })
            .set(count as i64);
    }

    pub fn set_repositories(&self, target: &str, organization: &str, count: usize) {
        self.repositories
            .get_or_create(&OrganizationLabels {
                target: escape_label_value(target),
                organization: escape_label_value(organization),
            })
            .set(count as i64);
    }

    pub fn set_pull_requests(&self, repository: &RepositoryLabels, count: usize) {
        self.pull_requests.get_or_create(repository).set(count as i64);
    }

    /// Record the creation time of one pull request, in whole Unix seconds.
    pub fn set_pull_request_created_at(
        &self,
        repository: &RepositoryLabels,
        pull_request_id: i64,
        poster_username: &str,
        created_at_unix: i64,
    ) {
        self.pull_request_created_at
            .get_or_create(&PullRequestLabels {
                target: repository.target.clone(),
                organization: repository.organization.clone(),
                repository: repository.repository.clone(),
                pull_request_id: pull_request_id.to_string(),
                poster_username: escape_label_value(poster_username),
            })
            .set(created_at_unix);
    }

    pub fn set_probe_duration(&self, target: &str, elapsed: Duration) {
        self.probe_duration
            .get_or_create(&TargetLabels {
                target: escape_label_value(target),
            })
            .set(elapsed.as_secs_f64());
    }

    /// Render the registry in the OpenMetrics text format.
    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut output = String::new();
        encode(&mut output, &self.registry)?;
        Ok(output)
    }
}

/// Escape a label value for the exposition format.
///
/// The encoder writes label values verbatim, so quotes, backslashes and
/// line feeds have to be escaped before they reach a label set.
pub fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

impl Default for ProbeMetrics {
    fn default() -> Self {
        Self::new()
    }
}
