//! Probe orchestration: walk one Gitea server and fill a fresh metric registry.

use std::time::Instant;

use gitea_client::{GiteaClient, Organization};
use tracing::{debug, info};

use crate::config::Target;
use crate::metrics::{ProbeMetrics, RepositoryLabels};

/// Runs probes against configured targets.
///
/// Holds only the shared HTTP transport. A [`GiteaClient`] is bound to the
/// resolved target on every probe, so targets never share credentials.
#[derive(Debug, Clone)]
pub struct Prober {
    http: reqwest::Client,
}

impl Prober {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Probe one target and return the populated registry.
    ///
    /// API calls are issued one after another. Failed calls count as empty
    /// results, so the probe always completes.
    pub async fn probe(&self, target: &Target) -> ProbeMetrics {
        let metrics = ProbeMetrics::new();
        let client = GiteaClient::new(
            self.http.clone(),
            target.base_url.clone(),
            target.token.clone(),
        );
        let started = Instant::now();

        let organizations = exclude_organizations(client.list_organizations().await, target);
        metrics.set_organizations(&target.name, organizations.len());

        let mut pull_request_total = 0;
        for org in &organizations {
            let org_name = org.username.as_str();

            let members = client.list_organization_members(org_name).await;
            metrics.set_organization_members(&target.name, org_name, members.len());

            let repositories = client.list_repositories(org_name).await;
            metrics.set_repositories(&target.name, org_name, repositories.len());

            for repo in &repositories {
                let labels = RepositoryLabels::new(&target.name, org_name, &repo.name);
                let pull_requests = client.list_open_pull_requests(org_name, &repo.name).await;
                metrics.set_pull_requests(&labels, pull_requests.len());

                debug!(
                    organization = %org_name,
                    repository = %repo.name,
                    pull_requests = pull_requests.len(),
                    "Fetched open pull requests"
                );

                if pull_requests.is_empty() {
                    continue;
                }
                pull_request_total += pull_requests.len();

                for pr in &pull_requests {
                    metrics.set_pull_request_created_at(
                        &labels,
                        pr.id,
                        pr.poster_login(),
                        pr.created_at_unix(),
                    );
                }
            }
        }

        let elapsed = started.elapsed();
        metrics.set_probe_duration(&target.name, elapsed);

        info!(
            target_name = %target.name,
            organizations = organizations.len(),
            pull_requests = pull_request_total,
            duration_ms = elapsed.as_millis() as u64,
            "Probe completed"
        );

        metrics
    }
}

/// Drop every organization whose login is excluded for the target.
pub fn exclude_organizations(organizations: Vec<Organization>, target: &Target) -> Vec<Organization> {
    organizations
        .into_iter()
        .filter(|org| !target.is_excluded(&org.username))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Url;
    use std::collections::HashSet;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_target(name: &str, base: &str, excluded: &[&str]) -> Target {
        Target {
            name: name.to_string(),
            base_url: Url::parse(base).unwrap(),
            token: "token".to_string(),
            excluded_orgs: excluded.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn orgs(names: &[&str]) -> Vec<Organization> {
        names
            .iter()
            .map(|n| Organization {
                username: n.to_string(),
            })
            .collect()
    }

    fn names(orgs: &[Organization]) -> Vec<&str> {
        orgs.iter().map(|o| o.username.as_str()).collect()
    }

    fn make_prober() -> Prober {
        Prober::new(gitea_client::build_http_client(None).unwrap())
    }

    async fn mount_json(server: &MockServer, route: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[test]
    fn test_exclude_organizations() {
        let target = make_target("t1", "https://git.example.com", &["a", "b"]);

        let filtered = exclude_organizations(orgs(&["a", "b", "c"]), &target);
        assert_eq!(names(&filtered), vec!["c"]);

        let filtered = exclude_organizations(orgs(&["c", "b", "a"]), &target);
        assert_eq!(names(&filtered), vec!["c"]);
    }

    #[test]
    fn test_exclude_removes_every_match() {
        let target = make_target("t1", "https://git.example.com", &["a"]);

        let filtered = exclude_organizations(orgs(&["a", "c", "a", "d"]), &target);
        assert_eq!(names(&filtered), vec!["c", "d"]);
    }

    #[test]
    fn test_exclude_is_idempotent() {
        let mut target = make_target("t1", "https://git.example.com", &[]);
        target.excluded_orgs = ["a", "b", "a"].iter().map(|s| s.to_string()).collect::<HashSet<_>>();

        let once = exclude_organizations(orgs(&["a", "b", "c"]), &target);
        let twice = exclude_organizations(once.clone(), &target);
        assert_eq!(once, twice);
        assert_eq!(names(&twice), vec!["c"]);
    }

    #[test]
    fn test_no_exclusions_keeps_all() {
        let target = make_target("t1", "https://git.example.com", &[]);

        let filtered = exclude_organizations(orgs(&["a", "b"]), &target);
        assert_eq!(names(&filtered), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_probe_scenario() {
        let server = MockServer::start().await;
        mount_json(
            &server,
            "/api/v1/orgs",
            serde_json::json!([{ "username": "secret" }, { "username": "public" }]),
        )
        .await;
        mount_json(
            &server,
            "/api/v1/orgs/public/members",
            serde_json::json!([{ "login": "alice" }, { "login": "bob" }, { "login": "carol" }]),
        )
        .await;
        mount_json(
            &server,
            "/api/v1/orgs/public/repos",
            serde_json::json!([{ "name": "r1" }]),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/repos/public/r1/pulls"))
            .and(query_param("state", "open"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "id": 5, "created_at": "2024-01-15T10:00:00Z", "user": { "login": "alice" } },
                { "id": 7, "created_at": "2024-01-16T10:00:00Z", "user": { "login": "bob" } }
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/orgs/secret/repos"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/orgs/secret/members"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let target = make_target("t1", &server.uri(), &["secret"]);
        let output = make_prober().probe(&target).await.render().unwrap();

        assert!(output.contains("gitea_organizations_total{target=\"t1\"} 1\n"));
        assert!(output.contains(
            "gitea_organization_members_total{target=\"t1\",organization=\"public\"} 3\n"
        ));
        assert!(output.contains("gitea_repositories_total{target=\"t1\",organization=\"public\"} 1\n"));
        assert!(output.contains(
            "gitea_pull_requests_total{target=\"t1\",organization=\"public\",repository=\"r1\"} 2\n"
        ));
        assert!(output.contains(
            "gitea_pull_request_created_at_seconds{target=\"t1\",organization=\"public\",repository=\"r1\",pull_request_id=\"5\",poster_username=\"alice\"} 1705312800\n"
        ));
        assert!(output.contains(
            "gitea_pull_request_created_at_seconds{target=\"t1\",organization=\"public\",repository=\"r1\",pull_request_id=\"7\",poster_username=\"bob\"} 1705399200\n"
        ));
        assert!(!output.contains("organization=\"secret\""));
        assert!(output.contains("gitea_probe_duration_seconds{target=\"t1\"} "));
    }

    #[tokio::test]
    async fn test_repository_failure_is_soft() {
        let server = MockServer::start().await;
        mount_json(&server, "/api/v1/orgs", serde_json::json!([{ "username": "infra" }])).await;
        mount_json(&server, "/api/v1/orgs/infra/members", serde_json::json!([])).await;
        Mock::given(method("GET"))
            .and(path("/api/v1/orgs/infra/repos"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let target = make_target("t1", &server.uri(), &[]);
        let output = make_prober().probe(&target).await.render().unwrap();

        assert!(output.contains("gitea_organizations_total{target=\"t1\"} 1\n"));
        assert!(output.contains("gitea_repositories_total{target=\"t1\",organization=\"infra\"} 0\n"));
        assert!(!output.contains("gitea_pull_requests_total{"));
    }

    #[tokio::test]
    async fn test_repository_without_pull_requests() {
        let server = MockServer::start().await;
        mount_json(&server, "/api/v1/orgs", serde_json::json!([{ "username": "infra" }])).await;
        mount_json(&server, "/api/v1/orgs/infra/members", serde_json::json!([])).await;
        mount_json(&server, "/api/v1/orgs/infra/repos", serde_json::json!([{ "name": "quiet" }])).await;
        mount_json(&server, "/api/v1/repos/infra/quiet/pulls", serde_json::json!([])).await;

        let target = make_target("t1", &server.uri(), &[]);
        let output = make_prober().probe(&target).await.render().unwrap();

        assert!(output.contains(
            "gitea_pull_requests_total{target=\"t1\",organization=\"infra\",repository=\"quiet\"} 0\n"
        ));
        assert!(!output.contains("gitea_pull_request_created_at_seconds{"));
    }

    #[tokio::test]
    async fn test_unreachable_server_reports_zero_organizations() {
        let target = make_target("down", "http://127.0.0.1:1", &[]);
        let output = make_prober().probe(&target).await.render().unwrap();

        assert!(output.contains("gitea_organizations_total{target=\"down\"} 0\n"));
        assert!(output.contains("gitea_probe_duration_seconds{target=\"down\"} "));
    }

    #[tokio::test]
    async fn test_probes_of_different_targets_stay_separate() {
        let first = MockServer::start().await;
        mount_json(&first, "/api/v1/orgs", serde_json::json!([{ "username": "one" }])).await;

        let second = MockServer::start().await;
        mount_json(&second, "/api/v1/orgs", serde_json::json!([{ "username": "two" }])).await;

        let prober = make_prober();
        let _ = prober.probe(&make_target("a", &first.uri(), &[])).await;
        let output = prober
            .probe(&make_target("b", &second.uri(), &[]))
            .await
            .render()
            .unwrap();

        assert!(output.contains("organization=\"two\""));
        assert!(!output.contains("organization=\"one\""));
        assert!(!output.contains("target=\"a\""));
    }
}
