//! HTTP server exposing the probe endpoint.

use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::TargetRegistry;
use crate::metrics::CONTENT_TYPE;
use crate::probe::Prober;

/// Application state shared across handlers. Read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub targets: Arc<TargetRegistry>,
    pub prober: Prober,
}

impl AppState {
    pub fn new(targets: TargetRegistry, prober: Prober) -> Self {
        Self {
            targets: Arc::new(targets),
            prober,
        }
    }
}

/// Create the HTTP router.
pub fn create_router(state: AppState, probe_path: &str) -> Router {
    let index = index_page(&state.targets, probe_path);

    Router::new()
        .route(probe_path, get(probe_handler))
        .route("/health", get(health_handler))
        .route("/", get(move || async move { index }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handler for the probe endpoint.
///
/// A repeated `target` parameter resolves to its first occurrence.
async fn probe_handler(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let name = params
        .into_iter()
        .find_map(|(key, value)| (key == "target").then_some(value));

    let Some(name) = name.filter(|t| !t.is_empty()) else {
        error!("Probe request without target parameter");
        return (StatusCode::BAD_REQUEST, "Target parameter missing").into_response();
    };

    let Some(target) = state.targets.get(&name) else {
        let message = format!("Invalid target: {}", name);
        error!(target_name = %name, "{}", message);
        return (StatusCode::BAD_REQUEST, message).into_response();
    };

    let metrics = state.prober.probe(target).await;

    match metrics.render() {
        Ok(body) => (StatusCode::OK, [(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!(target_name = %name, error = %e, "Failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render metrics").into_response()
        }
    }
}

/// Handler for the /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "healthy\n").into_response()
}

fn index_page(targets: &TargetRegistry, probe_path: &str) -> String {
    let mut page = String::from("Gitea Exporter\n\n");
    let _ = writeln!(page, "Probe: {}?target=<name>", probe_path);
    let _ = writeln!(page, "Health: /health\n");
    let _ = writeln!(page, "Targets:");
    for name in targets.names() {
        let _ = writeln!(page, "  {}", name);
    }
    page
}

/// HTTP server configuration.
pub struct HttpServer {
    state: AppState,
    listen_addr: SocketAddr,
    probe_path: String,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(state: AppState, listen_addr: SocketAddr, probe_path: String) -> Self {
        Self {
            state,
            listen_addr,
            probe_path,
        }
    }

    /// Serve probes until `shutdown` flips to `true` or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.listen_addr)
            .await
            .with_context(|| format!("Cannot listen on {}", self.listen_addr))?;

        info!(
            addr = %self.listen_addr,
            targets = self.state.targets.len(),
            "Serving probes on {}",
            self.probe_path
        );

        let router = create_router(self.state, &self.probe_path);
        let stop = async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
            info!("Draining probe connections");
        };

        axum::serve(listener, router)
            .with_graceful_shutdown(stop)
            .await
            .context("Probe server failed")?;

        info!("Probe server stopped");
        Ok(())
    }
}
