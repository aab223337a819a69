//! HTTP server: scrape endpoint, health check and target list editor.

use std::net::SocketAddr;

use axum::Router;
use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use serde::Deserialize;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::poller::SharedPoller;
use crate::targets::SharedTargetStore;

const EDITOR_PATH: &str = "/";
const HEALTH_PATH: &str = "/health";

/// Routes served alongside the scrape endpoint.
pub const RESERVED_PATHS: &[&str] = &[EDITOR_PATH, HEALTH_PATH];

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    poller: SharedPoller,
    targets: SharedTargetStore,
}

/// Create the HTTP router.
fn create_router(poller: SharedPoller, targets: SharedTargetStore, metrics_path: &str) -> Router {
    let state = AppState { poller, targets };

    Router::new()
        .route(EDITOR_PATH, get(editor_handler).post(update_targets_handler))
        .route(metrics_path, get(metrics_handler))
        .route(HEALTH_PATH, get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Handler for the scrape endpoint.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    let targets = match state.targets.list() {
        Ok(targets) => targets,
        Err(e) => {
            error!(
                path = %state.targets.path().display(),
                error = %e,
                "Failed to read target list"
            );
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to read target list\n",
            )
                .into_response();
        }
    };

    let report = state.poller.scrape(&targets).await;

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        report.body(),
    )
        .into_response()
}

/// Handler for the /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "healthy\n").into_response()
}

/// Form posted by the editor page.
#[derive(Debug, Deserialize)]
struct TargetsForm {
    ips: String,
}

/// Handler for `GET /`: the target list editor.
async fn editor_handler(State(state): State<AppState>) -> Response {
    match state.targets.raw() {
        Ok(text) => Html(render_editor(&text)).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to read target list");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to read target list\n",
            )
                .into_response()
        }
    }
}

/// Handler for `POST /`: replace the target list and go back to the editor.
async fn update_targets_handler(
    State(state): State<AppState>,
    Form(form): Form<TargetsForm>,
) -> Response {
    match state.targets.replace(&form.ips) {
        Ok(()) => {
            info!(path = %state.targets.path().display(), "Target list updated");
            Redirect::to(EDITOR_PATH).into_response()
        }
        Err(e) => {
            error!(error = %e, "Failed to write target list");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to write target list\n",
            )
                .into_response()
        }
    }
}

/// Render the editor page with `text` in the textarea.
fn render_editor(text: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Miner Manager</title>
</head>
<body>
<h1>Miner Manager</h1>
<p>One device address per line (host or host:port).</p>
<form method="post" action="/">
<textarea name="ips" rows="20" cols="40">{}</textarea>
<br>
<button type="submit">Save</button>
</form>
</body>
</html>
"#,
        escape_html(text)
    )
}

/// Escape text for inclusion in HTML element content.
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// HTTP server configuration.
pub struct HttpServer {
    poller: SharedPoller,
    targets: SharedTargetStore,
    listen_addr: SocketAddr,
    metrics_path: String,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(
        poller: SharedPoller,
        targets: SharedTargetStore,
        listen_addr: SocketAddr,
        metrics_path: String,
    ) -> Self {
        Self {
            poller,
            targets,
            listen_addr,
            metrics_path,
        }
    }

    /// Bind the listener, then serve until the shutdown signal is received.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.listen_addr, e))?;

        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until the shutdown signal is received.
    pub async fn serve(
        self,
        listener: tokio::net::TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        let addr = listener.local_addr()?;
        let router = create_router(self.poller, self.targets, &self.metrics_path);

        info!(
            addr = %addr,
            path = %self.metrics_path,
            "HTTP server listening"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                loop {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}
