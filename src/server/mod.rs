//! HTTP front-end.
//!
//! - `GET /`            upload page
//! - `GET /api/health`  liveness plus transcoder version
//! - `POST /api/convert` multipart `media` + `cover` → muxed file

pub mod convert;
pub mod error;
pub mod state;


use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::Result;
pub use error::ServerError;
pub use state::AppState;

const INDEX_HTML: &str = include_str!("index.html");

/// Build the router over shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.max_upload_bytes;
    Router::new()
        .route("/", get(index))
        .route("/api/health", get(health))
        .route("/api/convert", post(convert::convert))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let transcoder = state
        .transcoder
        .version_info()
        .await
        .unwrap_or_else(|_| "unavailable".to_string());
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "transcoder": transcoder,
    }))
}

/// Bind and serve until SIGINT/SIGTERM.
pub async fn serve(bind_address: &str, state: Arc<AppState>) -> Result<()> {
    tokio::fs::create_dir_all(&state.scratch_dir).await?;
    info!(scratch_dir = %state.scratch_dir.display(), "scratch directory ready");

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!(addr = %listener.local_addr()?, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

/// Resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => { s.recv().await; }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
