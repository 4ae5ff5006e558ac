//! Best-effort diagnostics endpoint.
//!
//! Serves Prometheus metrics and tokio runtime counters on a side channel.
//! Bind failures are logged and counted, never propagated: the management
//! API runs whether or not this endpoint does.

use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::ExecutionContext;
use crate::lifecycle::subsystem::Diagnostics;
use crate::observability::metrics;

/// Diagnostics endpoint bound to an optional address.
#[derive(Debug, Clone)]
pub struct DiagnosticsEndpoint {
    address: Option<String>,
}

impl DiagnosticsEndpoint {
    /// `None` disables the endpoint.
    pub fn new(address: Option<String>) -> Self {
        Self { address }
    }
}

impl Diagnostics for DiagnosticsEndpoint {
    fn start(&self, ctx: &ExecutionContext) {
        // Fire and forget; shutdown is not awaited.
        let _ = start(self.address.as_deref(), ctx);
    }
}

/// Start the endpoint in the background.
///
/// Returns `None` when `address` is unset or empty. The task ends on bind
/// failure or once `ctx` is cancelled.
pub fn start(address: Option<&str>, ctx: &ExecutionContext) -> Option<JoinHandle<()>> {
    let address = address.map(str::trim).filter(|a| !a.is_empty())?.to_string();
    let ctx = ctx.clone();

    Some(tokio::spawn(async move {
        let listener = match TcpListener::bind(&address).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::warn!(
                    address = %address,
                    error = %e,
                    "Diagnostics endpoint failed to bind; continuing without it"
                );
                metrics::record_diagnostics_bind_failure();
                return;
            }
        };

        match listener.local_addr() {
            Ok(local) => tracing::info!(address = %local, "Diagnostics endpoint listening"),
            Err(_) => tracing::info!(address = %address, "Diagnostics endpoint listening"),
        }

        if let Err(e) = axum::serve(listener, router())
            .with_graceful_shutdown(ctx.cancelled_owned())
            .await
        {
            tracing::warn!(error = %e, "Diagnostics endpoint stopped with error");
        }
    }))
}

fn router() -> Router {
    Router::new()
        .route("/metrics", get(prometheus))
        .route("/debug/runtime", get(runtime))
}

async fn prometheus() -> impl IntoResponse {
    match metrics::render() {
        Some(text) => (StatusCode::OK, text),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed".to_string(),
        ),
    }
}

#[derive(Debug, Serialize)]
struct RuntimeStats {
    workers: usize,
    alive_tasks: usize,
}

async fn runtime() -> Json<RuntimeStats> {
    let stats = tokio::runtime::Handle::current().metrics();
    Json(RuntimeStats {
        workers: stats.num_workers(),
        alive_tasks: stats.num_alive_tasks(),
    })
}
