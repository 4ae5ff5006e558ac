//! Management API handler tree.
//!
//! # Responsibilities
//! - Build the Axum Router shared by the HTTP and HTTPS listeners
//! - Wire up middleware (request ID, tracing, timeout, metrics)
//! - Serve the built-in public endpoints
//!
//! The resource API proper is mounted by downstream components; this module
//! only carries the routes the server itself owns.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{Request, State},
    http::Request as HttpRequest,
    middleware::{self, Next},
    response::Response,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::cli::{GIT_COMMIT, VERSION};
use crate::config::StartupOptions;
use crate::http::request::{request_id, MakeRequestUuidV4, X_REQUEST_ID};
use crate::observability::metrics;

/// Upper bound on a single request. Must stay below the default shutdown grace.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Mode reported when none is configured.
pub const DEFAULT_AUTHENTICATION_MODE: &str = "kubernetesCredentials";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct ApiState {
    options: Arc<StartupOptions>,
}

impl ApiState {
    pub fn new(options: Arc<StartupOptions>) -> Self {
        Self { options }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VersionInfo {
    version: &'static str,
    git_commit: &'static str,
}

#[derive(Debug, Serialize)]
struct AuthModes {
    modes: Vec<String>,
}

/// Build the router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/version", get(version))
        .route("/v1-public/auth-modes", get(auth_modes))
        .with_state(state)
        .layer(middleware::from_fn(track_requests))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &HttpRequest<Body>| {
            tracing::info_span!(
                "request",
                request_id = request_id(request).unwrap_or("unknown"),
                method = %request.method(),
                path = %request.uri().path(),
            )
        }))
        .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuidV4))
}

async fn healthz() -> &'static str {
    "ok"
}

async fn version() -> Json<VersionInfo> {
    Json(VersionInfo {
        version: VERSION,
        git_commit: GIT_COMMIT,
    })
}

async fn auth_modes(State(state): State<ApiState>) -> Json<AuthModes> {
    let modes = if state.options.authentication_modes.is_empty() {
        vec![DEFAULT_AUTHENTICATION_MODE.to_string()]
    } else {
        state.options.authentication_modes.clone()
    };
    Json(AuthModes { modes })
}

async fn track_requests(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let response = next.run(request).await;
    metrics::record_request(method.as_str(), response.status().as_u16(), start);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{validate, RawOptions};
    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn state(auth_mode: Option<&str>) -> ApiState {
        let options = validate(RawOptions {
            namespace: Some("ns1".into()),
            image_storage_endpoint: Some("http://s3:9000".into()),
            image_storage_access_key: Some("a".into()),
            image_storage_secret_key: Some("b".into()),
            authentication_mode: auth_mode.map(str::to_string),
            ..Default::default()
        })
        .unwrap();
        ApiState::new(Arc::new(options))
    }

    async fn get_body(router: Router, uri: &str) -> (StatusCode, Option<String>, String) {
        let response = router
            .oneshot(HttpRequest::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let id = response
            .headers()
            .get(X_REQUEST_ID)
            .map(|v| v.to_str().unwrap().to_string());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, id, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn healthz_answers_with_request_id() {
        let (status, id, body) = get_body(build_router(state(None)), "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
        assert!(id.is_some());
    }

    #[tokio::test]
    async fn auth_modes_default_to_kubernetes_credentials() {
        let (_, _, body) = get_body(build_router(state(None)), "/v1-public/auth-modes").await;
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["modes"], serde_json::json!(["kubernetesCredentials"]));
    }

    #[tokio::test]
    async fn auth_modes_reflect_configuration() {
        let router = build_router(state(Some("localUser,kubernetesCredentials")));
        let (_, _, body) = get_body(router, "/v1-public/auth-modes").await;
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["modes"], serde_json::json!(["localUser", "kubernetesCredentials"]));
    }

    #[tokio::test]
    async fn version_reports_commit() {
        let (_, _, body) = get_body(build_router(state(None)), "/version").await;
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["version"], VERSION);
        assert_eq!(json["gitCommit"], GIT_COMMIT);
    }

    #[test]
    fn requests_time_out_within_default_grace() {
        use crate::config::schema::DEFAULT_SHUTDOWN_GRACE_SECS;
        assert!(REQUEST_TIMEOUT < Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS));
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let (status, _, _) = get_body(build_router(state(None)), "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
