use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use dealdesk::workflows::ports::{AuthError, IdentityProvider};
use dealdesk::workflows::{platform_router, Platform};
use serde_json::json;
use tracing::debug;

use crate::infra::AppState;

/// Probes and metrics stay open; every workflow route needs a bearer token.
pub(crate) fn with_platform_routes(
    platform: &Platform,
    identity: Arc<dyn IdentityProvider>,
) -> Router {
    let workflows =
        platform_router(platform).route_layer(middleware::from_fn_with_state(identity, authenticate));
    Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .merge(workflows)
}

async fn authenticate(
    State(identity): State<Arc<dyn IdentityProvider>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .unwrap_or_default();
    match identity.authenticate(token) {
        Ok(principal) => {
            debug!(principal = %principal.id, role = %principal.role, "request authenticated");
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(err) => unauthorized(&err),
    }
}

fn unauthorized(err: &AuthError) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Bearer")],
        Json(json!({ "error": err.to_string(), "kind": "unauthenticated" })),
    )
        .into_response()
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use axum::body::{to_bytes, Body};
    use axum::http::Request as HttpRequest;
    use dealdesk::config::{ApiToken, AuthConfig};
    use dealdesk::workflows::common::Role;
    use dealdesk::workflows::Context;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::infra::StaticTokenIdentity;

    fn app(ready: bool) -> Router {
        let identity = StaticTokenIdentity::from_config(&AuthConfig {
            cron_secret: Some("cron-s3cret".to_string()),
            api_tokens: vec![ApiToken {
                token: "tok-sales".to_string(),
                principal_id: "sales-1".to_string(),
                role: Role::Sales,
            }],
        });
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        let platform = Platform::new(Context::in_memory());
        with_platform_routes(&platform, Arc::new(identity)).layer(Extension(state))
    }

    async fn call(router: Router, method: &str, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut request = HttpRequest::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let response = router
            .oneshot(request.body(Body::empty()).expect("request"))
            .await
            .expect("router response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn probes_do_not_need_a_token() {
        let (status, body) = call(app(true), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = call(app(false), "GET", "/ready", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "initializing");

        let (status, _) = call(app(true), "GET", "/metrics", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn workflow_routes_reject_missing_or_unknown_tokens() {
        let (status, body) = call(app(true), "GET", "/nbfc", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["kind"], "unauthenticated");

        let (status, _) = call(app(true), "GET", "/nbfc", Some("forged")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn tokens_carry_their_role_into_the_workflows() {
        let (status, body) = call(app(true), "GET", "/nbfc", Some("tok-sales")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::Array(Vec::new()));

        let (status, body) = call(app(true), "POST", "/cron/run/all", Some("tok-sales")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["kind"], "authorization");
    }

    #[tokio::test]
    async fn cron_secret_runs_the_sweeps() {
        let (status, body) = call(app(true), "POST", "/cron/run/all", Some("cron-s3cret")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (status, body) = call(app(true), "GET", "/cron/status", Some("cron-s3cret")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["running"], false);
    }
}
