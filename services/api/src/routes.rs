use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use scheme_eligibility::eligibility::{
    eligibility_router, EligibilityService, IssueReporter, RuleRepository,
};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_eligibility_routes<R, I>(
    service: Arc<EligibilityService<R, I>>,
) -> axum::Router
where
    R: RuleRepository + 'static,
    I: IssueReporter + 'static,
{
    eligibility_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/admin/rule-issues",
            axum::routing::get(rule_issues_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "loading rules" })
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

/// Misconfigured rules seen by evaluations since startup, latest report per rule.
pub(crate) async fn rule_issues_endpoint(
    Extension(state): Extension<AppState>,
) -> impl IntoResponse {
    let issues = state.issues.issues();
    Json(json!({ "count": issues.len(), "issues": issues }))
}
