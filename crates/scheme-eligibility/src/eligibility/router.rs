use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::{CitizenSnapshot, RuleDraft, RuleId, SchemeId};
use super::repository::{IssueReporter, RuleRepository};
use super::service::{EligibilityService, EligibilityServiceError, RuleTestRequest};
use super::store::RuleStoreError;

/// Optional evaluation date; defaults to today's local date.
#[derive(Debug, Default, Deserialize)]
pub struct AsOfQuery {
    #[serde(default, rename = "asOf")]
    pub as_of: Option<NaiveDate>,
}

/// Citizen eligibility request: the snapshot fields plus an optional `asOf` date.
#[derive(Debug, Deserialize)]
pub struct EligibilityRequest {
    #[serde(default, rename = "asOf")]
    pub as_of: Option<NaiveDate>,
    #[serde(flatten)]
    pub snapshot: CitizenSnapshot,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Router builder exposing rule administration and eligibility query endpoints.
pub fn eligibility_router<R, I>(service: Arc<EligibilityService<R, I>>) -> Router
where
    R: RuleRepository + 'static,
    I: IssueReporter + 'static,
{
    Router::new()
        .route("/api/v1/rules", post(create_rule_handler::<R, I>))
        .route("/api/v1/rules/test", post(test_rule_handler::<R, I>))
        .route(
            "/api/v1/rules/:rule_id",
            get(get_rule_handler::<R, I>)
                .put(revise_rule_handler::<R, I>)
                .delete(delete_rule_handler::<R, I>),
        )
        .route(
            "/api/v1/rules/:rule_id/versions",
            get(rule_history_handler::<R, I>),
        )
        .route(
            "/api/v1/schemes/:scheme_id/rules",
            get(active_rules_handler::<R, I>),
        )
        .route(
            "/api/v1/schemes/:scheme_id/eligibility",
            post(eligibility_handler::<R, I>),
        )
        .with_state(service)
}

fn admin_error_response(err: EligibilityServiceError) -> Response {
    let status = match &err {
        EligibilityServiceError::Store(RuleStoreError::Validation(_))
        | EligibilityServiceError::Configuration(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EligibilityServiceError::Store(RuleStoreError::Conflict(_)) => StatusCode::CONFLICT,
        EligibilityServiceError::Store(RuleStoreError::NotFound(_)) => StatusCode::NOT_FOUND,
        EligibilityServiceError::Store(RuleStoreError::Repository(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let payload = json!({ "error": err.to_string() });
    (status, axum::Json(payload)).into_response()
}

pub(crate) async fn create_rule_handler<R, I>(
    State(service): State<Arc<EligibilityService<R, I>>>,
    axum::Json(draft): axum::Json<RuleDraft>,
) -> Response
where
    R: RuleRepository + 'static,
    I: IssueReporter + 'static,
{
    match service.create_rule(draft) {
        Ok(rule) => (StatusCode::CREATED, axum::Json(rule)).into_response(),
        Err(err) => admin_error_response(err),
    }
}

pub(crate) async fn revise_rule_handler<R, I>(
    State(service): State<Arc<EligibilityService<R, I>>>,
    Path(rule_id): Path<String>,
    axum::Json(draft): axum::Json<RuleDraft>,
) -> Response
where
    R: RuleRepository + 'static,
    I: IssueReporter + 'static,
{
    match service.revise_rule(&RuleId(rule_id), draft) {
        Ok(rule) => (StatusCode::CREATED, axum::Json(rule)).into_response(),
        Err(err) => admin_error_response(err),
    }
}

pub(crate) async fn get_rule_handler<R, I>(
    State(service): State<Arc<EligibilityService<R, I>>>,
    Path(rule_id): Path<String>,
) -> Response
where
    R: RuleRepository + 'static,
    I: IssueReporter + 'static,
{
    match service.get_rule(&RuleId(rule_id)) {
        Ok(rule) => (StatusCode::OK, axum::Json(rule)).into_response(),
        Err(err) => admin_error_response(err),
    }
}

pub(crate) async fn delete_rule_handler<R, I>(
    State(service): State<Arc<EligibilityService<R, I>>>,
    Path(rule_id): Path<String>,
    Query(query): Query<AsOfQuery>,
) -> Response
where
    R: RuleRepository + 'static,
    I: IssueReporter + 'static,
{
    let as_of = query.as_of.unwrap_or_else(today);
    match service.delete_rule(&RuleId(rule_id), as_of) {
        Ok(rule) => (StatusCode::OK, axum::Json(rule)).into_response(),
        Err(err) => admin_error_response(err),
    }
}

pub(crate) async fn rule_history_handler<R, I>(
    State(service): State<Arc<EligibilityService<R, I>>>,
    Path(rule_id): Path<String>,
) -> Response
where
    R: RuleRepository + 'static,
    I: IssueReporter + 'static,
{
    match service.rule_history(&RuleId(rule_id)) {
        Ok(versions) => (StatusCode::OK, axum::Json(versions)).into_response(),
        Err(err) => admin_error_response(err),
    }
}

pub(crate) async fn active_rules_handler<R, I>(
    State(service): State<Arc<EligibilityService<R, I>>>,
    Path(scheme_id): Path<String>,
    Query(query): Query<AsOfQuery>,
) -> Response
where
    R: RuleRepository + 'static,
    I: IssueReporter + 'static,
{
    let as_of = query.as_of.unwrap_or_else(today);
    match service.list_active_rules(&SchemeId(scheme_id), as_of) {
        Ok(rules) => (StatusCode::OK, axum::Json(rules)).into_response(),
        Err(err) => admin_error_response(err),
    }
}

pub(crate) async fn test_rule_handler<R, I>(
    State(service): State<Arc<EligibilityService<R, I>>>,
    axum::Json(request): axum::Json<RuleTestRequest>,
) -> Response
where
    R: RuleRepository + 'static,
    I: IssueReporter + 'static,
{
    match service.test_rule(request) {
        Ok(response) => (StatusCode::OK, axum::Json(response)).into_response(),
        Err(err) => admin_error_response(err),
    }
}

pub(crate) async fn eligibility_handler<R, I>(
    State(service): State<Arc<EligibilityService<R, I>>>,
    Path(scheme_id): Path<String>,
    axum::Json(request): axum::Json<EligibilityRequest>,
) -> Response
where
    R: RuleRepository + 'static,
    I: IssueReporter + 'static,
{
    let as_of = request.as_of.unwrap_or_else(today);
    let scheme_id = SchemeId(scheme_id);
    match service.check_eligibility(&scheme_id, &request.snapshot, as_of) {
        Ok(result) => (StatusCode::OK, axum::Json(result)).into_response(),
        Err(err) => {
            // citizens never see internal detail
            error!(scheme_id = %scheme_id, error = %err, "eligibility check failed");
            let payload = json!({
                "error": "eligibility check is temporarily unavailable",
            });
            (StatusCode::SERVICE_UNAVAILABLE, axum::Json(payload)).into_response()
        }
    }
}
