use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::eligibility::router::{eligibility_handler, EligibilityRequest};
use crate::eligibility::EligibilityService;

fn json_request(method: &str, uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request builds")
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}

fn age_payload(value: &str, effective_from: &str) -> Value {
    json!({
        "schemeId": SCHEME,
        "name": "Senior citizen",
        "type": "AGE",
        "operator": "GTE",
        "value": value,
        "mandatory": true,
        "priority": 10,
        "effectiveFrom": effective_from,
    })
}

#[tokio::test]
async fn create_route_returns_created_rule() {
    let (service, _, _) = build_service();
    let router = router_with_service(service);

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/rules",
            age_payload("60", "2024-01-01"),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json_body(response).await;
    assert_eq!(body["version"], 1);
    assert_eq!(body["type"], "AGE");
    assert_eq!(body["expression"], "age >= 60");
    assert_eq!(body["effectiveFrom"], "2024-01-01");
}

#[tokio::test]
async fn create_route_rejects_invalid_rule() {
    let (service, _, _) = build_service();
    let router = router_with_service(service);
    let mut payload = age_payload("sixty", "2024-01-01");
    payload["type"] = json!("INCOME");

    let response = router
        .oneshot(json_request("POST", "/api/v1/rules", payload))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json_body(response).await;
    assert!(body["error"]
        .as_str()
        .expect("error message")
        .contains("sixty"));
}

#[tokio::test]
async fn retroactive_revision_returns_conflict() {
    let (service, _, _) = build_service();
    let first = service.create_rule(age_draft()).expect("created");
    let router = router_with_service(service);

    let response = router
        .oneshot(json_request(
            "PUT",
            &format!("/api/v1/rules/{}", first.id),
            age_payload("58", "2023-01-01"),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn revision_route_appends_version() {
    let (service, _, _) = build_service();
    let first = service.create_rule(age_draft()).expect("created");
    let router = router_with_service(service);

    let response = router
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/v1/rules/{}", first.id),
            age_payload("58", "2025-04-01"),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::CREATED);
    let revised = read_json_body(response).await;
    assert_eq!(revised["version"], 2);

    let response = router
        .oneshot(empty_request(
            "GET",
            &format!("/api/v1/rules/{}/versions", first.id),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let versions = read_json_body(response).await;
    let versions = versions.as_array().expect("version list");
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0]["effectiveTo"], "2025-03-31");
}

#[tokio::test]
async fn unknown_rule_returns_not_found() {
    let (service, _, _) = build_service();
    let router = router_with_service(service);

    let response = router
        .oneshot(empty_request("GET", "/api/v1/rules/rule-unknown"))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_route_retires_rule_as_of_date() {
    let (service, _, _) = build_service();
    let rule = service.create_rule(age_draft()).expect("created");
    let router = router_with_service(service);

    let response = router
        .clone()
        .oneshot(empty_request(
            "DELETE",
            &format!("/api/v1/rules/{}?asOf=2025-02-01", rule.id),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let retired = read_json_body(response).await;
    assert_eq!(retired["effectiveTo"], "2025-01-31");

    let response = router
        .oneshot(empty_request(
            "GET",
            &format!("/api/v1/schemes/{SCHEME}/rules?asOf=2025-02-01"),
        ))
        .await
        .expect("router responds");
    let active = read_json_body(response).await;
    assert_eq!(active, json!([]));
}

#[tokio::test]
async fn eligibility_route_returns_verdict() {
    let (service, _, _) = build_service();
    service.create_rule(age_draft()).expect("created");
    let router = router_with_service(service);

    let response = router
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/schemes/{SCHEME}/eligibility"),
            json!({ "age": 65, "district": "jaipur", "asOf": "2025-06-01" }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["eligible"], true);
    assert_eq!(body["confidence"], 100);
    assert_eq!(body["satisfiedReasons"], json!(["age 65 >= 60"]));
    assert_eq!(body["evaluatedOn"], "2025-06-01");
}

#[tokio::test]
async fn test_route_reports_outcome() {
    let (service, _, _) = build_service();
    let router = router_with_service(service);

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/rules/test",
            json!({
                "rule": { "type": "GEOGRAPHY", "operator": "DISTRICT_IN", "value": "Jaipur,Jodhpur" },
                "testSnapshot": { "district": "Jodhpur" },
            }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["outcome"], "SATISFIED");
    assert_eq!(body["expression"], "district in [Jaipur, Jodhpur]");
}

#[tokio::test]
async fn eligibility_handler_hides_repository_failures() {
    let service = Arc::new(EligibilityService::new(
        Arc::new(UnavailableRepository),
        Arc::new(MemoryIssues::default()),
        4,
    ));
    let request = EligibilityRequest {
        as_of: Some(date(2025, 6, 1)),
        snapshot: senior_snapshot(65),
    };

    let response = eligibility_handler::<UnavailableRepository, MemoryIssues>(
        State(service),
        Path(SCHEME.to_string()),
        axum::Json(request),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = read_json_body(response).await;
    assert!(!body["error"]
        .as_str()
        .expect("error message")
        .contains("database"));
}
