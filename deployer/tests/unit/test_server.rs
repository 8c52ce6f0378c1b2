//! REST API tests

mod common;

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use common::*;
use deploy_api::{ExecuteResponse, PlanCreated, Strategy};
use fwdeploy::server::{router, ServerState};
use fwdeploy::storage::settings::AuthSettings;
use jsonwebtoken::{encode, EncodingKey, Header};
use secrecy::SecretString;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app(harness: &Harness, auth: AuthSettings) -> Router {
    router(Arc::new(ServerState::new(
        harness.orchestrator.clone(),
        auth,
        vec!["slack".to_string()],
    )))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn plan_body(environment: &str, version: &str) -> Value {
    json!({
        "name": "API rollout",
        "firmware_version": version,
        "source_environment": "development",
        "target_environment": environment,
        "strategy": "immediate",
        "device_filters": {"device_type": "ESP32"}
    })
}

async fn create_plan(app: &Router, environment: &str, version: &str) -> String {
    let (status, body) = send(app, post("/api/plans", plan_body(environment, version))).await;
    assert_eq!(status, StatusCode::CREATED);
    let created: PlanCreated = serde_json::from_value(body).unwrap();
    created.plan_id
}

#[tokio::test]
async fn test_health_endpoint() {
    let harness = Harness::new(1, vec![development()]);
    let app = app(&harness, AuthSettings::default());

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_plan_lifecycle() {
    let harness = Harness::new(3, vec![development()]);
    let app = app(&harness, AuthSettings::default());

    let plan_id = create_plan(&app, "development", "1.2.0").await;
    let (status, body) = send(&app, get(&format!("/api/plans/{}", plan_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["firmware_version"], "1.2.0");

    let (status, body) = send(
        &app,
        post(&format!("/api/plans/{}/validate", plan_id), Value::Null),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);

    let (status, body) = send(
        &app,
        post(&format!("/api/plans/{}/execute", plan_id), Value::Null),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let started: ExecuteResponse = serde_json::from_value(body).unwrap();

    let exec = harness.wait_terminal(&started.execution_id).await;
    assert_eq!(exec.plan.strategy, Strategy::Immediate);

    let (status, body) = send(
        &app,
        get(&format!("/api/executions/{}", started.execution_id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["progress"], 100.0);

    let (status, body) = send(&app, get("/api/executions")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    let (status, body) = send(
        &app,
        get(&format!("/api/executions/{}/report", started.execution_id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["devices_successful"], 3);

    let (status, body) = send(&app, get("/api/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["completed_deployments"], 1);

    let (status, body) = send(&app, get("/api/reports/summary?days=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["period_days"], 1);
}

#[tokio::test]
async fn test_execute_refusals() {
    let harness = Harness::new(3, vec![development(), production()]);
    let app = app(&harness, AuthSettings::default());

    let unapproved = create_plan(&app, "production", "1.2.0").await;
    let (status, body) = send(
        &app,
        post(&format!("/api/plans/{}/execute", unapproved), Value::Null),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "approval required");

    let (status, _) = send(
        &app,
        post(
            &format!("/api/plans/{}/approve", unapproved),
            json!({"approver": "ops_lead"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &app,
        post(&format!("/api/plans/{}/execute", unapproved), Value::Null),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let invalid = create_plan(&app, "development", "1.2").await;
    let (status, body) = send(
        &app,
        post(&format!("/api/plans/{}/execute", invalid), Value::Null),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation failed");
    assert_eq!(body["details"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_not_found() {
    let harness = Harness::new(1, vec![development()]);
    let app = app(&harness, AuthSettings::default());

    let (status, body) = send(&app, post("/api/plans/plan_missing/execute", Value::Null)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "deployment plan not found");

    let (status, _) = send(&app, get("/api/executions/exec_missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, get("/api/environments/staging")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, post("/api/executions/exec_missing/rollback", Value::Null)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_environments() {
    let harness = Harness::new(1, vec![development(), production()]);
    let app = app(&harness, AuthSettings::default());

    let (status, body) = send(&app, get("/api/environments")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);

    let (status, body) = send(&app, get("/api/environments/production/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active_deployments"], 0);
}

#[tokio::test]
async fn test_api_key_auth() {
    let harness = Harness::new(1, vec![development()]);
    let app = app(
        &harness,
        AuthSettings {
            api_key: Some(SecretString::from("key".to_string())),
            jwt_secret: None,
        },
    );

    let (status, body) = send(&app, get("/api/plans")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let request = Request::builder()
        .uri("/api/plans")
        .header("X-API-Key", "key")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    let request = Request::builder()
        .uri("/api/plans")
        .header("X-API-Key", "wrong")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_bearer_auth() {
    let harness = Harness::new(1, vec![development()]);
    let app = app(
        &harness,
        AuthSettings {
            api_key: None,
            jwt_secret: Some(SecretString::from("secret".to_string())),
        },
    );

    let claims = json!({
        "sub": "ops_lead",
        "exp": chrono::Utc::now().timestamp() + 3600,
    });
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"secret"),
    );
    let token = tokio_test::assert_ok!(token);

    let request = Request::builder()
        .uri("/api/metrics")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    let forged = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"other"),
    )
    .unwrap();
    let request = Request::builder()
        .uri("/api/metrics")
        .header(header::AUTHORIZATION, format!("Bearer {}", forged))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
