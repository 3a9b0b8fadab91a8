//! End-to-end tests against a real in-process router and `AppState::test()`
//! storage. No mocks: every request goes through auth middleware, the
//! engine, and the vault exactly as production wiring would.

use std::sync::Arc;

use axum_test::TestServer;
use serde_json::json;

use flowrunner_api::{create_router, AppState};

const MINIMAL_FLOW: &str = r#"
metadata:
  name: greet
nodes:
  start:
    type: base
"#;

fn server() -> TestServer {
    let state = Arc::new(AppState::test());
    TestServer::new(create_router(state)).unwrap()
}

#[tokio::test]
async fn health_check_is_public() {
    let server = server();
    let response = server.get("/health").await;
    response.assert_status_ok();
}

#[tokio::test]
async fn protected_route_without_credentials_is_unauthenticated() {
    let server = server();
    let response = server.get("/api/v1/flows").await;
    response.assert_status_unauthorized();
}

async fn create_account_and_login(server: &TestServer, username: &str) -> String {
    server
        .post("/api/v1/accounts")
        .json(&json!({"username": username, "password": "correct horse battery staple"}))
        .await
        .assert_status(axum::http::StatusCode::CREATED);

    let login = server
        .post("/api/v1/login")
        .json(&json!({"username": username, "password": "correct horse battery staple"}))
        .await;
    login.assert_status_ok();
    login.json::<serde_json::Value>()["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn create_flow_list_and_run() {
    let server = server();
    let token = create_account_and_login(&server, "alice").await;

    let created = server
        .post("/api/v1/flows")
        .authorization_bearer(&token)
        .json(&json!({"yaml": MINIMAL_FLOW}))
        .await;
    created.assert_status(axum::http::StatusCode::CREATED);
    let flow_id = created.json::<serde_json::Value>()["id"].as_str().unwrap().to_string();

    let list = server.get("/api/v1/flows").authorization_bearer(&token).await;
    list.assert_status_ok();
    let flows = list.json::<Vec<serde_json::Value>>();
    assert_eq!(flows.len(), 1);

    let run = server
        .post(&format!("/api/v1/flows/{flow_id}/run"))
        .authorization_bearer(&token)
        .json(&json!({"input": {}}))
        .await;
    run.assert_status(axum::http::StatusCode::CREATED);
    let body = run.json::<serde_json::Value>();
    assert_eq!(body["status"], "running");
    assert!(body["execution_id"].as_str().is_some());
}

#[tokio::test]
async fn invalid_flow_yaml_is_rejected() {
    let server = server();
    let token = create_account_and_login(&server, "bob").await;

    let response = server
        .post("/api/v1/flows")
        .authorization_bearer(&token)
        .json(&json!({"yaml": "not: [valid, flow"}))
        .await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn cross_account_flow_access_reads_as_not_found() {
    let server = server();
    let alice_token = create_account_and_login(&server, "carol").await;
    let dave_token = create_account_and_login(&server, "dave").await;

    let created = server
        .post("/api/v1/flows")
        .authorization_bearer(&alice_token)
        .json(&json!({"yaml": MINIMAL_FLOW}))
        .await;
    let flow_id = created.json::<serde_json::Value>()["id"].as_str().unwrap().to_string();

    let response = server
        .get(&format!("/api/v1/flows/{flow_id}"))
        .authorization_bearer(&dave_token)
        .await;
    response.assert_status_not_found();
}

#[tokio::test]
async fn secret_route_rejects_a_foreign_account_id() {
    let server = server();
    let token = create_account_and_login(&server, "erin").await;

    // "not-erin" never equals the authenticated caller's own account id, so
    // this must read as not found rather than leak whether the account exists.
    let response = server
        .post("/api/v1/accounts/not-erin/secrets/API_KEY")
        .authorization_bearer(&token)
        .json(&json!({"value": "sk-test"}))
        .await;
    response.assert_status_not_found();
}

#[tokio::test]
async fn unknown_execution_is_not_found() {
    let server = server();
    let token = create_account_and_login(&server, "frank2").await;

    let response = server
        .get("/api/v1/executions/exec_does_not_exist")
        .authorization_bearer(&token)
        .await;
    response.assert_status_not_found();
}

#[tokio::test]
async fn plugins_list_includes_base_node() {
    let server = server();
    let token = create_account_and_login(&server, "grace").await;

    let response = server.get("/api/v1/plugins").authorization_bearer(&token).await;
    response.assert_status_ok();
    let plugins = response.json::<Vec<serde_json::Value>>();
    assert!(plugins.iter().any(|p| p["name"] == "base"));
}
