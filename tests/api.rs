use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use serde_json::{Value, json};
use summit_quiz_back::{
    config::AppConfig,
    dao::{
        event_store::{EventStore, MemoryEventStore},
        models::ContentBundle,
    },
    routes,
    state::{AppState, SharedState, content::TeamProfile},
};
use tower::ServiceExt;
use uuid::Uuid;

async fn connected_state() -> (SharedState, Vec<TeamProfile>) {
    let teams = vec![
        TeamProfile {
            id: Uuid::new_v4(),
            name: "Alpha".into(),
        },
        TeamProfile {
            id: Uuid::new_v4(),
            name: "Bravo".into(),
        },
    ];
    let store = MemoryEventStore::new();
    let content = ContentBundle {
        teams: teams.clone(),
        ..ContentBundle::default()
    };
    EventStore::seed(&store, content).await.unwrap();
    let state = AppState::new(AppConfig::default());
    state.set_event_store(Arc::new(store)).await;
    (state, teams)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn degraded_backend_answers_503_with_category() {
    let app = routes::router(AppState::new(AppConfig::default()));
    let (status, body) = send(&app, Method::GET, "/event", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["category"], "unavailable");

    let (status, body) = send(&app, Method::GET, "/healthcheck", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["storage"], "missing");
}

#[tokio::test]
async fn public_event_starts_in_the_lobby() {
    let (state, teams) = connected_state().await;
    let app = routes::router(state);
    let (status, body) = send(&app, Method::GET, "/event", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["revision"], 0);
    assert_eq!(body["phase"], "lobby");
    assert_eq!(body["teams"][1]["name"], teams[1].name);
}

#[tokio::test]
async fn starting_a_round_twice_is_a_precondition_failure() {
    let (state, _) = connected_state().await;
    let app = routes::router(state);

    let (status, body) = send(&app, Method::POST, "/operator/rounds/3/start", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["snapshot"]["round"], 3);
    assert_eq!(body["snapshot"]["revision"], 1);

    let (status, body) = send(&app, Method::POST, "/operator/rounds/3/start", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["category"], "precondition");
}

#[tokio::test]
async fn unknown_team_is_not_found() {
    let (state, _) = connected_state().await;
    let app = routes::router(state);
    send(&app, Method::POST, "/operator/rounds/1/start", None).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/operator/team",
        Some(json!({ "team_id": Uuid::new_v4() })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["category"], "not_found");
}

#[tokio::test]
async fn malformed_payloads_are_validation_errors() {
    let (state, teams) = connected_state().await;
    let app = routes::router(state);

    let (status, body) = send(
        &app,
        Method::POST,
        "/operator/team",
        Some(json!({ "team": "nope" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["category"], "validation");

    let (status, body) = send(&app, Method::POST, "/operator/package", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["category"], "validation");

    let uri = format!("/teams/{}/answer", teams[0].id);
    let (status, body) = send(
        &app,
        Method::POST,
        &uri,
        Some(json!({ "text": "x".repeat(281) })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["category"], "validation");
}

#[tokio::test]
async fn operator_event_is_readable_in_the_lobby() {
    let (state, _) = connected_state().await;
    let app = routes::router(state);
    let (status, body) = send(&app, Method::GET, "/operator/event", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"], "lobby");
    assert!(body["current_question"].is_null());
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = routes::router(AppState::new(AppConfig::default()));
    let (status, body) = send(&app, Method::GET, "/api-doc/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/operator/rounds/{round}/start"].is_object());
}
