use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use optimizer_agents::ChatConfig;
use optimizer_api::{build_app_with, ApiConfig};
use serde_json::{json, Value};
use tower::ServiceExt;

const API_KEY: &str = "test-optimizer-key";

fn app() -> Router {
    build_app_with(ApiConfig {
        chat: ChatConfig::default(),
        api_key: API_KEY.to_string(),
        rate_limit_window: Duration::from_secs(60),
        rate_limit_max: 100,
    })
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-api-key", API_KEY)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-api-key", API_KEY)
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["metrics"]["messages_total"], 0);
}

#[tokio::test]
async fn route_requires_api_key() {
    let request = Request::builder()
        .method("POST")
        .uri("/v1/route")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "text": "tank levels" }).to_string()))
        .unwrap();

    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn route_preview_reports_deferred_comparison() {
    let response = app()
        .oneshot(post(
            "/v1/route",
            json!({ "text": "Compare all scenarios", "crisis_triggered": true }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["category"], "crisis");
    assert_eq!(body["rule"], "crisis_compare");
    assert_eq!(body["immediate"]["type"], "show_scenario_b");
    assert_eq!(body["deferred"]["action"]["type"], "show_scenario_c");
    assert_eq!(body["deferred"]["delay"], 1500);
}

#[tokio::test]
async fn route_preview_respects_shown_sections() {
    let response = app()
        .oneshot(post(
            "/v1/route",
            json!({
                "text": "yes",
                "crisis_triggered": true,
                "shown_sections": ["scenario_a"]
            }),
        ))
        .await
        .unwrap();

    let body = json_body(response).await;
    assert_eq!(body["rule"], "scenario_already_shown");
    assert_eq!(body["immediate"]["type"], "system_message");
}

#[tokio::test]
async fn route_preview_trims_like_conversations() {
    let response = app()
        .oneshot(post(
            "/v1/route",
            json!({ "text": "  yes ", "crisis_triggered": true }),
        ))
        .await
        .unwrap();

    let body = json_body(response).await;
    assert_eq!(body["rule"], "scenario_first_show");
    assert_eq!(body["immediate"]["type"], "show_scenarios");
}

#[tokio::test]
async fn conversation_flow_tracks_shown_sections() {
    let app = app();

    let response = app
        .clone()
        .oneshot(post("/v1/conversations", json!({ "crisis_triggered": true })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = json_body(response).await["conversation_id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .clone()
        .oneshot(post(
            &format!("/v1/conversations/{id}/messages"),
            json!({ "text": "what do you recommend?" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["decision"]["rule"], "scenario_first_show");
    assert_eq!(body["entries"][0]["section"]["section"], "scenario_a");
    assert_eq!(body["state"]["shown_sections"], json!(["scenario_a"]));

    let response = app
        .clone()
        .oneshot(get(&format!("/v1/conversations/{id}")))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["transcript"].as_array().unwrap().len(), 2);
    assert_eq!(body["transcript"][0]["kind"], "user");
}

#[tokio::test]
async fn unknown_conversation_is_not_found() {
    let response = app()
        .oneshot(post(
            "/v1/conversations/does-not-exist/messages",
            json!({ "text": "hello" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"], "conversation_not_found");
}

#[tokio::test]
async fn crisis_event_switches_conversations() {
    let app = app();

    let response = app
        .clone()
        .oneshot(post("/v1/conversations", json!({})))
        .await
        .unwrap();
    let id = json_body(response).await["conversation_id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .clone()
        .oneshot(post(
            "/v1/events",
            json!({
                "type": "crisis_triggered",
                "source": "production",
                "data": { "unit": "ME5" }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = json_body(response).await;
    assert_eq!(body["conversations_switched"], 1);
    assert_eq!(body["event"]["demo_trigger"], true);

    let response = app
        .clone()
        .oneshot(get("/v1/events/latest"))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["type"], "crisis_triggered");

    let response = app
        .clone()
        .oneshot(post(
            &format!("/v1/conversations/{id}/messages"),
            json!({ "text": "xyz" }),
        ))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["decision"]["category"], "fallback");
    assert_eq!(body["state"]["crisis_triggered"], true);
}

#[tokio::test]
async fn fresh_login_resolves_to_role_dashboard() {
    let session = json!({
        "name": "Priya",
        "role": "sales",
        "loginTime": chrono::Utc::now().to_rfc3339(),
        "permissions": { "dashboards": ["sales", "hub"] }
    });

    let response = app()
        .oneshot(post(
            "/v1/session/resolve",
            json!({
                "session_json": session.to_string(),
                "nav_hrefs": ["index-new.html", "sales-new.html", "optimizer-new.html"]
            }),
        ))
        .await
        .unwrap();

    let body = json_body(response).await;
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["title"], "Regional Sales Manager");
    assert_eq!(body["redirect_page"], "sales-new.html");
    assert_eq!(body["visible_hrefs"], json!(["index-new.html", "sales-new.html"]));
}

#[tokio::test]
async fn missing_session_redirects_to_login() {
    let response = app()
        .oneshot(post("/v1/session/resolve", json!({})))
        .await
        .unwrap();

    let body = json_body(response).await;
    assert_eq!(body["authenticated"], false);
    assert_eq!(body["redirect_page"], "login.html");
}
