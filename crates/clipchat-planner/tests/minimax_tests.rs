//! MiniMax planner tests against a mock server.

use std::time::Duration;

use clipchat_models::ChatMessage;
use clipchat_planner::{MiniMaxPlanner, PlanRequest, Planner, PlannerConfig, PlannerError};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ENDPOINT: &str = "/v1/text/chatcompletion_v2";

fn planner(server: &MockServer, max_retries: u32) -> MiniMaxPlanner {
    MiniMaxPlanner::new(PlannerConfig {
        base_url: server.uri(),
        api_key: "test-key".to_string(),
        timeout: Duration::from_secs(5),
        max_retries,
        ..Default::default()
    })
    .unwrap()
}

fn request() -> PlanRequest {
    PlanRequest::new("https://example/video", vec![ChatMessage::user("3 clips")])
}

#[tokio::test]
async fn test_plan_returns_config() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({"model": "MiniMax-M2.5", "temperature": 0.2})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "{\"clipCount\": 3}"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = planner(&server, 0).plan(&request()).await.unwrap();
    assert_eq!(config, json!({"clipCount": 3}));
}

#[tokio::test]
async fn test_error_status_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .expect(1)
        .mount(&server)
        .await;

    let err = planner(&server, 2).plan(&request()).await.unwrap_err();
    match err {
        PlannerError::Status { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body, "bad key");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"reply": "{\"clipCount\": 1}"})))
        .mount(&server)
        .await;

    let config = planner(&server, 1).plan(&request()).await.unwrap();
    assert_eq!(config["clipCount"], 1);
}

#[tokio::test]
async fn test_missing_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let err = planner(&server, 0).plan(&request()).await.unwrap_err();
    assert!(matches!(err, PlannerError::MissingContent));
}
