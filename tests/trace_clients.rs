#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Trace client contract tests.
//!
//! Verify the HTTP shape each provider client sends (path, auth, body) and
//! that non-2xx answers surface as `TraceError::Client`.

use std::sync::Arc;

use chrono::Utc;
use opstrace::TraceError;
use opstrace::clients::{LangSmithClient, LangfuseClient, TraceClient};
use opstrace::providers::{LangSmithConfig, LangfuseConfig};
use opstrace::queue::{TimerWindow, TraceEvent, TraceTask, TraceTaskKind};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn langfuse(server: &MockServer) -> Arc<LangfuseClient> {
    Arc::new(LangfuseClient::new(
        LangfuseConfig {
            public_key: "pk-lf-test".into(),
            secret_key: "sk-lf-test".into(),
            host: format!("{}/", server.uri()),
        },
        reqwest::Client::new(),
    ))
}

fn langsmith(server: &MockServer) -> Arc<LangSmithClient> {
    Arc::new(LangSmithClient::new(
        LangSmithConfig {
            api_key: "lsv2_pt_test".into(),
            project: "support-bot".into(),
            endpoint: server.uri(),
        },
        reqwest::Client::new(),
    ))
}

fn moderation_task(client: Arc<dyn TraceClient>) -> TraceTask {
    let now = Utc::now();
    TraceTask::new(
        TraceTaskKind::Moderation,
        "msg-42",
        client,
        TraceEvent {
            name: "moderation".into(),
            inputs: json!({"a": "bad words"}),
            outputs: json!({"flagged": true, "action": "direct_output"}),
            timer: TimerWindow {
                start: now,
                end: now,
            },
            metadata: json!({"app_id": "app-1"}),
        },
    )
}

// ────────────────────────────────────────────────────────────────────────────
// Langfuse
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn langfuse_posts_span_to_ingestion_with_basic_auth() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/public/ingestion"))
        .and(header_exists("authorization"))
        .and(body_partial_json(json!({
            "batch": [{
                "type": "span-create",
                "body": {
                    "traceId": "msg-42",
                    "name": "moderation",
                    "input": {"a": "bad words"}
                }
            }]
        })))
        .respond_with(ResponseTemplate::new(207).set_body_json(json!({"successes": [], "errors": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = langfuse(&server);
    let task = moderation_task(client.clone());
    let result = client.send(&task).await;
    assert!(result.is_ok(), "{result:?}");
}

#[tokio::test]
async fn langfuse_trims_trailing_slash_from_host() {
    let server = MockServer::start().await;
    let client = langfuse(&server);
    assert_eq!(client.host(), server.uri());
}

#[tokio::test]
async fn langfuse_unauthorized_is_client_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/public/ingestion"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid credentials"))
        .expect(1)
        .mount(&server)
        .await;

    let client = langfuse(&server);
    let task = moderation_task(client.clone());
    match client.send(&task).await {
        Err(TraceError::Client(msg)) => {
            assert!(msg.contains("401"), "{msg}");
            assert!(msg.contains("invalid credentials"), "{msg}");
        }
        other => panic!("expected client error, got {other:?}"),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// LangSmith
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn langsmith_posts_run_with_api_key() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/runs"))
        .and(header("x-api-key", "lsv2_pt_test"))
        .and(body_partial_json(json!({
            "name": "moderation",
            "run_type": "tool",
            "session_name": "support-bot",
            "tags": ["moderation"]
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let client = langsmith(&server);
    let task = moderation_task(client.clone());
    assert!(client.send(&task).await.is_ok());
}

#[tokio::test]
async fn langsmith_server_error_is_client_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/runs"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = langsmith(&server);
    let task = moderation_task(client.clone());
    let err = client.send(&task).await.unwrap_err();
    assert_eq!(err.code(), "CLIENT_FAILED");
    assert_eq!(err.status_code(), 502);
}

#[tokio::test]
async fn client_debug_never_prints_secrets() {
    let server = MockServer::start().await;
    let lf = format!("{:?}", langfuse(&server));
    let ls = format!("{:?}", langsmith(&server));
    assert!(!lf.contains("sk-lf-test"));
    assert!(!lf.contains("pk-lf-test"));
    assert!(!ls.contains("lsv2_pt_test"));
    assert!(ls.contains("support-bot"));
}
