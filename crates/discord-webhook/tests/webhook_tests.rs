//! Webhook client against a local stub server.

use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use discord_webhook::{DiscordClient, DiscordError, WebhookConfig, WebhookMessage, DEFAULT_USERNAME};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Clone)]
struct Hook {
    status: StatusCode,
    reply: &'static str,
    seen: Arc<Mutex<Vec<(HashMap<String, String>, Value)>>>,
}

async fn execute(
    State(hook): State<Hook>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> (StatusCode, &'static str) {
    hook.seen.lock().unwrap().push((params, body));
    (hook.status, hook.reply)
}

async fn spawn_hook(status: StatusCode, reply: &'static str) -> (String, Hook) {
    let hook = Hook {
        status,
        reply,
        seen: Arc::new(Mutex::new(Vec::new())),
    };
    let app = Router::new()
        .route("/api/webhooks/1/token", post(execute))
        .with_state(hook.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/api/webhooks/1/token", addr), hook)
}

#[tokio::test]
async fn test_send_text_posts_content_and_username() {
    let (url, hook) = spawn_hook(StatusCode::OK, "{}").await;
    let client = DiscordClient::new(WebhookConfig::new(url)).unwrap();

    client.send_text("🚨 CRITICAL ADVERSE EVENT").await.unwrap();

    let seen = hook.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let (params, body) = &seen[0];
    assert_eq!(params.get("wait").map(String::as_str), Some("true"));
    assert_eq!(body["content"], "🚨 CRITICAL ADVERSE EVENT");
    assert_eq!(body["username"], DEFAULT_USERNAME);
}

#[tokio::test]
async fn test_rate_limit_is_transient() {
    let (url, _hook) = spawn_hook(StatusCode::TOO_MANY_REQUESTS, r#"{"retry_after": 1.5}"#).await;
    let client = DiscordClient::new(WebhookConfig::new(url)).unwrap();

    let err = client.send_text("hello").await.unwrap_err();
    match err {
        DiscordError::RateLimited { retry_after } => assert_eq!(retry_after, Some(1.5)),
        other => panic!("expected rate limit, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rejection_keeps_status_and_body() {
    let (url, _hook) = spawn_hook(StatusCode::BAD_REQUEST, "Unknown Webhook").await;
    let client = DiscordClient::new(WebhookConfig::new(url)).unwrap();

    let err = client.send_text("hello").await.unwrap_err();
    assert!(!err.is_transient());
    match err {
        DiscordError::Rejected { status, body } => {
            assert_eq!(status, 400);
            assert_eq!(body, "Unknown Webhook");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_message_is_not_sent() {
    let (url, hook) = spawn_hook(StatusCode::OK, "{}").await;
    let client = DiscordClient::new(WebhookConfig::new(url)).unwrap();

    assert!(matches!(
        client.send(&WebhookMessage::new("   ")).await,
        Err(DiscordError::EmptyMessage)
    ));
    assert!(hook.seen.lock().unwrap().is_empty());
}
