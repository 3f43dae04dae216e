//! Chat API routes: token resolution, downstream calls and message dumps.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use chatvault::web::MemorySessionStore;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use common::{TOKEN_PATH, TestApp, body_text, location};

fn alice() -> serde_json::Value {
    json!({"sub": "u1", "name": "Alice", "oid": "o1", "tid": "t1"})
}

#[tokio::test]
async fn chats_without_sign_in_redirects_to_login() {
    let mut app = TestApp::spawn().await;

    let response = app.get("/chats").await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    assert!(app.idp.received_requests().await.unwrap().is_empty());
    assert!(app.api.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn lists_chats_with_cached_token() {
    let mut app = TestApp::spawn().await;
    app.sign_in(alice(), 3600).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/me/chats"))
        .and(header("authorization", "Bearer at-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                {"id": "19:abc@thread.v2", "topic": "Release planning", "chatType": "group"},
                {"id": "19:def@thread.v2", "topic": null, "chatType": "oneOnOne"}
            ]
        })))
        .expect(1)
        .mount(&app.api)
        .await;

    let response = app.get("/chats").await;

    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response).await;
    assert!(page.contains("Release planning"));
    assert!(page.contains("/chats/19%3Adef%40thread.v2"));
}

#[tokio::test]
async fn lists_messages_of_one_chat() {
    let mut app = TestApp::spawn().await;
    app.sign_in(alice(), 3600).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/chats/19:abc@thread.v2/messages"))
        .and(header("authorization", "Bearer at-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{
                "id": "m1",
                "createdDateTime": "2024-05-01T10:00:00Z",
                "from": {"user": {"displayName": "Bob"}},
                "body": {"contentType": "text", "content": "Ship it"}
            }]
        })))
        .mount(&app.api)
        .await;

    let response = app.get("/chats/19%3Aabc%40thread.v2").await;

    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response).await;
    assert!(page.contains("Bob"));
    assert!(page.contains("Ship it"));
}

#[tokio::test]
async fn downstream_failure_surfaces_status_and_body() {
    let mut app = TestApp::spawn().await;
    app.sign_in(alice(), 3600).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/me/chats"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden by policy"))
        .mount(&app.api)
        .await;

    let response = app.get("/chats").await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let page = body_text(response).await;
    assert!(page.contains("403"));
    assert!(page.contains("Forbidden by policy"));
}

#[tokio::test]
async fn expired_token_is_refreshed_silently() {
    let mut app = TestApp::spawn().await;
    // Inside the expiry skew, so the cached token is not served.
    app.sign_in(alice(), 60).await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=rt-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "scope": "User.Read Chat.Read",
            "expires_in": 3600,
            "access_token": "at-2",
            "refresh_token": "rt-2"
        })))
        .expect(1)
        .mount(&app.idp)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/me/chats"))
        .and(header("authorization", "Bearer at-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
        .expect(2)
        .mount(&app.api)
        .await;

    assert_eq!(app.get("/chats").await.status(), StatusCode::OK);
    // The refreshed token was written back to the session and is reused.
    assert_eq!(app.get("/chats").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn rejected_refresh_requires_new_sign_in() {
    let mut app = TestApp::spawn().await;
    app.sign_in(alice(), 60).await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Refresh token revoked"
        })))
        .mount(&app.idp)
        .await;

    let response = app.get("/chats").await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    assert!(app.api.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn download_writes_pretty_json_dump() {
    let mut app = TestApp::spawn().await;
    app.sign_in(alice(), 3600).await;

    let document = json!({"value": [{"id": "m1", "body": {"content": "hello"}}]});
    Mock::given(method("GET"))
        .and(path("/v1.0/chats/19:abc@thread.v2/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(document.clone()))
        .mount(&app.api)
        .await;

    let response = app.get("/chats/19%3Aabc%40thread.v2/download").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("chat_19_abc@thread.v2.json"));

    let written = std::fs::read_to_string(app.download_dir.path().join("chat_19_abc@thread.v2.json"))
        .unwrap();
    assert_eq!(written, serde_json::to_string_pretty(&document).unwrap());
}

async fn spawn_with_short_timeout() -> TestApp {
    TestApp::spawn_with(
        |config| config.with_http_timeout(Duration::from_millis(500)),
        MemorySessionStore::new(Duration::from_secs(600)),
    )
    .await
}

#[tokio::test]
async fn slow_chat_api_fails_closed() {
    let mut app = spawn_with_short_timeout().await;
    app.sign_in(alice(), 3600).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/me/chats"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"value": []}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&app.api)
        .await;

    let response = app.get("/chats").await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn slow_token_refresh_fails_closed_instead_of_signing_out() {
    let mut app = spawn_with_short_timeout().await;
    app.sign_in(alice(), 60).await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "token_type": "Bearer",
                    "expires_in": 3600,
                    "access_token": "at-2"
                }))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&app.idp)
        .await;

    let response = app.get("/chats").await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(app.api.received_requests().await.unwrap().is_empty());

    // Still signed in: the landing page renders instead of redirecting to login.
    assert_eq!(app.get("/").await.status(), StatusCode::OK);
}
