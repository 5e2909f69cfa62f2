//! End-to-end tests for the letter lifecycle
//!
//! Tests compose, delivery, quota enforcement, inbox capacity,
//! reading, replying, and archiving through the HTTP API.

mod common;

use common::{TestClient, TestServer, SPOTIFY_TRACK_ID, TEST_SONG_TITLE, TEST_USERNAME};
use comusic_server::settings::{AppSetting, SettingsStore};
use reqwest::StatusCode;

#[tokio::test]
async fn test_compose_delivers_to_other_user() {
    let server = TestServer::spawn().await;
    let sender = TestClient::authenticated(server.base_url.clone()).await;
    let receiver = TestClient::authenticated_receiver(server.base_url.clone()).await;

    let response = sender.compose("this one got me through finals week").await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let outcome: serde_json::Value = response.json().await.unwrap();
    assert_eq!(outcome["assigned"], true);
    assert_eq!(outcome["sent_today"], 1);
    assert_eq!(outcome["letter"]["status"], "delivered");
    assert_eq!(outcome["letter"]["sender_name"], TEST_USERNAME);

    // Only two users are seeded, so the letter must land with the receiver.
    let response = receiver.inbox().await;
    assert_eq!(response.status(), StatusCode::OK);
    let inbox: serde_json::Value = response.json().await.unwrap();
    assert_eq!(inbox.as_array().unwrap().len(), 1);
    assert_eq!(inbox[0]["song"]["title"], TEST_SONG_TITLE);
    assert_eq!(inbox[0]["song"]["provider_track_id"], SPOTIFY_TRACK_ID);
}

#[tokio::test]
async fn test_anonymous_compose_hides_sender_name() {
    let server = TestServer::spawn().await;
    let sender = TestClient::authenticated(server.base_url.clone()).await;
    let receiver = TestClient::authenticated_receiver(server.base_url.clone()).await;

    let response = sender
        .compose_with(serde_json::json!({
            "provider": "spotify",
            "track_input": common::SPOTIFY_TRACK_URL,
            "title": TEST_SONG_TITLE,
            "message": "no need to know who",
            "is_anonymous": true,
        }))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let inbox: serde_json::Value = receiver.inbox().await.json().await.unwrap();
    assert_eq!(inbox[0]["sender_name"], "Anonymous");
    assert_eq!(inbox[0]["is_anonymous"], true);
}

#[tokio::test]
async fn test_compose_with_empty_message_is_rejected() {
    let server = TestServer::spawn().await;
    let sender = TestClient::authenticated(server.base_url.clone()).await;

    let response = sender.compose("   ").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "validation_error");
}

#[tokio::test]
async fn test_daily_quota_is_enforced() {
    let server = TestServer::spawn().await;
    server
        .store
        .put_app_setting(AppSetting::MaxDailyLetters(2))
        .unwrap();
    let sender = TestClient::authenticated(server.base_url.clone()).await;

    for i in 0..2 {
        let response = sender.compose(&format!("letter number {}", i)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = sender.compose("one too many").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "quota_exceeded");
}

#[tokio::test]
async fn test_full_inbox_leaves_letter_queued() {
    let server = TestServer::spawn().await;
    server
        .store
        .put_app_setting(AppSetting::MaxInboxLetters(1))
        .unwrap();
    let sender = TestClient::authenticated(server.base_url.clone()).await;

    let outcome: serde_json::Value = sender.compose("first").await.json().await.unwrap();
    assert_eq!(outcome["assigned"], true);

    // The only other user is now at capacity.
    let outcome: serde_json::Value = sender.compose("second").await.json().await.unwrap();
    assert_eq!(outcome["assigned"], false);
    assert_eq!(outcome["letter"]["status"], "queued");
}

#[tokio::test]
async fn test_opening_a_letter_marks_it_read() {
    let server = TestServer::spawn().await;
    let sender = TestClient::authenticated(server.base_url.clone()).await;
    let receiver = TestClient::authenticated_receiver(server.base_url.clone()).await;

    let outcome: serde_json::Value = sender.compose("read me").await.json().await.unwrap();
    let letter_id = outcome["letter"]["id"].as_str().unwrap();

    let inbox: serde_json::Value = receiver.inbox().await.json().await.unwrap();
    assert!(inbox[0]["read_at"].is_null());

    let response = receiver.letter(letter_id).await;
    assert_eq!(response.status(), StatusCode::OK);
    let detail: serde_json::Value = response.json().await.unwrap();
    assert!(!detail["read_at"].is_null());
    assert_eq!(detail["song"]["title"], TEST_SONG_TITLE);
    assert_eq!(detail["replies"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_reply_flow() {
    let server = TestServer::spawn().await;
    let sender = TestClient::authenticated(server.base_url.clone()).await;
    let receiver = TestClient::authenticated_receiver(server.base_url.clone()).await;

    let outcome: serde_json::Value = sender.compose("hope you like it").await.json().await.unwrap();
    let letter_id = outcome["letter"]["id"].as_str().unwrap();

    let response = receiver.reply(letter_id, "I loved it, thank you").await;
    assert_eq!(response.status(), StatusCode::CREATED);

    // The first reply moves the letter to replied, visible to the sender.
    let sent: serde_json::Value = sender.sent().await.json().await.unwrap();
    assert_eq!(sent[0]["status"], "replied");

    let detail: serde_json::Value = sender.letter(letter_id).await.json().await.unwrap();
    let replies = detail["replies"].as_array().unwrap();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0]["content"], "I loved it, thank you");
}

#[tokio::test]
async fn test_sender_cannot_reply_to_own_letter() {
    let server = TestServer::spawn().await;
    let sender = TestClient::authenticated(server.base_url.clone()).await;
    let _receiver = TestClient::authenticated_receiver(server.base_url.clone()).await;

    let outcome: serde_json::Value = sender.compose("talking to myself").await.json().await.unwrap();
    let letter_id = outcome["letter"]["id"].as_str().unwrap();

    let response = sender.reply(letter_id, "nice pick, me").await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_archiving_frees_inbox_capacity() {
    let server = TestServer::spawn().await;
    server
        .store
        .put_app_setting(AppSetting::MaxInboxLetters(1))
        .unwrap();
    let sender = TestClient::authenticated(server.base_url.clone()).await;
    let receiver = TestClient::authenticated_receiver(server.base_url.clone()).await;

    let first: serde_json::Value = sender.compose("first").await.json().await.unwrap();
    let second: serde_json::Value = sender.compose("second").await.json().await.unwrap();
    assert_eq!(second["assigned"], false);

    let response = receiver.archive(first["letter"]["id"].as_str().unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);

    // A new signup triggers a delivery sweep which picks up the queued letter.
    let newcomer = TestClient::new(server.base_url.clone());
    let response = newcomer.signup("sweeper", "Sweeper", "sweeperpass").await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let detail: serde_json::Value = sender
        .letter(second["letter"]["id"].as_str().unwrap())
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(detail["status"], "delivered");
}

#[tokio::test]
async fn test_outsider_cannot_see_letter() {
    let server = TestServer::spawn().await;
    let sender = TestClient::authenticated(server.base_url.clone()).await;
    let _receiver = TestClient::authenticated_receiver(server.base_url.clone()).await;

    let outcome: serde_json::Value = sender.compose("private").await.json().await.unwrap();
    let letter_id = outcome["letter"]["id"].as_str().unwrap();

    let outsider = TestClient::new(server.base_url.clone());
    let response = outsider.signup("outsider", "Outsider", "outsiderpass").await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = outsider.letter(letter_id).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_quota_endpoint_reflects_sends() {
    let server = TestServer::spawn().await;
    let sender = TestClient::authenticated(server.base_url.clone()).await;

    let quota: serde_json::Value = sender.quota().await.json().await.unwrap();
    assert_eq!(quota["sent_today"], 0);
    assert_eq!(quota["max_daily_letters"], 5);
    assert_eq!(quota["can_send"], true);
    assert_eq!(quota["unread_inbox"], 0);
    assert_eq!(quota["max_inbox_letters"], 10);

    sender.compose("counting up").await;

    let quota: serde_json::Value = sender.quota().await.json().await.unwrap();
    assert_eq!(quota["sent_today"], 1);
    assert_eq!(quota["can_send"], true);
}

#[tokio::test]
async fn test_sent_list_shows_own_letters() {
    let server = TestServer::spawn().await;
    let sender = TestClient::authenticated(server.base_url.clone()).await;

    let sent: serde_json::Value = sender.sent().await.json().await.unwrap();
    assert_eq!(sent.as_array().unwrap().len(), 0);

    sender.compose("outbound").await;

    let sent: serde_json::Value = sender.sent().await.json().await.unwrap();
    assert_eq!(sent.as_array().unwrap().len(), 1);
    assert_eq!(sent[0]["message"], "outbound");
}
