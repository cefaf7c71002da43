//! Notifier delivery against wiremock servers

use std::time::Duration;
use wiremock::matchers::{body_string, header, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use immowatch::config::NotificationConfig;
use immowatch::notifications::{
    notifier_from_config, Notifier, NtfyNotifier, WebhookConfig, WebhookNotifier,
};
use immowatch::utils::error::NotifyError;

const MESSAGE: &str = "New offer: Flat A\nPrice: 500\nArea: -\nRooms: -";

#[tokio::test]
async fn test_ntfy_posts_message_with_view_action() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/flats-muc"))
        // `header` splits values on commas; the action is one value
        .and(header_regex("actions", "^view, Open link, https://x/1$"))
        .and(body_string(MESSAGE))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = NtfyNotifier::new(&server.uri(), Duration::from_secs(5)).unwrap();
    notifier
        .publish("flats-muc", MESSAGE, Some("https://x/1"))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let actions = requests[0]
        .headers
        .get("actions")
        .and_then(|v| v.to_str().ok());
    assert_eq!(actions, Some("view, Open link, https://x/1"));
}

#[tokio::test]
async fn test_ntfy_without_link_sends_no_action() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/flats"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = NtfyNotifier::new(&server.uri(), Duration::from_secs(5)).unwrap();
    notifier.publish("flats", MESSAGE, None).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("actions").is_none());
}

#[tokio::test]
async fn test_ntfy_rejection_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let notifier = NtfyNotifier::new(&server.uri(), Duration::from_secs(5)).unwrap();
    let result = notifier.publish("flats", MESSAGE, None).await;

    match result {
        Err(NotifyError::Rejected { status, body }) => {
            assert_eq!(status, 429);
            assert_eq!(body, "rate limited");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn test_webhook_posts_json_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = WebhookNotifier::new(
        WebhookConfig::new(format!("{}/hook", server.uri())).with_auth_token("secret"),
    )
    .unwrap();
    notifier
        .publish("flats", MESSAGE, Some("https://x/1"))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let payload: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(payload["topic"], "flats");
    assert_eq!(payload["message"], MESSAGE);
    assert_eq!(payload["url"], "https://x/1");
}

#[tokio::test]
async fn test_webhook_server_error_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let notifier = WebhookNotifier::new(WebhookConfig::new(server.uri())).unwrap();
    let result = notifier.publish("flats", MESSAGE, None).await;

    assert!(matches!(result, Err(NotifyError::Rejected { status: 500, .. })));
}

#[tokio::test]
async fn test_configured_webhook_gets_token_and_headers() {
    let ntfy = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/flats"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&ntfy)
        .await;

    let hook = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header("authorization", "Bearer hook-secret"))
        .and(header("x-immowatch-instance", "konstanz"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&hook)
        .await;

    let mut config = NotificationConfig {
        ntfy_server: ntfy.uri(),
        topic: "flats".to_string(),
        webhook_url: Some(format!("{}/hook", hook.uri())),
        webhook_auth_token: Some("hook-secret".to_string()),
        ..Default::default()
    };
    config
        .webhook_headers
        .insert("X-Immowatch-Instance".to_string(), "konstanz".to_string());

    let notifier = notifier_from_config(&config).unwrap();
    notifier
        .publish("flats", MESSAGE, Some("https://x/1"))
        .await
        .unwrap();
}
