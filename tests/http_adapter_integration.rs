//! `ReqwestAdapter` against real sockets.
//!
//! Response handling is checked against a `mockito` server. Timeouts and
//! refused connections use a bare `TcpListener`, since they need a peer that
//! never answers or does not exist.

use std::time::Duration;

use authload::loadtest::client::{HttpAdapter, ReqwestAdapter};
use authload::loadtest::error::RequestError;
use mockito::Matcher;

fn adapter() -> ReqwestAdapter {
    ReqwestAdapter::new(false, 4).unwrap()
}

#[tokio::test]
async fn posts_json_and_captures_status_body_and_cookies() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v3/auth/signup")
        .match_header("content-type", "application/json")
        .match_header("x-trace", "load")
        .match_body(Matcher::Json(serde_json::json!({"email": "a@example.com"})))
        .with_status(200)
        .with_header("set-cookie", "id=1; Path=/")
        .with_header("set-cookie", "auth_token=xyz; HttpOnly")
        .with_body(r#"{"ok":true}"#)
        .create_async()
        .await;

    let response = adapter()
        .post(
            &format!("{}/v3/auth/signup", server.url()),
            &serde_json::json!({"email": "a@example.com"}),
            &[("x-trace", "load")],
            Duration::from_secs(5),
        )
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body, r#"{"ok":true}"#);
    assert_eq!(response.set_cookies.len(), 2);
    assert_eq!(response.auth_cookie(), Some("auth_token=xyz".to_string()));
}

#[tokio::test]
async fn non_success_status_is_a_response_not_an_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/v3/presence/ping")
        .with_status(429)
        .with_body("slow down")
        .create_async()
        .await;

    let response = adapter()
        .post(
            &format!("{}/v3/presence/ping", server.url()),
            &serde_json::json!({"session_id": "abc"}),
            &[],
            Duration::from_secs(5),
        )
        .await
        .unwrap();

    assert_eq!(response.status, 429);
    assert!(!response.is_success());
    assert_eq!(response.body, "slow down");
}

#[tokio::test]
async fn unresponsive_peer_is_classified_as_timeout() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let _peer = tokio::spawn(async move {
        // Accept and hold the connection without ever answering.
        let (_socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    let err = adapter()
        .post(
            &format!("http://{addr}/v3/presence/start"),
            &serde_json::json!({"device_id": "d"}),
            &[],
            Duration::from_millis(200),
        )
        .await
        .unwrap_err();

    assert_eq!(err, RequestError::Timeout);
    assert_eq!(err.error_category(), "timeout");
}

#[tokio::test]
async fn refused_connection_is_classified_as_network() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = adapter()
        .post(
            &format!("http://{addr}/v3/presence/start"),
            &serde_json::json!({"device_id": "d"}),
            &[],
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, RequestError::Network { .. }), "got {err:?}");
    assert!(err.is_transport());
}
