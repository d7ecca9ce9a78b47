//! Session start and ping requests.
//!
//! Both workflows are best-effort: every failure cause collapses into a
//! boolean failure in the reports, but each outcome keeps the
//! [`RequestError`] that caused it.
//!
//! The service signals "no session was created" by returning the literal
//! string [`LEGACY_NO_SESSION`] as the session id. That string is recognized
//! only here, at the wire boundary, and turned into [`RequestError::Sentinel`].
//! A [`SessionId`] value can never hold it.

use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::loadtest::client::HttpAdapter;
use crate::loadtest::error::RequestError;
use crate::loadtest::report::Outcome;

/// Wire value meaning "no real session was created".
pub const LEGACY_NO_SESSION: &str = "IGNORED";

/// Opaque identifier of a live session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Accepts a raw wire value.
    ///
    /// Returns `None` for the sentinel, for blank values, and for values
    /// containing line breaks (which the session store cannot hold). Any
    /// other value is kept byte for byte, surrounding whitespace included.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == LEGACY_NO_SESSION || raw.contains(['\n', '\r']) {
            return None;
        }
        Some(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Deserialize)]
struct StartResponse {
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct PingResponse {
    success: bool,
}

/// Result of one start request.
#[derive(Debug, Clone)]
pub struct StartOutcome {
    pub index: usize,
    pub session: Result<SessionId, RequestError>,
    pub elapsed: Duration,
}

impl Outcome for StartOutcome {
    fn is_ok(&self) -> bool {
        self.session.is_ok()
    }

    fn error(&self) -> Option<&RequestError> {
        self.session.as_ref().err()
    }

    fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// Result of one ping request.
#[derive(Debug, Clone)]
pub struct PingOutcome {
    pub session: SessionId,
    pub result: Result<(), RequestError>,
    pub elapsed: Duration,
}

impl Outcome for PingOutcome {
    fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    fn error(&self) -> Option<&RequestError> {
        self.result.as_ref().err()
    }

    fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// Issues start and ping requests through an [`HttpAdapter`].
#[derive(Clone)]
pub struct SessionClient {
    adapter: Arc<dyn HttpAdapter>,
    start_url: String,
    ping_url: String,
    timeout: Duration,
}

impl SessionClient {
    pub fn new(
        adapter: Arc<dyn HttpAdapter>,
        start_url: String,
        ping_url: String,
        timeout: Duration,
    ) -> Self {
        Self {
            adapter,
            start_url,
            ping_url,
            timeout,
        }
    }

    /// Starts one session on behalf of `device_id`.
    pub async fn start(&self, index: usize, device_id: &str) -> StartOutcome {
        let started = Instant::now();
        let body = serde_json::json!({ "device_id": device_id });
        let session = self.start_inner(&body).await;
        if let Err(ref err) = session {
            tracing::debug!(index, category = err.error_category(), error = %err, "start failed");
        }
        StartOutcome {
            index,
            session,
            elapsed: started.elapsed(),
        }
    }

    async fn start_inner(&self, body: &serde_json::Value) -> Result<SessionId, RequestError> {
        let response = self
            .adapter
            .post(&self.start_url, body, &[], self.timeout)
            .await?;
        if !response.is_success() {
            return Err(RequestError::Http {
                status: response.status,
                body: response.body,
            });
        }
        let parsed: StartResponse =
            serde_json::from_str(&response.body).map_err(|e| RequestError::Decode {
                message: e.to_string(),
            })?;
        if parsed.session_id.trim() == LEGACY_NO_SESSION {
            return Err(RequestError::Sentinel);
        }
        SessionId::parse(&parsed.session_id).ok_or_else(|| RequestError::Decode {
            message: format!("unusable session id '{}'", parsed.session_id),
        })
    }

    /// Pings `session` once.
    pub async fn ping(&self, session: SessionId) -> PingOutcome {
        let started = Instant::now();
        let body = serde_json::json!({ "session_id": session.as_str() });
        let result = self.ping_inner(&body).await;
        if let Err(ref err) = result {
            tracing::debug!(session = %session, category = err.error_category(), error = %err, "ping failed");
        }
        PingOutcome {
            session,
            result,
            elapsed: started.elapsed(),
        }
    }

    async fn ping_inner(&self, body: &serde_json::Value) -> Result<(), RequestError> {
        let response = self
            .adapter
            .post(&self.ping_url, body, &[], self.timeout)
            .await?;
        if !response.is_success() {
            return Err(RequestError::Http {
                status: response.status,
                body: response.body,
            });
        }
        let parsed: PingResponse =
            serde_json::from_str(&response.body).map_err(|e| RequestError::Decode {
                message: e.to_string(),
            })?;
        if parsed.success {
            Ok(())
        } else {
            Err(RequestError::Rejected {
                body: response.body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loadtest::client::HttpResponse;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies with canned results in order and records request bodies.
    struct ScriptedAdapter {
        replies: Mutex<Vec<Result<HttpResponse, RequestError>>>,
        bodies: Mutex<Vec<serde_json::Value>>,
    }

    impl ScriptedAdapter {
        fn new(mut replies: Vec<Result<HttpResponse, RequestError>>) -> Arc<Self> {
            replies.reverse();
            Arc::new(Self {
                replies: Mutex::new(replies),
                bodies: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl HttpAdapter for ScriptedAdapter {
        async fn post(
            &self,
            _url: &str,
            body: &serde_json::Value,
            _headers: &[(&str, &str)],
            _timeout: Duration,
        ) -> Result<HttpResponse, RequestError> {
            self.bodies.lock().unwrap().push(body.clone());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(HttpResponse::new(500, "no reply scripted")))
        }
    }

    fn client(adapter: Arc<ScriptedAdapter>) -> SessionClient {
        SessionClient::new(
            adapter,
            "http://svc/start".to_string(),
            "http://svc/ping".to_string(),
            Duration::from_secs(1),
        )
    }

    #[test]
    fn test_session_id_parse() {
        assert_eq!(SessionId::parse("abc").unwrap().as_str(), "abc");
        assert_eq!(SessionId::parse(" tok== ").unwrap().as_str(), " tok== ");
        assert!(SessionId::parse(LEGACY_NO_SESSION).is_none());
        assert!(SessionId::parse("").is_none());
        assert!(SessionId::parse("a\nb").is_none());
    }

    #[tokio::test]
    async fn test_start_returns_session_id() {
        let adapter = ScriptedAdapter::new(vec![Ok(HttpResponse::new(
            200,
            r#"{"session_id":"s-1"}"#,
        ))]);
        let outcome = client(adapter.clone()).start(3, "device-9").await;
        assert_eq!(outcome.index, 3);
        assert_eq!(outcome.session.unwrap().as_str(), "s-1");
        assert_eq!(
            adapter.bodies.lock().unwrap()[0],
            serde_json::json!({"device_id": "device-9"})
        );
    }

    #[tokio::test]
    async fn test_start_keeps_issued_id_verbatim() {
        let adapter = ScriptedAdapter::new(vec![Ok(HttpResponse::new(
            200,
            r#"{"session_id":" tok== "}"#,
        ))]);
        let outcome = client(adapter).start(0, "d").await;
        assert_eq!(outcome.session.unwrap().as_str(), " tok== ");
    }

    #[tokio::test]
    async fn test_start_sentinel_is_error() {
        let adapter = ScriptedAdapter::new(vec![Ok(HttpResponse::new(
            200,
            r#"{"session_id":"IGNORED"}"#,
        ))]);
        let outcome = client(adapter).start(0, "d").await;
        assert_eq!(outcome.session.unwrap_err(), RequestError::Sentinel);
    }

    #[tokio::test]
    async fn test_start_classifies_failures() {
        let adapter = ScriptedAdapter::new(vec![
            Ok(HttpResponse::new(503, "busy")),
            Ok(HttpResponse::new(200, "not json")),
            Err(RequestError::Timeout),
        ]);
        let client = client(adapter);

        let http = client.start(0, "d").await;
        assert_eq!(http.error().map(|e| e.error_category()), Some("http"));
        let decode = client.start(1, "d").await;
        assert_eq!(decode.error().map(|e| e.error_category()), Some("decode"));
        let timeout = client.start(2, "d").await;
        assert_eq!(timeout.session.unwrap_err(), RequestError::Timeout);
    }

    #[tokio::test]
    async fn test_ping_interprets_success_field() {
        let adapter = ScriptedAdapter::new(vec![
            Ok(HttpResponse::new(200, r#"{"success":true}"#)),
            Ok(HttpResponse::new(200, r#"{"success":false}"#)),
            Ok(HttpResponse::new(200, r#"{"ok":true}"#)),
            Err(RequestError::Network {
                message: "reset".to_string(),
            }),
        ]);
        let client = client(adapter.clone());
        let session = SessionId::parse("abc").unwrap();

        assert!(client.ping(session.clone()).await.is_ok());
        let rejected = client.ping(session.clone()).await;
        assert!(matches!(rejected.result, Err(RequestError::Rejected { .. })));
        let malformed = client.ping(session.clone()).await;
        assert!(matches!(malformed.result, Err(RequestError::Decode { .. })));
        let network = client.ping(session).await;
        assert!(!network.is_ok());

        assert_eq!(
            adapter.bodies.lock().unwrap()[0],
            serde_json::json!({"session_id": "abc"})
        );
    }
}
