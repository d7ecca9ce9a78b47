//! HTTP client adapter used by every workflow.
//!
//! Workflows talk to the service only through the [`HttpAdapter`] trait so
//! tests can substitute an in-memory fake. [`ReqwestAdapter`] is the real
//! implementation; it shares one pooled `reqwest::Client` across all tasks.

use async_trait::async_trait;
use std::time::Duration;

use crate::loadtest::error::{LoadTestError, RequestError};

/// The single status code every step treats as success.
pub const SUCCESS_STATUS: u16 = 200;

/// Cookie names recognized as carrying an authentication token.
const TOKEN_COOKIE_NAMES: &[&str] = &[
    "token",
    "auth_token",
    "access_token",
    "jwt",
    "bearer",
    "authorization",
];

/// Status, body, and cookies of one completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Numeric HTTP status code.
    pub status: u16,
    /// Response body decoded as text.
    pub body: String,
    /// Raw `Set-Cookie` header values in the order received.
    pub set_cookies: Vec<String>,
}

impl HttpResponse {
    /// Creates a response without cookies.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            set_cookies: Vec::new(),
        }
    }

    /// Adds a raw `Set-Cookie` header value.
    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.set_cookies.push(cookie.into());
        self
    }

    /// Returns `true` if the status equals [`SUCCESS_STATUS`].
    pub fn is_success(&self) -> bool {
        self.status == SUCCESS_STATUS
    }

    /// Returns the authentication cookie as a `name=value` pair.
    ///
    /// A cookie whose name is a known token name wins; otherwise the first
    /// cookie set by the response is returned.
    pub fn auth_cookie(&self) -> Option<String> {
        let pairs: Vec<(&str, &str)> = self
            .set_cookies
            .iter()
            .filter_map(|raw| cookie_pair(raw))
            .collect();

        pairs
            .iter()
            .find(|(name, _)| {
                TOKEN_COOKIE_NAMES
                    .iter()
                    .any(|known| name.eq_ignore_ascii_case(known))
            })
            .or_else(|| pairs.first())
            .map(|(name, value)| format!("{name}={value}"))
    }
}

/// Extracts the leading `name=value` pair of a `Set-Cookie` header value.
fn cookie_pair(raw: &str) -> Option<(&str, &str)> {
    let first = raw.split(';').next()?.trim();
    let (name, value) = first.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name, value.trim()))
}

/// Issues one JSON POST and returns status, body, and cookies.
///
/// Implementations must not retry. Any failure before a complete response
/// is available is returned as a [`RequestError`]; non-success statuses are
/// NOT errors at this layer.
#[async_trait]
pub trait HttpAdapter: Send + Sync {
    /// POST `body` as JSON to `url` with extra `headers`, bounded by `timeout`.
    async fn post(
        &self,
        url: &str,
        body: &serde_json::Value,
        headers: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<HttpResponse, RequestError>;
}

/// [`HttpAdapter`] backed by a pooled, keep-alive `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestAdapter {
    client: reqwest::Client,
}

impl ReqwestAdapter {
    /// Builds the shared client.
    ///
    /// When `insecure` is true, invalid TLS certificates are accepted.
    pub fn new(insecure: bool, pool_size: usize) -> Result<Self, LoadTestError> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(pool_size)
            .tcp_keepalive(Duration::from_secs(60))
            .danger_accept_invalid_certs(insecure)
            .build()
            .map_err(|e| LoadTestError::Client {
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpAdapter for ReqwestAdapter {
    async fn post(
        &self,
        url: &str,
        body: &serde_json::Value,
        headers: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<HttpResponse, RequestError> {
        let mut request = self.client.post(url).timeout(timeout).json(body);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RequestError::classify_reqwest(&e))?;

        let status = response.status().as_u16();
        let set_cookies = response
            .headers()
            .get_all(reqwest::header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(str::to_owned)
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| RequestError::classify_reqwest(&e))?;

        Ok(HttpResponse {
            status,
            body,
            set_cookies,
        })
    }
}
