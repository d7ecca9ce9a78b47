//! Three-step signup sequencer.
//!
//! Each task walks `send_code -> verify_code -> signup` strictly in order.
//! The first step that does not answer with the success status ends the
//! task: its name, status, and body land on the outcome and the remaining
//! steps are never called. The verify step always submits the configured
//! bypass code, never a code derived from the identity.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::loadtest::client::{HttpAdapter, HttpResponse};
use crate::loadtest::config::HarnessConfig;
use crate::loadtest::error::{LoadTestError, RequestError};
use crate::loadtest::generator::Identity;
use crate::loadtest::report::Outcome;

/// One step of the signup chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignupStep {
    SendCode,
    VerifyCode,
    Signup,
}

impl SignupStep {
    /// Every step in execution order.
    pub const ALL: [SignupStep; 3] = [Self::SendCode, Self::VerifyCode, Self::Signup];

    pub fn name(&self) -> &'static str {
        match self {
            Self::SendCode => "send_code",
            Self::VerifyCode => "verify_code",
            Self::Signup => "signup",
        }
    }
}

impl fmt::Display for SignupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Record of one call in the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    pub step: SignupStep,
    /// `None` when no response arrived.
    pub status: Option<u16>,
    pub body: String,
    pub ok: bool,
}

/// Result of one signup task.
#[derive(Debug, Clone)]
pub struct SignupOutcome {
    pub identity: Identity,
    /// `true` iff every step answered with the success status.
    pub ok: bool,
    pub failing_step: Option<SignupStep>,
    /// Status of the last step that ran.
    pub status: Option<u16>,
    /// Body of the last step that ran, or the error text for transport failures.
    pub body: String,
    /// Authentication cookie captured from a successful signup response.
    pub cookie: Option<String>,
    pub steps: Vec<StepResult>,
    pub error: Option<RequestError>,
    pub elapsed: Duration,
}

impl SignupOutcome {
    /// Status column value: the HTTP status, or the error category when the
    /// request never got a response.
    pub fn status_label(&self) -> String {
        match (self.status, &self.error) {
            (Some(status), _) => status.to_string(),
            (None, Some(err)) => err.error_category().to_string(),
            (None, None) => String::new(),
        }
    }
}

impl Outcome for SignupOutcome {
    fn is_ok(&self) -> bool {
        self.ok
    }

    fn error(&self) -> Option<&RequestError> {
        self.error.as_ref()
    }

    fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// Fully resolved URLs of the three signup endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupUrls {
    pub send_code: String,
    pub verify_code: String,
    pub signup: String,
}

impl SignupUrls {
    pub fn from_config(config: &HarnessConfig) -> Result<Self, LoadTestError> {
        Ok(Self {
            send_code: config.endpoint_url(&config.endpoints.send_code)?,
            verify_code: config.endpoint_url(&config.endpoints.verify_code)?,
            signup: config.endpoint_url(&config.endpoints.signup)?,
        })
    }

    fn for_step(&self, step: SignupStep) -> &str {
        match step {
            SignupStep::SendCode => &self.send_code,
            SignupStep::VerifyCode => &self.verify_code,
            SignupStep::Signup => &self.signup,
        }
    }
}

/// Runs the signup chain for one identity at a time.
#[derive(Clone)]
pub struct SignupSequencer {
    adapter: Arc<dyn HttpAdapter>,
    urls: SignupUrls,
    bypass_code: String,
    password: String,
    profile_url: String,
    description: String,
    timeout: Duration,
}

impl SignupSequencer {
    pub fn new(adapter: Arc<dyn HttpAdapter>, urls: SignupUrls, timeout: Duration) -> Self {
        Self {
            adapter,
            urls,
            bypass_code: String::new(),
            password: String::new(),
            profile_url: String::new(),
            description: String::new(),
            timeout,
        }
    }

    /// Builds a sequencer from the `[signup]` and `[endpoints]` sections.
    pub fn from_config(
        adapter: Arc<dyn HttpAdapter>,
        config: &HarnessConfig,
    ) -> Result<Self, LoadTestError> {
        let signup = &config.signup;
        Ok(Self::new(
            adapter,
            SignupUrls::from_config(config)?,
            config.settings.timeout_as_duration(),
        )
        .with_bypass_code(&signup.bypass_code)
        .with_password(&signup.password)
        .with_profile_url(&signup.profile_url)
        .with_description(&signup.description))
    }

    pub fn with_bypass_code(mut self, code: impl Into<String>) -> Self {
        self.bypass_code = code.into();
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn with_profile_url(mut self, url: impl Into<String>) -> Self {
        self.profile_url = url.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    fn payload(&self, step: SignupStep, identity: &Identity) -> serde_json::Value {
        match step {
            SignupStep::SendCode => serde_json::json!({ "email": identity.email }),
            SignupStep::VerifyCode => serde_json::json!({
                "email": identity.email,
                "code": self.bypass_code,
            }),
            SignupStep::Signup => serde_json::json!({
                "email": identity.email,
                "password": self.password,
                "code": self.bypass_code,
                "display_name": identity.display_name,
                "username": identity.username,
                "profile_url": self.profile_url,
                "description": self.description,
                "term_agreed": true,
                "informed_agreed": true,
            }),
        }
    }

    /// Runs every step for `identity`, stopping at the first failure.
    pub async fn run(&self, identity: Identity) -> SignupOutcome {
        let started = Instant::now();
        let mut steps = Vec::with_capacity(SignupStep::ALL.len());
        let mut cookie = None;

        for step in SignupStep::ALL {
            let body = self.payload(step, &identity);
            let result = self
                .adapter
                .post(self.urls.for_step(step), &body, &[], self.timeout)
                .await;

            match result {
                Ok(response) if response.is_success() => {
                    if step == SignupStep::Signup {
                        cookie = response.auth_cookie();
                    }
                    steps.push(StepResult {
                        step,
                        status: Some(response.status),
                        body: response.body,
                        ok: true,
                    });
                },
                Ok(response) => {
                    return self.failed(identity, step, steps, response, started);
                },
                Err(err) => {
                    tracing::debug!(
                        step = step.name(),
                        email = %identity.email,
                        category = err.error_category(),
                        error = %err,
                        "signup step failed before a response"
                    );
                    steps.push(StepResult {
                        step,
                        status: None,
                        body: err.to_string(),
                        ok: false,
                    });
                    return SignupOutcome {
                        identity,
                        ok: false,
                        failing_step: Some(step),
                        status: None,
                        body: err.to_string(),
                        cookie: None,
                        steps,
                        error: Some(err),
                        elapsed: started.elapsed(),
                    };
                },
            }
        }

        let (status, body) = steps
            .last()
            .map(|s| (s.status, s.body.clone()))
            .unwrap_or_default();
        SignupOutcome {
            identity,
            ok: true,
            failing_step: None,
            status,
            body,
            cookie,
            steps,
            error: None,
            elapsed: started.elapsed(),
        }
    }

    fn failed(
        &self,
        identity: Identity,
        step: SignupStep,
        mut steps: Vec<StepResult>,
        response: HttpResponse,
        started: Instant,
    ) -> SignupOutcome {
        tracing::debug!(
            step = step.name(),
            status = response.status,
            email = %identity.email,
            "signup step rejected"
        );
        steps.push(StepResult {
            step,
            status: Some(response.status),
            body: response.body.clone(),
            ok: false,
        });
        SignupOutcome {
            identity,
            ok: false,
            failing_step: Some(step),
            status: Some(response.status),
            body: response.body.clone(),
            cookie: None,
            steps,
            error: Some(RequestError::Http {
                status: response.status,
                body: response.body,
            }),
            elapsed: started.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loadtest::generator::IdentityGenerator;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Answers per URL suffix and records every call.
    struct RoutedAdapter {
        routes: Vec<(&'static str, Result<HttpResponse, RequestError>)>,
        calls: Mutex<Vec<(String, serde_json::Value)>>,
    }

    impl RoutedAdapter {
        fn new(routes: Vec<(&'static str, Result<HttpResponse, RequestError>)>) -> Arc<Self> {
            Arc::new(Self {
                routes,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(String, serde_json::Value)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpAdapter for RoutedAdapter {
        async fn post(
            &self,
            url: &str,
            body: &serde_json::Value,
            _headers: &[(&str, &str)],
            _timeout: Duration,
        ) -> Result<HttpResponse, RequestError> {
            self.calls
                .lock()
                .unwrap()
                .push((url.to_string(), body.clone()));
            self.routes
                .iter()
                .find(|(suffix, _)| url.ends_with(suffix))
                .map(|(_, reply)| reply.clone())
                .unwrap_or_else(|| Ok(HttpResponse::new(404, "no route")))
        }
    }

    fn urls() -> SignupUrls {
        SignupUrls {
            send_code: "http://svc/send".to_string(),
            verify_code: "http://svc/verify".to_string(),
            signup: "http://svc/signup".to_string(),
        }
    }

    fn identity() -> Identity {
        IdentityGenerator::with_run_stamp("example.com", 42)
            .identity_from_token(0, "abcdefghij12".to_string())
    }

    fn sequencer(adapter: Arc<RoutedAdapter>) -> SignupSequencer {
        SignupSequencer::new(adapter, urls(), Duration::from_secs(5))
            .with_bypass_code("000000")
            .with_password("pw")
            .with_profile_url("http://img/p.png")
    }

    #[test]
    fn test_step_names() {
        let names: Vec<_> = SignupStep::ALL.iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["send_code", "verify_code", "signup"]);
    }

    #[tokio::test]
    async fn test_all_steps_succeed_and_capture_cookie() {
        let adapter = RoutedAdapter::new(vec![
            ("/send", Ok(HttpResponse::new(200, "{}"))),
            ("/verify", Ok(HttpResponse::new(200, "{}"))),
            (
                "/signup",
                Ok(HttpResponse::new(200, r#"{"id":1}"#).with_cookie("token=t0k; Path=/")),
            ),
        ]);
        let outcome = sequencer(adapter.clone()).run(identity()).await;

        assert!(outcome.ok);
        assert_eq!(outcome.failing_step, None);
        assert_eq!(outcome.cookie.as_deref(), Some("token=t0k"));
        assert_eq!(outcome.steps.len(), 3);
        assert_eq!(outcome.status, Some(200));

        let calls = adapter.calls();
        let signup_body = &calls[2].1;
        assert_eq!(signup_body["username"], "abcdefghij");
        assert_eq!(signup_body["display_name"], "abcdefgh");
        assert_eq!(signup_body["password"], "pw");
        assert_eq!(signup_body["profile_url"], "http://img/p.png");
        assert_eq!(signup_body["term_agreed"], true);
    }

    #[tokio::test]
    async fn test_success_without_cookie() {
        let adapter = RoutedAdapter::new(vec![
            ("/send", Ok(HttpResponse::new(200, "{}"))),
            ("/verify", Ok(HttpResponse::new(200, "{}"))),
            ("/signup", Ok(HttpResponse::new(200, "{}"))),
        ]);
        let outcome = sequencer(adapter).run(identity()).await;
        assert!(outcome.ok);
        assert_eq!(outcome.cookie, None);
    }

    #[tokio::test]
    async fn test_short_circuits_on_send_code_failure() {
        let adapter = RoutedAdapter::new(vec![(
            "/send",
            Ok(HttpResponse::new(429, "slow down")),
        )]);
        let outcome = sequencer(adapter.clone()).run(identity()).await;

        assert!(!outcome.ok);
        assert_eq!(outcome.failing_step, Some(SignupStep::SendCode));
        assert_eq!(outcome.status, Some(429));
        assert_eq!(outcome.body, "slow down");
        assert_eq!(outcome.status_label(), "429");
        assert_eq!(adapter.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_verify_failure_stops_before_signup() {
        let adapter = RoutedAdapter::new(vec![
            ("/send", Ok(HttpResponse::new(200, "{}"))),
            ("/verify", Ok(HttpResponse::new(400, "bad code"))),
        ]);
        let outcome = sequencer(adapter.clone()).run(identity()).await;
        assert_eq!(outcome.failing_step, Some(SignupStep::VerifyCode));
        assert_eq!(adapter.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_transport_error_records_category() {
        let adapter = RoutedAdapter::new(vec![("/send", Err(RequestError::Timeout))]);
        let outcome = sequencer(adapter).run(identity()).await;
        assert!(!outcome.ok);
        assert_eq!(outcome.status, None);
        assert_eq!(outcome.error, Some(RequestError::Timeout));
        assert_eq!(outcome.status_label(), "timeout");
    }

    #[tokio::test]
    async fn test_verify_sends_bypass_code() {
        let adapter = RoutedAdapter::new(vec![
            ("/send", Ok(HttpResponse::new(200, "{}"))),
            ("/verify", Ok(HttpResponse::new(200, "{}"))),
            ("/signup", Ok(HttpResponse::new(200, "{}"))),
        ]);
        let seq = sequencer(adapter.clone()).with_bypass_code("135790");
        seq.run(identity()).await;

        let calls = adapter.calls();
        assert_eq!(calls[1].1["code"], "135790");
        assert_eq!(calls[2].1["code"], "135790");
    }

    #[test]
    fn test_from_config_resolves_urls() {
        let config = HarnessConfig::from_toml(
            r#"
[target]
base_url = "https://api.example.com/"

[signup]
bypass_code = "111111"
"#,
        )
        .unwrap();
        let adapter = RoutedAdapter::new(vec![]);
        let seq = SignupSequencer::from_config(adapter, &config).unwrap();
        assert_eq!(
            seq.urls.send_code,
            "https://api.example.com/v3/auth/verification/send-verification-code"
        );
        assert_eq!(seq.bypass_code, "111111");
    }
}
