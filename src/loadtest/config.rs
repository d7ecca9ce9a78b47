//! TOML-based harness configuration.
//!
//! Every field is optional in the file and falls back to a default, except
//! the target base URL which must come from the file, the CLI, or the
//! environment before a run may start.
//!
//! # Example TOML
//!
//! ```toml
//! [target]
//! base_url = "https://api.dev.example.com"
//!
//! [settings]
//! count = 500
//! concurrency = 50
//! batch_size = 100
//! batch_delay_secs = 2.0
//! timeout_secs = 30
//!
//! [signup]
//! bypass_code = "000000"
//! password = "Load-Test-Passw0rd!"
//!
//! [output]
//! sessions = "sessions.txt"
//! ```
//!
//! The validated value is built once by the binary and shared through an
//! `Arc`; no component reads the environment on its own.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::loadtest::error::LoadTestError;

/// Top-level harness configuration parsed from a TOML file.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct HarnessConfig {
    /// Service under test.
    #[serde(default)]
    pub target: Target,
    /// Task count, concurrency ceiling, batching, and timeouts.
    #[serde(default)]
    pub settings: Settings,
    /// Per-workflow endpoint paths, joined onto `target.base_url`.
    #[serde(default)]
    pub endpoints: Endpoints,
    /// Signup payload parameters.
    #[serde(default)]
    pub signup: SignupSettings,
    /// Output file locations.
    #[serde(default)]
    pub output: OutputPaths,
}

/// The service under test.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Target {
    /// Base URL of the service (mandatory at run time).
    #[serde(default)]
    pub base_url: Option<String>,
    /// Accept invalid TLS certificates (self-signed dev environments).
    #[serde(default)]
    pub insecure: bool,
}

/// Execution parameters shared by every workflow.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Number of tasks to generate (signup and start workflows).
    #[serde(default = "default_count")]
    pub count: usize,
    /// Maximum number of tasks in flight at any instant.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Optional batch size; batches run strictly one after another.
    #[serde(default)]
    pub batch_size: Option<usize>,
    /// Pause between consecutive batches, in seconds.
    #[serde(default)]
    pub batch_delay_secs: f64,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_count() -> usize {
    100
}

fn default_concurrency() -> usize {
    50
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            count: default_count(),
            concurrency: default_concurrency(),
            batch_size: None,
            batch_delay_secs: 0.0,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Endpoint paths for each workflow.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Endpoints {
    #[serde(default = "default_send_code_path")]
    pub send_code: String,
    #[serde(default = "default_verify_code_path")]
    pub verify_code: String,
    #[serde(default = "default_signup_path")]
    pub signup: String,
    #[serde(default = "default_start_path")]
    pub start: String,
    #[serde(default = "default_ping_path")]
    pub ping: String,
}

fn default_send_code_path() -> String {
    "/v3/auth/verification/send-verification-code".to_string()
}

fn default_verify_code_path() -> String {
    "/v3/auth/verification/verify-code".to_string()
}

fn default_signup_path() -> String {
    "/v3/auth/signup".to_string()
}

fn default_start_path() -> String {
    "/v3/presence/start".to_string()
}

fn default_ping_path() -> String {
    "/v3/presence/ping".to_string()
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            send_code: default_send_code_path(),
            verify_code: default_verify_code_path(),
            signup: default_signup_path(),
            start: default_start_path(),
            ping: default_ping_path(),
        }
    }
}

/// Parameters of the signup payload that are fixed across a run.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SignupSettings {
    /// Verification code submitted in place of whatever the service sent.
    /// Only bypass-enabled environments accept it.
    #[serde(default = "default_bypass_code")]
    pub bypass_code: String,
    /// Password used for every generated account.
    #[serde(default = "default_password")]
    pub password: String,
    /// Profile image reference sent with the signup payload.
    #[serde(default = "default_profile_url")]
    pub profile_url: String,
    /// Domain used for generated email addresses.
    #[serde(default = "default_email_domain")]
    pub email_domain: String,
    /// Free-form profile description sent with the signup payload.
    #[serde(default)]
    pub description: String,
}

fn default_bypass_code() -> String {
    "000000".to_string()
}

fn default_password() -> String {
    "Load-Test-Passw0rd!".to_string()
}

fn default_profile_url() -> String {
    "https://metadata.ratel.foundation/ratel/default-profile.png".to_string()
}

fn default_email_domain() -> String {
    "example.com".to_string()
}

impl Default for SignupSettings {
    fn default() -> Self {
        Self {
            bypass_code: default_bypass_code(),
            password: default_password(),
            profile_url: default_profile_url(),
            email_domain: default_email_domain(),
            description: String::new(),
        }
    }
}

/// Output file locations.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OutputPaths {
    /// Newline-delimited session id store written by `start`, read by `ping`.
    #[serde(default = "default_sessions_path")]
    pub sessions: PathBuf,
    /// CSV report of successful signups.
    #[serde(default = "default_success_report_path")]
    pub success_report: PathBuf,
    /// CSV report of failed signups.
    #[serde(default = "default_failure_report_path")]
    pub failure_report: PathBuf,
}

fn default_sessions_path() -> PathBuf {
    PathBuf::from("sessions.txt")
}

fn default_success_report_path() -> PathBuf {
    PathBuf::from("signup_ok.csv")
}

fn default_failure_report_path() -> PathBuf {
    PathBuf::from("signup_fail.csv")
}

impl Default for OutputPaths {
    fn default() -> Self {
        Self {
            sessions: default_sessions_path(),
            success_report: default_success_report_path(),
            failure_report: default_failure_report_path(),
        }
    }
}

impl HarnessConfig {
    /// Parse a TOML string into a [`HarnessConfig`].
    ///
    /// Only syntax and schema are checked here; call [`validate`](Self::validate)
    /// once CLI overrides have been applied.
    pub fn from_toml(content: &str) -> Result<Self, LoadTestError> {
        Ok(toml::from_str(content)?)
    }

    /// Load a [`HarnessConfig`] from a file path.
    pub fn load(path: &Path) -> Result<Self, LoadTestError> {
        let content = std::fs::read_to_string(path).map_err(|source| LoadTestError::ConfigIo {
            source,
            path: path.display().to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Returns the base URL without a trailing slash.
    pub fn base_url(&self) -> Result<&str, LoadTestError> {
        match self.target.base_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Ok(url.trim_end_matches('/')),
            _ => Err(LoadTestError::MissingConfig {
                field: "target.base_url".to_string(),
            }),
        }
    }

    /// Join an endpoint path onto the base URL.
    pub fn endpoint_url(&self, path: &str) -> Result<String, LoadTestError> {
        let base = self.base_url()?;
        if path.starts_with('/') {
            Ok(format!("{base}{path}"))
        } else {
            Ok(format!("{base}/{path}"))
        }
    }

    /// Validate that the config is semantically correct.
    ///
    /// Checks:
    /// - A base URL is present and parses as an absolute http(s) URL
    /// - `concurrency` and `timeout_secs` are positive
    /// - `batch_size`, when set, is positive
    /// - `batch_delay_secs` is finite and not negative
    /// - The bypass code is not empty
    pub fn validate(&self) -> Result<(), LoadTestError> {
        let base = self.base_url()?;
        let parsed = url::Url::parse(base).map_err(|e| LoadTestError::ConfigValidation {
            message: format!("target.base_url '{base}' is not a valid URL: {e}"),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(LoadTestError::ConfigValidation {
                message: format!(
                    "target.base_url must use http or https, got '{}'",
                    parsed.scheme()
                ),
            });
        }

        if self.settings.concurrency == 0 {
            return Err(LoadTestError::ConfigValidation {
                message: "settings.concurrency must be at least 1".to_string(),
            });
        }

        if self.settings.batch_size == Some(0) {
            return Err(LoadTestError::ConfigValidation {
                message: "settings.batch_size must be at least 1 when set".to_string(),
            });
        }

        if !self.settings.batch_delay_secs.is_finite() || self.settings.batch_delay_secs < 0.0 {
            return Err(LoadTestError::ConfigValidation {
                message: format!(
                    "settings.batch_delay_secs must be a non-negative number, got {}",
                    self.settings.batch_delay_secs
                ),
            });
        }

        if self.settings.timeout_secs == 0 {
            return Err(LoadTestError::ConfigValidation {
                message: "settings.timeout_secs must be at least 1".to_string(),
            });
        }

        if self.signup.bypass_code.trim().is_empty() {
            return Err(LoadTestError::ConfigValidation {
                message: "signup.bypass_code must not be empty".to_string(),
            });
        }

        Ok(())
    }
}

impl Settings {
    /// Convert the `timeout_secs` field to a [`Duration`].
    pub fn timeout_as_duration(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Convert the `batch_delay_secs` field to a [`Duration`].
    ///
    /// Invalid values map to zero; [`HarnessConfig::validate`] rejects them
    /// before a run starts.
    pub fn batch_delay_as_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.batch_delay_secs).unwrap_or(Duration::ZERO)
    }
}
