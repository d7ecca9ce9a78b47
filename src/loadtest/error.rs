//! Error types for the load generation harness.
//!
//! Defines [`LoadTestError`] for configuration and file errors that abort a
//! run, and [`RequestError`] for per-request failures that are recorded on a
//! single task outcome and never abort the run.

/// Errors that occur during configuration parsing, validation, or file I/O.
///
/// These are the only errors that stop a run. Configuration errors are
/// detected before any task is submitted.
#[derive(Debug, thiserror::Error)]
pub enum LoadTestError {
    /// TOML parse failure -- the config file contains invalid TOML syntax
    /// or does not match the expected schema.
    #[error("Failed to parse config TOML: {source}")]
    ConfigParse {
        #[from]
        source: toml::de::Error,
    },

    /// Semantic validation failure -- the config parsed successfully but
    /// contains invalid values (e.g., zero concurrency, zero batch size).
    #[error("Config validation error: {message}")]
    ConfigValidation { message: String },

    /// A mandatory setting has no value from any source.
    #[error("Missing required configuration: {field}")]
    MissingConfig { field: String },

    /// File I/O failure -- the config file could not be read from disk.
    #[error("Failed to read config file '{path}': {source}")]
    ConfigIo {
        source: std::io::Error,
        path: String,
    },

    /// Session store or report file could not be read or written.
    #[error("I/O error on '{path}': {source}")]
    Io {
        source: std::io::Error,
        path: String,
    },

    /// A report file read back from disk is not in the expected shape.
    #[error("Malformed report '{path}' at line {line}: {message}")]
    ReportFormat {
        path: String,
        line: usize,
        message: String,
    },

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {message}")]
    Client { message: String },
}

/// Per-request failure recorded on a task outcome.
///
/// Each variant is a distinct category that the metrics pipeline counts and
/// reports separately. Start and ping workflows collapse all of them into a
/// boolean failure, but the variant stays available on the outcome.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// Connection-level failure (DNS resolution, TCP connect, TLS handshake,
    /// or the body stream breaking mid-read).
    #[error("Connection error: {message}")]
    Network { message: String },

    /// The request exceeded the configured per-request timeout.
    #[error("Request timed out")]
    Timeout,

    /// The service answered with a status other than the success code.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The response body could not be decoded into the expected shape.
    #[error("Failed to decode response: {message}")]
    Decode { message: String },

    /// The service signaled that no session was actually created.
    #[error("Service reported that no session was created")]
    Sentinel,

    /// The service answered successfully but reported `success: false`.
    #[error("Service rejected the request: {body}")]
    Rejected { body: String },
}

impl RequestError {
    /// Returns the error category as a static string for metrics classification.
    ///
    /// Categories: `"network"`, `"timeout"`, `"http"`, `"decode"`,
    /// `"sentinel"`, `"rejected"`.
    pub fn error_category(&self) -> &'static str {
        match self {
            Self::Network { .. } => "network",
            Self::Timeout => "timeout",
            Self::Http { .. } => "http",
            Self::Decode { .. } => "decode",
            Self::Sentinel => "sentinel",
            Self::Rejected { .. } => "rejected",
        }
    }

    /// Returns the HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` for failures that happened before a response arrived.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout)
    }

    /// Classify a [`reqwest::Error`] into the appropriate [`RequestError`] variant.
    pub fn classify_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode {
                message: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            Self::Http {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            Self::Network {
                message: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_network() {
        let err = RequestError::Network {
            message: "connection refused".to_string(),
        };
        assert_eq!(err.error_category(), "network");
        assert!(err.is_transport());
    }

    #[test]
    fn test_error_category_timeout() {
        assert_eq!(RequestError::Timeout.error_category(), "timeout");
        assert!(RequestError::Timeout.is_transport());
    }

    #[test]
    fn test_error_category_http() {
        let err = RequestError::Http {
            status: 503,
            body: "unavailable".to_string(),
        };
        assert_eq!(err.error_category(), "http");
        assert_eq!(err.status(), Some(503));
        assert!(!err.is_transport());
    }

    #[test]
    fn test_error_category_decode_and_sentinel() {
        let err = RequestError::Decode {
            message: "expected value at line 1".to_string(),
        };
        assert_eq!(err.error_category(), "decode");
        assert_eq!(err.status(), None);
        assert_eq!(RequestError::Sentinel.error_category(), "sentinel");
    }

    #[test]
    fn test_error_category_rejected() {
        let err = RequestError::Rejected {
            body: r#"{"success":false}"#.to_string(),
        };
        assert_eq!(err.error_category(), "rejected");
    }

    #[test]
    fn test_display_http() {
        let err = RequestError::Http {
            status: 400,
            body: "bad code".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 400: bad code");
    }

    #[test]
    fn test_missing_config_message() {
        let err = LoadTestError::MissingConfig {
            field: "target.base_url".to_string(),
        };
        assert!(err.to_string().contains("target.base_url"));
    }
}
