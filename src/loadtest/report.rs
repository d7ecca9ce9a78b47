//! Result aggregation and tabular CSV reports.
//!
//! [`aggregate`] partitions finished outcomes into ok/fail in one pass. The
//! signup workflow then writes two CSV files with a header row:
//!
//! ```text
//! email,password,username,display_name,cookie
//! step,status,email,body
//! ```
//!
//! Failure bodies are cut to [`BODY_LIMIT`] characters so reports stay
//! readable. Fields are quoted only when they contain a delimiter, a quote,
//! or a line break.

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use crate::loadtest::error::{LoadTestError, RequestError};
use crate::loadtest::signup::SignupOutcome;

/// Maximum number of characters of a response body kept in the failure report.
pub const BODY_LIMIT: usize = 200;

/// Common view over every workflow's per-task result.
pub trait Outcome {
    /// `true` when the task reached its success criterion.
    fn is_ok(&self) -> bool;

    /// The request error behind a failure, if the failure had one.
    fn error(&self) -> Option<&RequestError>;

    /// Wall-clock time the task spent running.
    fn elapsed(&self) -> Duration;
}

/// Outcomes partitioned by their `ok` flag.
#[derive(Debug, Clone)]
pub struct Aggregate<T> {
    pub ok: Vec<T>,
    pub fail: Vec<T>,
}

impl<T> Aggregate<T> {
    pub fn total(&self) -> usize {
        self.ok.len() + self.fail.len()
    }

    /// `ok=<n> fail=<n>`
    pub fn summary_line(&self) -> String {
        format!("ok={} fail={}", self.ok.len(), self.fail.len())
    }
}

/// Partitions `results` by [`Outcome::is_ok`], keeping relative order.
pub fn aggregate<T: Outcome>(results: Vec<T>) -> Aggregate<T> {
    let (ok, fail) = results.into_iter().partition(|r| r.is_ok());
    Aggregate { ok, fail }
}

/// Cuts `body` to at most `limit` characters.
pub fn truncate_body(body: &str, limit: usize) -> String {
    match body.char_indices().nth(limit) {
        Some((byte_idx, _)) => body[..byte_idx].to_string(),
        None => body.to_string(),
    }
}

/// One row of the success report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuccessRow {
    pub email: String,
    pub password: String,
    pub username: String,
    pub display_name: String,
    /// Authentication cookie captured from the signup response.
    pub cookie: String,
}

impl SuccessRow {
    pub const HEADER: [&'static str; 5] =
        ["email", "password", "username", "display_name", "cookie"];

    /// Builds the row for a successful signup; `None` for a failed one.
    pub fn from_outcome(outcome: &SignupOutcome, password: &str) -> Option<Self> {
        if !outcome.ok {
            return None;
        }
        Some(Self {
            email: outcome.identity.email.clone(),
            password: password.to_string(),
            username: outcome.identity.username.clone(),
            display_name: outcome.identity.display_name.clone(),
            cookie: outcome.cookie.clone().unwrap_or_default(),
        })
    }

    fn fields(&self) -> [&str; 5] {
        [
            &self.email,
            &self.password,
            &self.username,
            &self.display_name,
            &self.cookie,
        ]
    }
}

/// One row of the failure report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRow {
    pub step: String,
    /// HTTP status, or the error category when no response arrived.
    pub status: String,
    pub email: String,
    /// Response body or error text, truncated to [`BODY_LIMIT`].
    pub body: String,
}

impl FailureRow {
    pub const HEADER: [&'static str; 4] = ["step", "status", "email", "body"];

    /// Builds the row for a failed signup; `None` for a successful one.
    pub fn from_outcome(outcome: &SignupOutcome) -> Option<Self> {
        if outcome.ok {
            return None;
        }
        Some(Self {
            step: outcome
                .failing_step
                .map(|s| s.to_string())
                .unwrap_or_default(),
            status: outcome.status_label(),
            email: outcome.identity.email.clone(),
            body: truncate_body(&outcome.body, BODY_LIMIT),
        })
    }

    fn fields(&self) -> [&str; 4] {
        [&self.step, &self.status, &self.email, &self.body]
    }
}

/// Writes the success report and returns the number of data rows.
pub fn write_success_report(path: &Path, rows: &[SuccessRow]) -> Result<usize, LoadTestError> {
    write_csv(path, &SuccessRow::HEADER, rows.iter().map(|r| r.fields()))?;
    tracing::info!(path = %path.display(), rows = rows.len(), "success report written");
    Ok(rows.len())
}

/// Writes the failure report and returns the number of data rows.
pub fn write_failure_report(path: &Path, rows: &[FailureRow]) -> Result<usize, LoadTestError> {
    write_csv(path, &FailureRow::HEADER, rows.iter().map(|r| r.fields()))?;
    tracing::info!(path = %path.display(), rows = rows.len(), "failure report written");
    Ok(rows.len())
}

/// Reads a success report written by [`write_success_report`].
pub fn read_success_report(path: &Path) -> Result<Vec<SuccessRow>, LoadTestError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadTestError::Io {
        source,
        path: path.display().to_string(),
    })?;
    let malformed = |line: usize, message: String| LoadTestError::ReportFormat {
        path: path.display().to_string(),
        line,
        message,
    };

    let records = parse_records(&text).map_err(|(line, message)| malformed(line, message))?;
    let mut records = records.into_iter();

    match records.next() {
        Some((_, header)) if header == SuccessRow::HEADER => {},
        Some((line, header)) => {
            return Err(malformed(line, format!("unexpected header {header:?}")));
        },
        None => return Err(malformed(1, "missing header row".to_string())),
    }

    records
        .map(|(line, record)| match <[String; 5]>::try_from(record) {
            Ok([email, password, username, display_name, cookie]) => Ok(SuccessRow {
                email,
                password,
                username,
                display_name,
                cookie,
            }),
            Err(record) => Err(malformed(
                line,
                format!("expected 5 fields, found {}", record.len()),
            )),
        })
        .collect()
}

fn write_csv<'a, const N: usize>(
    path: &Path,
    header: &[&str; N],
    rows: impl Iterator<Item = [&'a str; N]>,
) -> Result<(), LoadTestError> {
    let io_err = |source| LoadTestError::Io {
        source,
        path: path.display().to_string(),
    };
    let mut file = BufWriter::new(File::create(path).map_err(io_err)?);
    writeln!(file, "{}", join_record(header)).map_err(io_err)?;
    for row in rows {
        writeln!(file, "{}", join_record(&row)).map_err(io_err)?;
    }
    file.flush().map_err(io_err)
}

fn join_record(fields: &[&str]) -> String {
    fields
        .iter()
        .map(|f| escape_field(f))
        .collect::<Vec<_>>()
        .join(",")
}

fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Splits CSV text into records, each tagged with its starting line number.
fn parse_records(text: &str) -> Result<Vec<(usize, Vec<String>)>, (usize, String)> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut record_line = 1;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                },
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                },
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {},
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push((record_line, std::mem::take(&mut record)));
                line += 1;
                record_line = line;
            },
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err((record_line, "unterminated quoted field".to_string()));
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push((record_line, record));
    }
    Ok(records)
}
