//! Final terminal summary for a finished run.
//!
//! Pure functions: each renderer takes the run result and returns a
//! [`String`]. Colors come from `colored`, which honors the global override
//! set when `--no-color` is active or output is piped.
//!
//! ```text
//!   authload signup
//!   target:       https://api.example.com
//!   tasks:        100  (concurrency 50, 2 batches)
//!
//!   ok=97 fail=3
//!
//!   task_duration...................: p50=45ms  p95=200ms  p99=450ms  max=812ms
//!   task_ok.........................: 97
//!   task_fail.......................: 3
//!   task_throughput.................: 15.8 tasks/s
//!   task_elapsed....................: 6.3s
//!
//!   errors:
//!     http..........................: 3
//! ```

use colored::Colorize;

use crate::loadtest::config::HarnessConfig;
use crate::loadtest::engine::{PingRunResult, RunStats, SignupRunResult, StartRunResult};
use crate::loadtest::generator::WorkKind;

/// Width for dotted metric row padding.
const PAD_WIDTH: usize = 34;

/// Summary for a signup run, including where the reports were written.
pub fn render_signup_summary(result: &SignupRunResult, config: &HarnessConfig) -> String {
    let mut lines = vec![
        render_header(WorkKind::Signup, &result.stats, config),
        format!("  {}", colorize_counts(&result.stats)),
        String::new(),
    ];
    lines.extend(render_stats(&result.stats));
    lines.push(String::new());
    lines.push(format_metric_row(
        "success_report",
        &format!(
            "{} ({} rows)",
            config.output.success_report.display(),
            result.success_rows.len()
        ),
        PAD_WIDTH,
    ));
    lines.push(format_metric_row(
        "failure_report",
        &format!(
            "{} ({} rows)",
            config.output.failure_report.display(),
            result.failure_rows.len()
        ),
        PAD_WIDTH,
    ));
    lines.join("\n")
}

/// Summary for a start run, including how many ids reached the store.
pub fn render_start_summary(result: &StartRunResult, config: &HarnessConfig) -> String {
    let mut lines = vec![
        render_header(WorkKind::Start, &result.stats, config),
        format!("  {}", colorize_counts(&result.stats)),
        String::new(),
    ];
    lines.extend(render_stats(&result.stats));
    lines.push(String::new());
    lines.push(format_metric_row(
        "sessions_saved",
        &format!(
            "{} -> {}",
            result.persisted.len(),
            config.output.sessions.display()
        ),
        PAD_WIDTH,
    ));
    lines.join("\n")
}

/// Summary for a ping run: `pinged=<total> total=<total> ok=<ok>`.
pub fn render_ping_summary(result: &PingRunResult, config: &HarnessConfig) -> String {
    let mut lines = vec![
        render_header(WorkKind::Ping, &result.stats, config),
        format!("  {}", result.summary_line().bold()),
    ];
    if result.stats.total > 0 {
        lines.push(String::new());
        lines.extend(render_stats(&result.stats));
    }
    lines.join("\n")
}

fn render_header(kind: WorkKind, stats: &RunStats, config: &HarnessConfig) -> String {
    let target = config.base_url().unwrap_or("(unset)");
    format!(
        "\n  {}\n  target:       {}\n  tasks:        {}  (concurrency {}, {} {})\n",
        format!("authload {kind}").bold(),
        target,
        stats.total,
        config.settings.concurrency,
        stats.batches,
        if stats.batches == 1 { "batch" } else { "batches" },
    )
}

fn colorize_counts(stats: &RunStats) -> String {
    let ok = format!("ok={}", stats.ok).green();
    let fail = format!("fail={}", stats.fail);
    if stats.fail > 0 {
        format!("{ok} {}", fail.red())
    } else {
        format!("{ok} {fail}")
    }
}

fn render_stats(stats: &RunStats) -> Vec<String> {
    let snap = &stats.latency;
    let mut lines = Vec::new();

    let latency = format!(
        "p50={}ms  p95={}ms  p99={}ms  max={}ms",
        snap.p50, snap.p95, snap.p99, snap.max
    );
    let latency = if snap.p99 < 1000 {
        latency.green().to_string()
    } else {
        latency.yellow().to_string()
    };
    lines.push(format_metric_row("task_duration", &latency, PAD_WIDTH));
    lines.push(format_metric_row(
        "task_ok",
        &stats.ok.to_string().green().to_string(),
        PAD_WIDTH,
    ));

    let fail = if stats.fail > 0 {
        stats.fail.to_string().red().to_string()
    } else {
        stats.fail.to_string()
    };
    lines.push(format_metric_row("task_fail", &fail, PAD_WIDTH));
    lines.push(format_metric_row(
        "task_throughput",
        &format!("{:.1} tasks/s", stats.throughput()),
        PAD_WIDTH,
    ));
    lines.push(format_metric_row(
        "task_elapsed",
        &format!("{:.1}s", stats.elapsed.as_secs_f64()),
        PAD_WIDTH,
    ));

    if !snap.error_categories.is_empty() {
        lines.push(String::new());
        lines.push("  errors:".to_string());
        let mut categories: Vec<_> = snap.error_categories.iter().collect();
        categories.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (category, count) in categories {
            lines.push(format_metric_row(
                &format!("  {category}"),
                &count.to_string().red().to_string(),
                PAD_WIDTH,
            ));
        }
    }

    lines
}

/// `"  metric_name..........: value"`
fn format_metric_row(name: &str, value: &str, pad_width: usize) -> String {
    format!("  {name:.<pad_width$}: {value}")
}
