//! Live per-completion output.
//!
//! Every finished task prints one status line on stdout as soon as the
//! executor hands it over, so lines appear in completion order. Their colors
//! follow stdout. A progress bar on stderr counts finished tasks; it is hidden
//! when stderr is not a terminal. The line formatters are pure so they can be tested without a
//! terminal.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;

use crate::loadtest::report::Outcome;
use crate::loadtest::session::{PingOutcome, StartOutcome};
use crate::loadtest::signup::SignupOutcome;

/// One-line description of a finished task.
pub trait StatusLine: Outcome {
    /// Plain text following the `OK`/`FAIL` tag.
    fn describe(&self) -> String;
}

impl StatusLine for SignupOutcome {
    fn describe(&self) -> String {
        match self.failing_step {
            None => self.identity.email.clone(),
            Some(step) => format!("{step} {} {}", self.status_label(), self.identity.email),
        }
    }
}

impl StatusLine for StartOutcome {
    fn describe(&self) -> String {
        match &self.session {
            Ok(session) => format!("#{} session={session}", self.index),
            Err(err) => format!("#{} {}", self.index, err.error_category()),
        }
    }
}

impl StatusLine for PingOutcome {
    fn describe(&self) -> String {
        match &self.result {
            Ok(()) => format!("session={}", self.session),
            Err(err) => format!("session={} {}", self.session, err.error_category()),
        }
    }
}

/// Formats the status line for one outcome: `OK <details>` or `FAIL <details>`.
pub fn format_status_line<T: StatusLine>(outcome: &T) -> String {
    let tag = if outcome.is_ok() {
        "OK".green().bold()
    } else {
        "FAIL".red().bold()
    };
    format!("  {tag} {}", outcome.describe())
}

/// Whether stdout output should carry ANSI colors.
pub fn use_color(no_color: bool, stdout_is_terminal: bool) -> bool {
    !no_color && stdout_is_terminal
}

/// Progress bar plus streamed status lines for one run.
pub struct LiveDisplay {
    bar: ProgressBar,
    quiet: bool,
}

impl LiveDisplay {
    /// Creates a display for `total` tasks.
    ///
    /// Colors are switched off when `no_color` is set or stdout, where the
    /// status lines go, is not a terminal. The bar draws on stderr and is
    /// shown only when stderr is a terminal.
    pub fn new(total: usize, label: &str, no_color: bool) -> Self {
        if !use_color(no_color, std::io::stdout().is_terminal()) {
            colored::control::set_override(false);
        }

        let bar = if std::io::stderr().is_terminal() {
            ProgressBar::new(total as u64)
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) =
            ProgressStyle::with_template("  {prefix:.cyan} [{bar:30}] {pos}/{len} {elapsed_precise}")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_prefix(label.to_string());

        Self { bar, quiet: false }
    }

    /// A display that prints nothing.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            quiet: true,
        }
    }

    /// Prints the status line for `outcome` and advances the bar.
    pub fn on_result<T: StatusLine>(&self, outcome: &T) {
        if self.quiet {
            return;
        }
        let line = format_status_line(outcome);
        self.bar.suspend(|| println!("{line}"));
        self.bar.inc(1);
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
