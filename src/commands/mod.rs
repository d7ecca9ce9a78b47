//! `authload` CLI subcommands.
//!
//! Provides `signup`, `start`, and `ping`. Flags override the TOML config,
//! and every flag can also be supplied through an `AUTHLOAD_*` variable.

mod run;

use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Flags shared by every subcommand.
#[derive(Debug, Clone, Default, Args)]
pub struct GlobalArgs {
    /// Path to config file (default: ./authload.toml when present)
    #[arg(long, global = true, env = "AUTHLOAD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Base URL of the service under test
    #[arg(long, global = true, env = "AUTHLOAD_BASE_URL")]
    pub base_url: Option<String>,

    /// Number of tasks to run (signup and start)
    #[arg(long, global = true, env = "AUTHLOAD_COUNT")]
    pub count: Option<usize>,

    /// Maximum number of requests in flight
    #[arg(long, global = true, env = "AUTHLOAD_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Split the run into batches of this many tasks
    #[arg(long, global = true, env = "AUTHLOAD_BATCH_SIZE")]
    pub batch_size: Option<usize>,

    /// Seconds to pause between batches
    #[arg(long, global = true, env = "AUTHLOAD_BATCH_DELAY")]
    pub batch_delay: Option<f64>,

    /// Per-request timeout in seconds
    #[arg(long, global = true, env = "AUTHLOAD_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Accept invalid TLS certificates
    #[arg(long, global = true, env = "AUTHLOAD_INSECURE")]
    pub insecure: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Log run progress at info level
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

/// Flags of the `signup` subcommand.
#[derive(Debug, Clone, Default, Args)]
pub struct SignupArgs {
    /// Verification code the service accepts without delivery
    #[arg(long, env = "AUTHLOAD_BYPASS_CODE")]
    pub bypass_code: Option<String>,

    /// Password used for every account
    #[arg(long, env = "AUTHLOAD_PASSWORD")]
    pub password: Option<String>,

    /// Profile image URL sent with every signup
    #[arg(long, env = "AUTHLOAD_PROFILE_URL")]
    pub profile_url: Option<String>,

    /// Where to write the success report
    #[arg(long, env = "AUTHLOAD_SUCCESS_REPORT")]
    pub success_report: Option<PathBuf>,

    /// Where to write the failure report
    #[arg(long, env = "AUTHLOAD_FAILURE_REPORT")]
    pub failure_report: Option<PathBuf>,
}

/// Flags of the `start` and `ping` subcommands.
#[derive(Debug, Clone, Default, Args)]
pub struct SessionArgs {
    /// Session store file
    #[arg(long, env = "AUTHLOAD_SESSIONS")]
    pub sessions: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the three-step signup pipeline for COUNT fresh identities
    ///
    /// Writes a success report with credentials and captured cookies and a
    /// failure report with the failing step, status, and response body.
    Signup(SignupArgs),

    /// Start COUNT sessions and save their ids to the session store
    Start(SessionArgs),

    /// Ping every session id saved by a previous `start` run
    Ping(SessionArgs),
}

impl Command {
    /// Execute the selected subcommand.
    pub fn execute(self, global: GlobalArgs) -> Result<()> {
        let runtime = tokio::runtime::Runtime::new()?;
        match self {
            Command::Signup(args) => runtime.block_on(run::execute_signup(global, args)),
            Command::Start(args) => runtime.block_on(run::execute_start(global, args)),
            Command::Ping(args) => runtime.block_on(run::execute_ping(global, args)),
        }
    }
}
