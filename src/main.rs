//! authload: concurrent signup, session start, and session ping traffic
//! against an authentication/presence service.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;

/// Load generator for authentication and presence endpoints
#[derive(Parser)]
#[command(name = "authload")]
#[command(about = "Drive an auth/presence service with concurrent signup, start, and ping traffic", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: commands::GlobalArgs,

    #[command(subcommand)]
    command: commands::Command,
}

fn main() -> Result<()> {
    // A missing .env file is not an error.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    cli.command.execute(cli.global)
}

/// Logs go to stderr so summaries on stdout stay clean. `RUST_LOG` wins over
/// the default level.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
