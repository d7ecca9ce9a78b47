//! Subcommand implementations: resolve config, build the engine, run, print.

use anyhow::{Context, Result};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use authload::loadtest::client::ReqwestAdapter;
use authload::loadtest::config::HarnessConfig;
use authload::loadtest::display::use_color;
use authload::loadtest::engine::LoadTestEngine;
use authload::loadtest::summary::{
    render_ping_summary, render_signup_summary, render_start_summary,
};

use super::{GlobalArgs, SessionArgs, SignupArgs};

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "authload.toml";

pub async fn execute_signup(global: GlobalArgs, args: SignupArgs) -> Result<()> {
    let mut config = load_config(&global)?;
    apply_overrides(&mut config, &global);
    apply_signup_overrides(&mut config, &args);

    let engine = build_engine(config, &global)?;
    let result = engine.run_signup().await.context("Signup run failed")?;

    prepare_stdout(global.no_color);
    println!("{}", render_signup_summary(&result, engine.config()));
    Ok(())
}

pub async fn execute_start(global: GlobalArgs, args: SessionArgs) -> Result<()> {
    let mut config = load_config(&global)?;
    apply_overrides(&mut config, &global);
    apply_session_overrides(&mut config, &args);

    let engine = build_engine(config, &global)?;
    let result = engine.run_start().await.context("Start run failed")?;

    prepare_stdout(global.no_color);
    println!("{}", render_start_summary(&result, engine.config()));
    Ok(())
}

pub async fn execute_ping(global: GlobalArgs, args: SessionArgs) -> Result<()> {
    let mut config = load_config(&global)?;
    apply_overrides(&mut config, &global);
    apply_session_overrides(&mut config, &args);

    let engine = build_engine(config, &global)?;
    let result = engine.run_ping().await.context("Ping run failed")?;

    prepare_stdout(global.no_color);
    println!("{}", render_ping_summary(&result, engine.config()));
    Ok(())
}

fn build_engine(config: HarnessConfig, global: &GlobalArgs) -> Result<LoadTestEngine> {
    config.validate().context("Invalid configuration")?;
    let adapter = ReqwestAdapter::new(config.target.insecure, config.settings.concurrency)?;
    let engine = LoadTestEngine::new(Arc::new(config), Arc::new(adapter))?
        .with_no_color(global.no_color);
    Ok(engine)
}

fn prepare_stdout(no_color: bool) {
    if !use_color(no_color, std::io::stdout().is_terminal()) {
        colored::control::set_override(false);
    }
}

/// Loads the config named by `--config`, else `./authload.toml` when it
/// exists, else the built-in defaults.
fn load_config(global: &GlobalArgs) -> Result<HarnessConfig> {
    match resolve_config_path(global.config.as_deref(), Path::new(DEFAULT_CONFIG_FILE)) {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            tracing::info!(path = %path.display(), "loading config");
            HarnessConfig::load(&path)
                .with_context(|| format!("Failed to load config '{}'", path.display()))
        },
        None => Ok(HarnessConfig::default()),
    }
}

fn resolve_config_path(explicit: Option<&Path>, fallback: &Path) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None if fallback.is_file() => Some(fallback.to_path_buf()),
        None => None,
    }
}

/// Apply global CLI flag overrides to a loaded config.
fn apply_overrides(config: &mut HarnessConfig, global: &GlobalArgs) {
    if let Some(ref url) = global.base_url {
        config.target.base_url = Some(url.clone());
    }
    if global.insecure {
        config.target.insecure = true;
    }
    if let Some(count) = global.count {
        config.settings.count = count;
    }
    if let Some(concurrency) = global.concurrency {
        config.settings.concurrency = concurrency;
    }
    if let Some(size) = global.batch_size {
        config.settings.batch_size = Some(size);
    }
    if let Some(delay) = global.batch_delay {
        config.settings.batch_delay_secs = delay;
    }
    if let Some(timeout) = global.timeout {
        config.settings.timeout_secs = timeout;
    }
}

fn apply_signup_overrides(config: &mut HarnessConfig, args: &SignupArgs) {
    if let Some(ref code) = args.bypass_code {
        config.signup.bypass_code = code.clone();
    }
    if let Some(ref password) = args.password {
        config.signup.password = password.clone();
    }
    if let Some(ref url) = args.profile_url {
        config.signup.profile_url = url.clone();
    }
    if let Some(ref path) = args.success_report {
        config.output.success_report = path.clone();
    }
    if let Some(ref path) = args.failure_report {
        config.output.failure_report = path.clone();
    }
}

fn apply_session_overrides(config: &mut HarnessConfig, args: &SessionArgs) {
    if let Some(ref path) = args.sessions {
        config.output.sessions = path.clone();
    }
}
