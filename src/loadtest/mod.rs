//! Load generation harness for an authentication and presence HTTP service.
//!
//! Provides typed TOML configuration, a pluggable HTTP client adapter, the
//! signup step sequencer, the session start/ping clients, a bounded
//! concurrency executor, and result aggregation with CSV reports.

pub mod client;
pub mod config;
pub mod display;
pub mod engine;
pub mod error;
pub mod generator;
pub mod metrics;
pub mod pool;
pub mod report;
pub mod session;
pub mod signup;
pub mod store;
pub mod summary;
