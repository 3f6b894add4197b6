//! Integrations Base
//!
//! Common abstractions for building agent checks that publish their
//! submissions over Zenoh.
//!
//! # Overview
//!
//! This framework provides:
//! - [`AgentCheck`] trait implemented by every check instance
//! - [`Aggregator`] buffer a check run submits into
//! - [`CheckConfig`] trait and the [`CheckConfigFile`] `conf.yaml` layout
//! - [`CheckRunner`] for managing check lifecycle (scheduling, shutdown, signal handling)
//! - [`Publisher`] for publishing submissions to Zenoh with automatic serialization
//! - [`CheckArgs`] for common CLI argument parsing
//! - [`CheckStatus`] for standardized status reporting
//!
//! # Example
//!
//! ```ignore
//! use integrations_base::{CheckConfigFile, min_collection_interval, run_check_main};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     run_check_main("mycheck", "conf.yaml", |config: &CheckConfigFile| {
//!         let checks = config
//!             .instances
//!             .iter()
//!             .map(|instance| (MyCheck::new(instance), min_collection_interval(instance)))
//!             .collect();
//!         async move { Ok(checks) }
//!     })
//!     .await
//! }
//! ```

mod aggregator;
mod args;
mod check;
mod config;
mod error;
mod publisher;
mod runner;
mod status;
pub mod testing;

pub use aggregator::{Aggregator, Submissions};
pub use args::CheckArgs;
pub use check::{AgentCheck, run_check};
pub use config::{
    CheckConfig, CheckConfigFile, DEFAULT_MIN_COLLECTION_INTERVAL_SECS, min_collection_interval,
};
pub use error::{CheckError, Result};
pub use publisher::{PublishStats, Publisher};
pub use runner::{CheckRunner, RunReport, init_logging, run_check_main, run_once};
pub use status::CheckStatus;

// Re-export commonly used types from integrations-common
pub use async_trait::async_trait;
pub use integrations_common::{
    Format, LoggingConfig, MetricSample, MetricType, ServiceCheck, ServiceCheckStatus, ZenohConfig,
    as_float, as_int, is_affirmative,
};
