//! Integrations Common Library
//!
//! This crate provides shared types and utilities for agent integration checks:
//!
//! - [`telemetry`] - Submission data model (`MetricSample`, `ServiceCheck`, `MetricType`)
//! - [`serialization`] - JSON/CBOR encoding and decoding
//! - [`config`] - Configuration loading (YAML or JSON5)
//! - [`values`] - Lenient readers for hand-written instance values
//! - [`session`] - Zenoh session management
//! - [`keyexpr`] - Key expression builders
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod keyexpr;
pub mod serialization;
pub mod session;
pub mod telemetry;
pub mod values;

// Re-export commonly used types at the crate root
pub use config::{
    BaseConfig, LogFormat, LoggingConfig, ZenohConfig, load_config, parse_config,
    parse_yaml_config,
};
pub use error::{Error, Result};
pub use keyexpr::{KEY_PREFIX, KeyExprBuilder};
pub use serialization::{Format, decode, encode};
pub use session::connect;
pub use telemetry::{
    MetricSample, MetricType, ServiceCheck, ServiceCheckStatus, current_timestamp_millis,
};
pub use values::{as_float, as_int, is_affirmative};

/// Initialize tracing with the given configuration.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Tracing(e.to_string()))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Tracing(e.to_string()))?;
        }
    }

    Ok(())
}
