//! ClickHouse check
//!
//! Queries the `system.metrics`, `system.events` and
//! `system.asynchronous_metrics` tables over the ClickHouse HTTP interface.
//! Every collection method runs on each cycle; one failing method is logged
//! and the others still report.

pub mod check;
pub mod client;
pub mod config;
pub mod error;
pub mod queries;

pub use check::{
    CAN_CONNECT, CHECK_NAME, ClickhouseCheck, CollectionMethod, QueryMethod,
    default_collection_methods,
};
pub use client::{ClickhouseClient, HttpClickhouseClient};
pub use config::{ClickhouseConfig, ClickhouseInstance};
pub use error::{ClickhouseError, ErrorSanitizer};
pub use queries::{Column, QUERIES, Query};
