//! Harbor check
//!
//! Reports the reachability and health of a Harbor container registry, the
//! status of its replication endpoints, its project count and the storage
//! left on its volume.

pub mod api;
pub mod check;
pub mod config;
pub mod error;

pub use api::{ComponentHealth, HarborApi, HarborClient, Health, Registry, Storage};
pub use check::{CAN_CONNECT, CHECK_NAME, HarborCheck, REGISTRY_STATUS, STATUS};
pub use config::{HarborConfig, HarborInstance};
pub use error::HarborError;
