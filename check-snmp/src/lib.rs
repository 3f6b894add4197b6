//! SNMP check
//!
//! Polls SNMP agents (v1, v2c and v3) for raw OIDs and MIB tables and
//! reports the values as metrics:
//!
//! - [`config`] turns `init_config` and each instance mapping into table walks,
//!   raw OID requests and security parameters
//! - [`mib`] resolves MIB symbols from compiled JSON modules, fetching missing
//!   modules through [`fetch`]
//! - [`profile`] matches devices to metric bundles by sysObjectID
//! - [`check`] collects and reports, and discovers devices in a network
//! - [`client`] abstracts the SNMP session over `snmp2`
//! - [`testing`] provides in-memory agents for tests

pub mod check;
pub mod client;
pub mod config;
pub mod error;
pub mod fetch;
pub mod mib;
pub mod network;
pub mod oid;
pub mod profile;
pub mod testing;

pub use check::{CAN_CHECK, CHECK_NAME, SnmpCheck};
pub use client::{Snmp2Client, Snmp2Connector, SnmpClient, SnmpConnector, SnmpValue, VarBind};
pub use config::{InitContext, InstanceConfig, SnmpInitConfig};
pub use error::{MibError, SnmpError};
pub use fetch::{MibFetcher, NoopMibFetcher, RemoteMibFetcher};
pub use mib::MibView;
pub use oid::Oid;
