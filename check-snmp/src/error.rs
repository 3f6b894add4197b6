//! Error types for the SNMP check.

use thiserror::Error;

use integrations_base::CheckError;

/// Errors raised while loading or resolving MIB modules.
#[derive(Debug, Error)]
pub enum MibError {
    #[error("MIB module '{0}' not found")]
    NotFound(String),

    #[error("MIB module '{module}' has no symbol '{symbol}'")]
    UnknownSymbol { module: String, symbol: String },

    #[error("MIB module '{module}' is not loaded")]
    NotLoaded { module: String },

    #[error("invalid MIB module '{module}': {message}")]
    Parse { module: String, message: String },

    #[error("failed to fetch MIB '{mib}': {message}")]
    Fetch { mib: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while talking to an SNMP agent.
#[derive(Debug, Error)]
pub enum SnmpError {
    #[error("invalid OID '{0}'")]
    InvalidOid(String),

    #[error("failed to create SNMP session for {target}: {message}")]
    Session { target: String, message: String },

    #[error("SNMP {request} timed out after {attempts} attempt(s)")]
    Timeout {
        request: &'static str,
        attempts: u32,
    },

    #[error("SNMP {request} failed: {message}")]
    Request {
        request: &'static str,
        message: String,
    },

    #[error(transparent)]
    Mib(#[from] MibError),
}

impl From<SnmpError> for CheckError {
    fn from(err: SnmpError) -> Self {
        match err {
            SnmpError::InvalidOid(_) => CheckError::configuration(err.to_string()),
            other => CheckError::collection(other.to_string()),
        }
    }
}

impl From<MibError> for CheckError {
    fn from(err: MibError) -> Self {
        CheckError::collection(err.to_string())
    }
}
