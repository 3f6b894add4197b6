//! Check status reporting.

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::publisher::Publisher;

/// Check process status information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckStatus {
    /// Check name (e.g., "snmp", "clickhouse").
    pub check: String,
    /// Check version.
    pub version: String,
    /// Current status ("running", "offline", "error").
    pub status: String,
    /// Additional metadata (instance count, etc.).
    #[serde(flatten)]
    pub metadata: serde_json::Value,
}

impl CheckStatus {
    fn with_state(check: impl Into<String>, version: impl Into<String>, state: &str) -> Self {
        Self {
            check: check.into(),
            version: version.into(),
            status: state.to_string(),
            metadata: serde_json::Value::Null,
        }
    }

    /// Create a new status with "running" state.
    pub fn running(check: impl Into<String>, version: impl Into<String>) -> Self {
        Self::with_state(check, version, "running")
    }

    /// Create a status with "offline" state.
    pub fn offline(check: impl Into<String>, version: impl Into<String>) -> Self {
        Self::with_state(check, version, "offline")
    }

    /// Create a status with "error" state.
    pub fn error(
        check: impl Into<String>,
        version: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self::with_state(check, version, "error")
            .with_metadata(serde_json::json!({ "error": error.into() }))
    }

    /// Add metadata to the status.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Publish this status to `{key_prefix}/{check}/@/status`.
    pub async fn publish(&self, publisher: &Publisher) -> Result<()> {
        let key = publisher.keys().status_key();
        publisher.publish_json(&key, self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_running() {
        let status = CheckStatus::running("snmp", "0.1.0");
        assert_eq!(status.check, "snmp");
        assert_eq!(status.status, "running");
    }

    #[test]
    fn test_status_error_carries_message() {
        let status = CheckStatus::error("harbor", "0.1.0", "login failed");
        assert_eq!(status.status, "error");
        assert_eq!(status.metadata["error"], "login failed");
    }

    #[test]
    fn test_status_serialization() {
        let status = CheckStatus::running("clickhouse", "1.0.0")
            .with_metadata(serde_json::json!({ "instances": 2 }));

        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"check\":\"clickhouse\""));
        assert!(json.contains("\"status\":\"running\""));
        assert!(json.contains("\"instances\":2"));
    }
}
