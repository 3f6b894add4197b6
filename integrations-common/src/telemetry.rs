use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// How the agent should interpret a submitted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    /// Last value wins within a flush interval.
    Gauge,
    /// Raw counter value; the agent computes the per-second rate.
    Rate,
    /// Count of events within the interval.
    Count,
    /// Monotonically increasing counter; the agent submits deltas.
    MonotonicCount,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Gauge => "gauge",
            MetricType::Rate => "rate",
            MetricType::Count => "count",
            MetricType::MonotonicCount => "monotonic_count",
        }
    }
}

impl std::fmt::Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single metric sample emitted by a check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Unix epoch milliseconds when the measurement was taken.
    pub timestamp: i64,

    /// Name of the check that produced the sample (e.g., "snmp").
    pub check: String,

    /// Fully qualified metric name (e.g., "snmp.ifInOctets").
    pub name: String,

    /// Submission type.
    pub metric_type: MetricType,

    /// The measured value.
    pub value: f64,

    /// `key:value` tags attached to the sample.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Hostname override, when the check reports for a remote device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

impl MetricSample {
    /// Create a new sample with the current timestamp.
    pub fn new(
        check: impl Into<String>,
        name: impl Into<String>,
        metric_type: MetricType,
        value: f64,
    ) -> Self {
        Self {
            timestamp: current_timestamp_millis(),
            check: check.into(),
            name: name.into(),
            metric_type,
            value,
            tags: Vec::new(),
            hostname: None,
        }
    }

    /// Add a tag to this sample.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Add multiple tags to this sample.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Set the hostname override.
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }
}

/// Status reported by a service check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ServiceCheckStatus {
    Ok = 0,
    Warning = 1,
    Critical = 2,
    Unknown = 3,
}

impl From<ServiceCheckStatus> for u8 {
    fn from(status: ServiceCheckStatus) -> Self {
        status as u8
    }
}

impl TryFrom<u8> for ServiceCheckStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Ok),
            1 => Ok(Self::Warning),
            2 => Ok(Self::Critical),
            3 => Ok(Self::Unknown),
            other => Err(format!("invalid service check status: {}", other)),
        }
    }
}

impl std::fmt::Display for ServiceCheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Ok => "OK",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
            Self::Unknown => "UNKNOWN",
        };
        write!(f, "{}", s)
    }
}

/// A service check result emitted by a check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCheck {
    /// Unix epoch milliseconds when the check ran.
    pub timestamp: i64,

    /// Name of the check that produced the result.
    pub check: String,

    /// Service check name (e.g., "snmp.can_check").
    pub name: String,

    pub status: ServiceCheckStatus,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ServiceCheck {
    pub fn new(check: impl Into<String>, name: impl Into<String>, status: ServiceCheckStatus) -> Self {
        Self {
            timestamp: current_timestamp_millis(),
            check: check.into(),
            name: name.into(),
            status,
            tags: Vec::new(),
            message: None,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Get the current timestamp in milliseconds since Unix epoch.
///
/// Returns 0 if system time is before Unix epoch (should never happen in practice).
pub fn current_timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_sample_creation() {
        let sample = MetricSample::new("snmp", "snmp.ifInOctets", MetricType::Rate, 42.0)
            .with_tag("snmp_device:10.0.0.1")
            .with_tags(["interface:eth0"]);

        assert_eq!(sample.check, "snmp");
        assert_eq!(sample.name, "snmp.ifInOctets");
        assert_eq!(sample.metric_type, MetricType::Rate);
        assert_eq!(sample.tags, vec!["snmp_device:10.0.0.1", "interface:eth0"]);
        assert!(sample.hostname.is_none());
    }

    #[test]
    fn test_service_check_status_serializes_as_number() {
        let check = ServiceCheck::new("snmp", "snmp.can_check", ServiceCheckStatus::Critical)
            .with_message("timeout");

        let json = serde_json::to_value(&check).unwrap();
        assert_eq!(json["status"], 2);
        assert_eq!(json["message"], "timeout");

        let back: ServiceCheck = serde_json::from_value(json).unwrap();
        assert_eq!(back.status, ServiceCheckStatus::Critical);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ServiceCheckStatus::Ok.to_string(), "OK");
        assert_eq!(MetricType::MonotonicCount.to_string(), "monotonic_count");
    }
}
