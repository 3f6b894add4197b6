//! Submission publisher for Zenoh.

use std::sync::Arc;

use integrations_common::{Format, KeyExprBuilder, MetricSample, ServiceCheck, encode};

use crate::aggregator::Submissions;
use crate::error::{CheckError, Result};

/// Publisher for sending check submissions to the agent over Zenoh.
///
/// Wraps a Zenoh session and serializes [`MetricSample`] and
/// [`ServiceCheck`] values with the configured format.
#[derive(Clone, Debug)]
pub struct Publisher {
    session: Arc<zenoh::Session>,
    keys: KeyExprBuilder,
    format: Format,
}

impl Publisher {
    /// Create a new publisher for one check.
    pub fn new(
        session: Arc<zenoh::Session>,
        key_prefix: impl Into<String>,
        check: impl Into<String>,
        format: Format,
    ) -> Self {
        Self {
            session,
            keys: KeyExprBuilder::with_prefix(key_prefix, check),
            format,
        }
    }

    /// Get the serialization format.
    pub fn format(&self) -> Format {
        self.format
    }

    /// Get the key builder used for this check.
    pub fn keys(&self) -> &KeyExprBuilder {
        &self.keys
    }

    /// Publish a metric sample for an instance.
    pub async fn publish_metric(&self, instance: &str, sample: &MetricSample) -> Result<()> {
        let key = self.keys.build(instance, &sample.name);
        let payload =
            encode(sample, self.format).map_err(|e| CheckError::Serialization(e.to_string()))?;
        self.publish_raw(&key, payload).await
    }

    /// Publish a service check for an instance.
    pub async fn publish_service_check(&self, instance: &str, check: &ServiceCheck) -> Result<()> {
        let key = self.keys.service_check_key(instance, &check.name);
        let payload =
            encode(check, self.format).map_err(|e| CheckError::Serialization(e.to_string()))?;
        self.publish_raw(&key, payload).await
    }

    /// Publish everything a check run submitted.
    ///
    /// Returns the number of successful and failed puts; failures are logged.
    pub async fn flush(&self, instance: &str, submissions: &Submissions) -> PublishStats {
        let mut stats = PublishStats::default();

        for sample in &submissions.metrics {
            match self.publish_metric(instance, sample).await {
                Ok(()) => stats.success += 1,
                Err(e) => {
                    stats.failed += 1;
                    tracing::warn!(error = %e, metric = %sample.name, "Failed to publish metric");
                }
            }
        }

        for check in &submissions.service_checks {
            match self.publish_service_check(instance, check).await {
                Ok(()) => stats.success += 1,
                Err(e) => {
                    stats.failed += 1;
                    tracing::warn!(error = %e, service_check = %check.name, "Failed to publish service check");
                }
            }
        }

        stats
    }

    /// Publish raw bytes to a key (for status messages, etc.).
    pub async fn publish_raw(&self, key: &str, payload: Vec<u8>) -> Result<()> {
        self.session
            .put(key, payload)
            .await
            .map_err(|e| CheckError::Publish {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        tracing::trace!(key = %key, "Published submission");
        Ok(())
    }

    /// Publish a JSON value to a key.
    pub async fn publish_json<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_vec(value)?;
        self.publish_raw(key, payload).await
    }
}

/// Statistics from a flush.
#[derive(Debug, Default, Clone, Copy)]
pub struct PublishStats {
    /// Number of successful puts.
    pub success: usize,
    /// Number of failed puts.
    pub failed: usize,
}

impl PublishStats {
    /// Total number of attempted puts.
    pub fn total(&self) -> usize {
        self.success + self.failed
    }

    /// Success rate as a percentage.
    pub fn success_rate(&self) -> f64 {
        if self.total() == 0 {
            100.0
        } else {
            (self.success as f64 / self.total() as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_stats() {
        let mut stats = PublishStats::default();
        assert_eq!(stats.total(), 0);
        assert_eq!(stats.success_rate(), 100.0);

        stats.success = 8;
        stats.failed = 2;
        assert_eq!(stats.total(), 10);
        assert_eq!(stats.success_rate(), 80.0);
    }
}
