//! Submission buffer filled by a check run.
//!
//! A check never talks to the transport directly: it submits into an
//! [`Aggregator`], and the runner drains the buffer into the
//! [`Publisher`](crate::Publisher) after each run. Tests inspect the same
//! buffer.

use integrations_common::{MetricSample, MetricType, ServiceCheck, ServiceCheckStatus};

/// Collects metrics, service checks and warnings for one check.
#[derive(Debug, Clone)]
pub struct Aggregator {
    check: String,
    hostname: Option<String>,
    metrics: Vec<MetricSample>,
    service_checks: Vec<ServiceCheck>,
    warnings: Vec<String>,
}

/// Everything a check submitted since the last drain.
#[derive(Debug, Clone, Default)]
pub struct Submissions {
    pub metrics: Vec<MetricSample>,
    pub service_checks: Vec<ServiceCheck>,
    pub warnings: Vec<String>,
}

impl Submissions {
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty() && self.service_checks.is_empty() && self.warnings.is_empty()
    }
}

impl Aggregator {
    /// Create an empty aggregator for a check.
    pub fn new(check: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            hostname: None,
            metrics: Vec::new(),
            service_checks: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Set a hostname applied to every metric that has none.
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn check_name(&self) -> &str {
        &self.check
    }

    /// Submit a metric of any type.
    pub fn submit_metric(
        &mut self,
        name: impl Into<String>,
        metric_type: MetricType,
        value: f64,
        tags: &[String],
    ) {
        let mut sample =
            MetricSample::new(&self.check, name, metric_type, value).with_tags(tags.iter().cloned());
        if let Some(hostname) = &self.hostname {
            sample = sample.with_hostname(hostname.clone());
        }
        self.metrics.push(sample);
    }

    pub fn gauge(&mut self, name: impl Into<String>, value: f64, tags: &[String]) {
        self.submit_metric(name, MetricType::Gauge, value, tags);
    }

    pub fn rate(&mut self, name: impl Into<String>, value: f64, tags: &[String]) {
        self.submit_metric(name, MetricType::Rate, value, tags);
    }

    pub fn count(&mut self, name: impl Into<String>, value: f64, tags: &[String]) {
        self.submit_metric(name, MetricType::Count, value, tags);
    }

    pub fn monotonic_count(&mut self, name: impl Into<String>, value: f64, tags: &[String]) {
        self.submit_metric(name, MetricType::MonotonicCount, value, tags);
    }

    /// Submit a service check result.
    pub fn service_check(
        &mut self,
        name: impl Into<String>,
        status: ServiceCheckStatus,
        tags: &[String],
        message: Option<String>,
    ) {
        let mut check =
            ServiceCheck::new(&self.check, name, status).with_tags(tags.iter().cloned());
        if let Some(message) = message {
            check = check.with_message(message);
        }
        self.service_checks.push(check);
    }

    /// Record a user-facing warning; it is also logged.
    pub fn warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(check = %self.check, "{}", message);
        self.warnings.push(message);
    }

    /// All metrics submitted under `name`.
    pub fn metrics(&self, name: &str) -> Vec<&MetricSample> {
        self.metrics.iter().filter(|m| m.name == name).collect()
    }

    pub fn all_metrics(&self) -> &[MetricSample] {
        &self.metrics
    }

    /// All service checks submitted under `name`.
    pub fn service_checks(&self, name: &str) -> Vec<&ServiceCheck> {
        self.service_checks.iter().filter(|c| c.name == name).collect()
    }

    pub fn all_service_checks(&self) -> &[ServiceCheck] {
        &self.service_checks
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Whether a metric with this name, optional value and tag subset exists.
    pub fn has_metric(&self, name: &str, value: Option<f64>, tags: &[&str]) -> bool {
        self.metrics.iter().any(|m| {
            m.name == name
                && value.is_none_or(|v| (m.value - v).abs() < f64::EPSILON)
                && tags.iter().all(|t| m.tags.iter().any(|mt| mt == t))
        })
    }

    /// Take everything submitted so far, leaving the buffer empty.
    pub fn drain(&mut self) -> Submissions {
        Submissions {
            metrics: std::mem::take(&mut self.metrics),
            service_checks: std::mem::take(&mut self.service_checks),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    pub fn reset(&mut self) {
        self.drain();
    }
}
