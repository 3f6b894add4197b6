//! Helpers for check tests.

use std::io;
use std::sync::{Arc, Mutex};

use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

use crate::aggregator::Aggregator;

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .map_err(|_| io::Error::other("log buffer poisoned"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for SharedBuffer {
    type Writer = SharedBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Log lines captured on the current thread.
///
/// Capturing stops when the value is dropped.
pub struct LogCapture {
    buffer: SharedBuffer,
    _guard: DefaultGuard,
}

impl LogCapture {
    /// Everything logged so far.
    pub fn contents(&self) -> String {
        self.buffer
            .0
            .lock()
            .map(|buf| String::from_utf8_lossy(&buf).into_owned())
            .unwrap_or_default()
    }

    /// Whether any captured line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.contents().contains(needle)
    }

    /// Captured lines at the given level (`"ERROR"`, `"WARN"`, ...).
    pub fn lines_at(&self, level: &str) -> Vec<String> {
        self.contents()
            .lines()
            .filter(|line| line.trim_start().starts_with(level))
            .map(str::to_string)
            .collect()
    }
}

/// Capture every event emitted on this thread, down to TRACE.
///
/// Works with `#[tokio::test]`, whose default runtime polls tasks on the
/// test thread.
pub fn capture_logs() -> LogCapture {
    let buffer = SharedBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buffer.clone())
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .without_time()
        .finish();

    LogCapture {
        buffer,
        _guard: tracing::subscriber::set_default(subscriber),
    }
}

/// Panic unless the aggregator holds a matching metric.
pub fn assert_metric(aggregator: &Aggregator, name: &str, value: Option<f64>, tags: &[&str]) {
    assert!(
        aggregator.has_metric(name, value, tags),
        "metric {} (value {:?}, tags {:?}) not submitted; got {:?}",
        name,
        value,
        tags,
        aggregator.all_metrics()
    );
}

/// Panic unless a service check with this name and status was submitted.
pub fn assert_service_check(
    aggregator: &Aggregator,
    name: &str,
    status: integrations_common::ServiceCheckStatus,
) {
    assert!(
        aggregator
            .service_checks(name)
            .iter()
            .any(|c| c.status == status),
        "service check {} with status {} not submitted; got {:?}",
        name,
        status,
        aggregator.all_service_checks()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_logs_records_events() {
        let logs = capture_logs();
        tracing::error!("Error querying {}: {}", "system.metrics", "boom");
        tracing::debug!(mib = "IF-MIB", "trying to fetch");

        assert!(logs.contains("Error querying system.metrics: boom"));
        assert_eq!(logs.lines_at("ERROR").len(), 1);
        assert!(logs.contains("mib=\"IF-MIB\""));
    }

    #[test]
    fn test_assert_metric_passes() {
        let mut aggregator = Aggregator::new("t");
        aggregator.gauge("t.up", 1.0, &["a:b".to_string()]);
        assert_metric(&aggregator, "t.up", Some(1.0), &["a:b"]);
    }
}
