//! Check runner for lifecycle management.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::signal;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use integrations_common::{LoggingConfig, connect, init_tracing};

use crate::CheckArgs;
use crate::aggregator::{Aggregator, Submissions};
use crate::check::{AgentCheck, run_check};
use crate::config::CheckConfig;
use crate::error::{CheckError, Result};
use crate::publisher::Publisher;
use crate::status::CheckStatus;

/// Initialize logging from the config, letting `--log-level` win.
pub fn init_logging<C: CheckConfig>(config: &C, args: Option<&CheckArgs>) -> Result<()> {
    let log_config = match args.and_then(|a| a.log_level.as_ref()) {
        Some(level) => LoggingConfig {
            level: level.clone(),
            format: config.logging().format,
        },
        None => config.logging().clone(),
    };

    init_tracing(&log_config).map_err(|e| CheckError::configuration(e.to_string()))
}

/// Runner that schedules check instances and publishes their submissions.
///
/// Handles:
/// - Logging initialization
/// - Zenoh connection
/// - One interval task per check instance
/// - Graceful shutdown on Ctrl+C
/// - Status publishing
pub struct CheckRunner<C: CheckConfig> {
    /// Check name for logging and status.
    name: String,
    /// Check version.
    version: String,
    /// The loaded configuration.
    config: C,
    /// Zenoh session.
    session: Arc<zenoh::Session>,
    /// Publisher for submissions.
    publisher: Publisher,
    /// Spawned tasks.
    tasks: Vec<JoinHandle<()>>,
}

impl<C: CheckConfig> CheckRunner<C> {
    /// Create a new runner, initializing logging from the config.
    pub async fn new(name: impl Into<String>, config: C) -> Result<Self> {
        init_logging(&config, None)?;
        Self::connect(name, config).await
    }

    /// Create a new runner with CLI args for log level override.
    pub async fn new_with_args(
        name: impl Into<String>,
        config: C,
        args: Option<&CheckArgs>,
    ) -> Result<Self> {
        init_logging(&config, args)?;
        Self::connect(name, config).await
    }

    /// Create a runner when logging is already initialized.
    pub async fn connect(name: impl Into<String>, config: C) -> Result<Self> {
        let name = name.into();
        let version = env!("CARGO_PKG_VERSION").to_string();

        tracing::info!(check = %name, version = %version, "Starting check");

        let session = Arc::new(
            connect(config.zenoh())
                .await
                .map_err(|e| CheckError::ZenohConnection(e.to_string()))?,
        );

        let publisher = Publisher::new(
            session.clone(),
            config.key_prefix(),
            name.clone(),
            config.serialization(),
        );

        Ok(Self {
            name,
            version,
            config,
            session,
            publisher,
            tasks: Vec::new(),
        })
    }

    /// Get the check name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &C {
        &self.config
    }

    /// Get a clone of the publisher.
    pub fn publisher(&self) -> Publisher {
        self.publisher.clone()
    }

    /// Spawn a worker task.
    ///
    /// The task will be tracked and aborted on shutdown.
    pub fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        self.tasks.push(handle);
    }

    /// Run a check instance every `interval`, publishing after each run.
    pub fn schedule(&mut self, mut check: Box<dyn AgentCheck>, interval: Duration) {
        let publisher = self.publisher.clone();

        self.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut aggregator = Aggregator::new(check.name());
            let instance = check.instance_name();

            tracing::info!(
                check = %check.name(),
                instance = %instance,
                interval_secs = interval.as_secs_f64(),
                "Scheduling check instance"
            );

            loop {
                ticker.tick().await;

                let started = Instant::now();
                let error = run_check(check.as_mut(), &mut aggregator).await;
                let submissions = aggregator.drain();
                let stats = publisher.flush(&instance, &submissions).await;

                tracing::debug!(
                    instance = %instance,
                    metrics = submissions.metrics.len(),
                    service_checks = submissions.service_checks.len(),
                    failed_puts = stats.failed,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    failed = error.is_some(),
                    "Check run complete"
                );
            }
        });
    }

    /// Run until Ctrl+C is received.
    ///
    /// This will:
    /// 1. Publish "running" status
    /// 2. Wait for Ctrl+C signal
    /// 3. Abort all scheduled instances
    /// 4. Publish "offline" status
    /// 5. Close the Zenoh session
    pub async fn run(self) -> Result<()> {
        let running = CheckStatus::running(&self.name, &self.version)
            .with_metadata(serde_json::json!({ "instances": self.tasks.len() }));
        if let Err(e) = running.publish(&self.publisher).await {
            tracing::warn!(error = %e, "Failed to publish running status");
        }

        tracing::info!(
            check = %self.name,
            instances = self.tasks.len(),
            "Check running. Press Ctrl+C to stop."
        );

        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }

        tracing::info!(check = %self.name, "Received shutdown signal");

        for task in &self.tasks {
            task.abort();
        }

        // Wait briefly for tasks to clean up
        tokio::time::sleep(Duration::from_millis(100)).await;

        if let Err(e) = CheckStatus::offline(&self.name, &self.version)
            .publish(&self.publisher)
            .await
        {
            tracing::warn!(error = %e, "Failed to publish offline status");
        }

        if let Err(e) = self.session.close().await {
            tracing::warn!(error = %e, "Error closing Zenoh session");
        }

        tracing::info!(check = %self.name, "Goodbye!");

        Ok(())
    }
}

/// Outcome of a single run of one instance.
#[derive(Debug)]
pub struct RunReport {
    pub instance: String,
    pub submissions: Submissions,
    pub error: Option<String>,
}

impl RunReport {
    /// JSON rendering used by `--once`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "instance": self.instance,
            "metrics": self.submissions.metrics,
            "service_checks": self.submissions.service_checks,
            "warnings": self.submissions.warnings,
            "error": self.error,
        })
    }
}

/// Run every check once without a transport.
pub async fn run_once(checks: &mut [Box<dyn AgentCheck>]) -> Vec<RunReport> {
    let mut reports = Vec::with_capacity(checks.len());

    for check in checks.iter_mut() {
        let mut aggregator = Aggregator::new(check.name());
        let error = run_check(check.as_mut(), &mut aggregator).await;
        reports.push(RunReport {
            instance: check.instance_name(),
            submissions: aggregator.drain(),
            error,
        });
    }

    reports
}

/// Standard `main` flow for a check binary.
///
/// Loads the config named by the CLI, initializes logging, builds the
/// instances with `build`, then either runs them once (`--once`) and prints
/// the submissions, or schedules them until Ctrl+C.
pub async fn run_check_main<C, F, Fut>(
    name: &str,
    default_config: &'static str,
    build: F,
) -> anyhow::Result<()>
where
    C: CheckConfig,
    F: FnOnce(&C) -> Fut,
    Fut: Future<Output = anyhow::Result<Vec<(Box<dyn AgentCheck>, Duration)>>>,
{
    let args = CheckArgs::parse_with_default(default_config);
    let config = C::load(&args.config).map_err(|e| anyhow::anyhow!("{}", e))?;
    init_logging(&config, Some(&args)).map_err(|e| anyhow::anyhow!("{}", e))?;

    let scheduled = build(&config).await?;

    if args.once {
        let mut checks: Vec<Box<dyn AgentCheck>> =
            scheduled.into_iter().map(|(check, _)| check).collect();
        let reports = run_once(&mut checks).await;
        let json: Vec<_> = reports.iter().map(RunReport::to_json).collect();
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    let mut runner = CheckRunner::connect(name, config)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    for (check, interval) in scheduled {
        runner.schedule(check, interval);
    }

    runner.run().await.map_err(|e| anyhow::anyhow!("{}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Counter {
        runs: u32,
    }

    #[async_trait]
    impl AgentCheck for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn instance_name(&self) -> String {
            "local".to_string()
        }

        async fn check(&mut self, aggregator: &mut Aggregator) -> Result<()> {
            self.runs += 1;
            aggregator.monotonic_count("counter.runs", self.runs as f64, &[]);
            if self.runs > 1 {
                return Err(CheckError::collection("second run fails"));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_run_once_reports_each_instance() {
        let mut checks: Vec<Box<dyn AgentCheck>> =
            vec![Box::new(Counter { runs: 0 }), Box::new(Counter { runs: 1 })];

        let reports = run_once(&mut checks).await;

        assert_eq!(reports.len(), 2);
        assert!(reports[0].error.is_none());
        assert_eq!(reports[0].submissions.metrics.len(), 1);
        assert_eq!(reports[1].error.as_deref(), Some("second run fails"));

        let json = reports[1].to_json();
        assert_eq!(json["instance"], "local");
        assert_eq!(json["metrics"][0]["value"], 2.0);
    }
}
