//! The check abstraction every integration implements.

use async_trait::async_trait;

use crate::aggregator::Aggregator;
use crate::error::Result;

/// A monitoring check bound to one configured instance.
///
/// Checks are built once from their instance configuration (configuration
/// errors surface there) and then run repeatedly by the
/// [`CheckRunner`](crate::CheckRunner).
#[async_trait]
pub trait AgentCheck: Send {
    /// Check name, used as the metric namespace and in key expressions.
    fn name(&self) -> &str;

    /// Identifier of the monitored instance (host, URL, ...).
    fn instance_name(&self) -> String;

    /// Collect once, submitting into `aggregator`.
    async fn check(&mut self, aggregator: &mut Aggregator) -> Result<()>;
}

/// Run one collection cycle.
///
/// An error returned by the check is logged and handed back as its message,
/// the way the agent records a failed run without stopping the schedule.
pub async fn run_check<C>(check: &mut C, aggregator: &mut Aggregator) -> Option<String>
where
    C: AgentCheck + ?Sized,
{
    match check.check(aggregator).await {
        Ok(()) => None,
        Err(e) => {
            tracing::error!(
                check = %check.name(),
                instance = %check.instance_name(),
                error = %e,
                "Error running check"
            );
            Some(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CheckError;

    struct Flaky {
        fail: bool,
    }

    #[async_trait]
    impl AgentCheck for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        fn instance_name(&self) -> String {
            "localhost".to_string()
        }

        async fn check(&mut self, aggregator: &mut Aggregator) -> Result<()> {
            if self.fail {
                return Err(CheckError::collection("boom"));
            }
            aggregator.gauge("flaky.up", 1.0, &[]);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_run_check_success() {
        let mut check = Flaky { fail: false };
        let mut aggregator = Aggregator::new("flaky");

        assert!(run_check(&mut check, &mut aggregator).await.is_none());
        assert!(aggregator.has_metric("flaky.up", Some(1.0), &[]));
    }

    #[tokio::test]
    async fn test_run_check_failure_returns_message() {
        let mut check = Flaky { fail: true };
        let mut aggregator = Aggregator::new("flaky");

        assert_eq!(
            run_check(&mut check, &mut aggregator).await.as_deref(),
            Some("boom")
        );
    }
}
