//! The Harbor check.

use std::sync::Arc;

use async_trait::async_trait;

use integrations_base::{AgentCheck, Aggregator, CheckError, ServiceCheckStatus};

use crate::api::{HarborApi, HarborClient};
use crate::config::HarborConfig;
use crate::error::HarborError;

pub const CHECK_NAME: &str = "harbor";

pub const CAN_CONNECT: &str = "harbor.can_connect";
pub const STATUS: &str = "harbor.status";
pub const REGISTRY_STATUS: &str = "harbor.registry.status";

const HEALTHY: &str = "healthy";

fn health_status(healthy: bool) -> ServiceCheckStatus {
    if healthy {
        ServiceCheckStatus::Ok
    } else {
        ServiceCheckStatus::Critical
    }
}

fn with_tag(tags: &[String], tag: String) -> Vec<String> {
    let mut tags = tags.to_vec();
    tags.push(tag);
    tags
}

/// Check reporting the health and usage of one Harbor deployment.
pub struct HarborCheck {
    config: HarborConfig,
    api: Arc<dyn HarborApi>,
}

impl HarborCheck {
    pub fn new(config: HarborConfig) -> Result<Self, CheckError> {
        let api = HarborClient::new(&config)?;
        Ok(Self::with_api(config, Arc::new(api)))
    }

    pub fn from_instance(instance: &serde_json::Value) -> Result<Self, CheckError> {
        Self::new(HarborConfig::from_instance(instance)?)
    }

    pub fn with_api(config: HarborConfig, api: Arc<dyn HarborApi>) -> Self {
        Self { config, api }
    }

    pub fn config(&self) -> &HarborConfig {
        &self.config
    }

    async fn check_health(&self, aggregator: &mut Aggregator) -> Result<(), HarborError> {
        let tags = &self.config.tags;

        match self.api.health().await {
            Ok(health) => {
                aggregator.service_check(STATUS, health_status(health.status == HEALTHY), tags, None);
                for component in &health.components {
                    aggregator.service_check(
                        STATUS,
                        health_status(component.status == HEALTHY),
                        &with_tag(tags, format!("component:{}", component.name)),
                        None,
                    );
                }
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!("Health endpoint unavailable, using the chart repository health");
                match self.api.chartrepo_health().await {
                    Ok(healthy) => {
                        aggregator.service_check(
                            STATUS,
                            health_status(healthy),
                            &with_tag(tags, "component:chartmuseum".to_string()),
                            None,
                        );
                        Ok(())
                    }
                    Err(e) if e.is_not_found() => {
                        tracing::debug!("Chart repository is not enabled");
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn check_registries(&self, aggregator: &mut Aggregator) -> Result<(), HarborError> {
        for registry in self.api.registries().await? {
            let healthy = match &registry.status {
                Some(status) => status == HEALTHY,
                None => self.api.registry_health(registry.id).await?,
            };
            aggregator.service_check(
                REGISTRY_STATUS,
                health_status(healthy),
                &with_tag(&self.config.tags, format!("registry:{}", registry.name)),
                None,
            );
        }
        Ok(())
    }

    async fn submit_project_metrics(&self, aggregator: &mut Aggregator) -> Result<(), HarborError> {
        let projects = self.api.projects().await?;
        aggregator.gauge("harbor.projects.count", projects.len() as f64, &self.config.tags);
        Ok(())
    }

    async fn submit_disk_metrics(&self, aggregator: &mut Aggregator) -> Result<(), HarborError> {
        match self.api.storage().await {
            Ok(storage) => {
                aggregator.gauge("harbor.disk.free", storage.free, &self.config.tags);
                aggregator.gauge("harbor.disk.total", storage.total, &self.config.tags);
                Ok(())
            }
            Err(e) if e.is_forbidden() => {
                tracing::debug!("Disk metrics require an admin user, skipping");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl AgentCheck for HarborCheck {
    fn name(&self) -> &str {
        CHECK_NAME
    }

    fn instance_name(&self) -> String {
        self.config.url.clone()
    }

    async fn check(&mut self, aggregator: &mut Aggregator) -> Result<(), CheckError> {
        if let Err(e) = self.api.ping().await {
            aggregator.service_check(
                CAN_CONNECT,
                ServiceCheckStatus::Critical,
                &self.config.tags,
                Some(e.to_string()),
            );
            return Err(e.into());
        }
        aggregator.service_check(CAN_CONNECT, ServiceCheckStatus::Ok, &self.config.tags, None);

        let mut failures = Vec::new();
        if let Err(e) = self.check_health(aggregator).await {
            failures.push(format!("health: {}", e));
        }
        if let Err(e) = self.check_registries(aggregator).await {
            failures.push(format!("registries: {}", e));
        }
        if let Err(e) = self.submit_project_metrics(aggregator).await {
            failures.push(format!("projects: {}", e));
        }
        if let Err(e) = self.submit_disk_metrics(aggregator).await {
            failures.push(format!("disk: {}", e));
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(CheckError::collection(failures.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_tag() {
        let base = vec!["env:prod".to_string()];
        assert_eq!(
            with_tag(&base, "component:core".to_string()),
            vec!["env:prod", "component:core"]
        );
        assert_eq!(base.len(), 1);
        assert_eq!(health_status(false), ServiceCheckStatus::Critical);
    }
}
