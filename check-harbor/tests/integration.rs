//! Check runs against an in-memory Harbor API.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use check_harbor::{
    CAN_CONNECT, ComponentHealth, HarborApi, HarborCheck, HarborConfig, HarborError, Health,
    REGISTRY_STATUS, Registry, STATUS, Storage,
};
use integrations_base::testing::{assert_metric, assert_service_check};
use integrations_base::{AgentCheck, Aggregator, ServiceCheckStatus};

#[derive(Clone)]
struct FakeHarbor {
    reachable: bool,
    health: Option<Health>,
    chartrepo_healthy: Option<bool>,
    registries: Vec<Registry>,
    /// Registry ids answering the ping.
    reachable_registries: Vec<i64>,
    projects: usize,
    admin: bool,
}

impl Default for FakeHarbor {
    fn default() -> Self {
        Self {
            reachable: true,
            health: Some(Health {
                status: "healthy".to_string(),
                components: vec![
                    component("core", "healthy"),
                    component("registry", "healthy"),
                ],
            }),
            chartrepo_healthy: None,
            registries: Vec::new(),
            reachable_registries: Vec::new(),
            projects: 3,
            admin: true,
        }
    }
}

fn component(name: &str, status: &str) -> ComponentHealth {
    ComponentHealth {
        name: name.to_string(),
        status: status.to_string(),
    }
}

fn http(path: &str, status: u16) -> HarborError {
    HarborError::Http {
        url: format!("http://harbor.local/api/{}", path),
        status,
    }
}

#[async_trait]
impl HarborApi for FakeHarbor {
    async fn ping(&self) -> Result<(), HarborError> {
        if self.reachable {
            Ok(())
        } else {
            Err(HarborError::Connection {
                url: "http://harbor.local/api/ping".to_string(),
                message: "connection refused".to_string(),
            })
        }
    }

    async fn health(&self) -> Result<Health, HarborError> {
        self.health.clone().ok_or_else(|| http("health", 404))
    }

    async fn chartrepo_health(&self) -> Result<bool, HarborError> {
        self.chartrepo_healthy.ok_or_else(|| http("chartrepo/health", 404))
    }

    async fn registries(&self) -> Result<Vec<Registry>, HarborError> {
        Ok(self.registries.clone())
    }

    async fn registry_health(&self, id: i64) -> Result<bool, HarborError> {
        Ok(self.reachable_registries.contains(&id))
    }

    async fn projects(&self) -> Result<Vec<serde_json::Value>, HarborError> {
        Ok((0..self.projects).map(|id| json!({"project_id": id})).collect())
    }

    async fn storage(&self) -> Result<Storage, HarborError> {
        if self.admin {
            Ok(Storage {
                total: 1000.0,
                free: 250.0,
            })
        } else {
            Err(http("systeminfo/volumes", 403))
        }
    }
}

fn config() -> HarborConfig {
    HarborConfig::from_instance(&json!({
        "url": "http://harbor.local",
        "username": "admin",
        "password": "Harbor12345",
        "tags": ["env:test"],
    }))
    .unwrap()
}

async fn run(api: FakeHarbor) -> (Aggregator, Result<(), integrations_base::CheckError>) {
    let mut check = HarborCheck::with_api(config(), Arc::new(api));
    let mut aggregator = Aggregator::new("harbor");
    let result = check.check(&mut aggregator).await;
    (aggregator, result)
}

#[tokio::test]
async fn test_healthy_deployment() {
    let (aggregator, result) = run(FakeHarbor::default()).await;
    result.unwrap();

    assert_service_check(&aggregator, CAN_CONNECT, ServiceCheckStatus::Ok);
    assert_eq!(aggregator.service_checks(STATUS).len(), 3);
    assert!(
        aggregator
            .service_checks(STATUS)
            .iter()
            .any(|c| c.tags.contains(&"component:core".to_string()))
    );

    assert_metric(&aggregator, "harbor.projects.count", Some(3.0), &["env:test"]);
    assert_metric(&aggregator, "harbor.disk.free", Some(250.0), &["env:test"]);
    assert_metric(&aggregator, "harbor.disk.total", Some(1000.0), &["env:test"]);
}

#[tokio::test]
async fn test_unhealthy_component() {
    let api = FakeHarbor {
        health: Some(Health {
            status: "unhealthy".to_string(),
            components: vec![
                component("core", "healthy"),
                component("jobservice", "unhealthy"),
            ],
        }),
        ..Default::default()
    };
    let (aggregator, _) = run(api).await;

    let critical: Vec<_> = aggregator
        .service_checks(STATUS)
        .into_iter()
        .filter(|c| c.status == ServiceCheckStatus::Critical)
        .collect();
    assert_eq!(critical.len(), 2);
    assert!(
        critical
            .iter()
            .any(|c| c.tags.contains(&"component:jobservice".to_string()))
    );
}

#[tokio::test]
async fn test_chartrepo_fallback() {
    let api = FakeHarbor {
        health: None,
        chartrepo_healthy: Some(false),
        ..Default::default()
    };
    let (aggregator, result) = run(api).await;
    result.unwrap();

    let checks = aggregator.service_checks(STATUS);
    assert_eq!(checks.len(), 1);
    assert_eq!(checks[0].status, ServiceCheckStatus::Critical);
    assert!(checks[0].tags.contains(&"component:chartmuseum".to_string()));
}

#[tokio::test]
async fn test_registry_status() {
    let api = FakeHarbor {
        registries: vec![
            Registry {
                id: 1,
                name: "hub".to_string(),
                status: Some("healthy".to_string()),
            },
            Registry {
                id: 2,
                name: "mirror".to_string(),
                status: None,
            },
            Registry {
                id: 3,
                name: "offline".to_string(),
                status: None,
            },
        ],
        reachable_registries: vec![2],
        ..Default::default()
    };
    let (aggregator, _) = run(api).await;

    let status_of = |name: &str| {
        let tag = format!("registry:{}", name);
        aggregator
            .service_checks(REGISTRY_STATUS)
            .into_iter()
            .find(|c| c.tags.contains(&tag))
            .map(|c| c.status)
    };
    assert_eq!(status_of("hub"), Some(ServiceCheckStatus::Ok));
    assert_eq!(status_of("mirror"), Some(ServiceCheckStatus::Ok));
    assert_eq!(status_of("offline"), Some(ServiceCheckStatus::Critical));
}

#[tokio::test]
async fn test_non_admin_skips_disk_metrics() {
    let api = FakeHarbor {
        admin: false,
        ..Default::default()
    };
    let (aggregator, result) = run(api).await;
    result.unwrap();

    assert!(aggregator.metrics("harbor.disk.free").is_empty());
    assert_metric(&aggregator, "harbor.projects.count", None, &[]);
}

#[tokio::test]
async fn test_unreachable() {
    let api = FakeHarbor {
        reachable: false,
        ..Default::default()
    };
    let (aggregator, result) = run(api).await;

    assert!(result.unwrap_err().to_string().contains("connection refused"));
    assert_service_check(&aggregator, CAN_CONNECT, ServiceCheckStatus::Critical);
    assert!(aggregator.all_metrics().is_empty());
}
