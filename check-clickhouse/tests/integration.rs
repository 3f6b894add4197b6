//! Collection runs against an in-memory ClickHouse client.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};

use check_clickhouse::{
    CAN_CONNECT, ClickhouseCheck, ClickhouseClient, ClickhouseConfig, ClickhouseError,
    CollectionMethod, QUERIES,
};
use integrations_base::testing::{assert_metric, assert_service_check, capture_logs};
use integrations_base::{AgentCheck, Aggregator, ServiceCheckStatus};

#[derive(Default)]
struct FakeClient {
    tables: HashMap<String, Vec<Vec<Value>>>,
    fail_ping: Option<String>,
    fail_queries: Option<String>,
    executed: Mutex<Vec<String>>,
}

impl FakeClient {
    fn with_table(mut self, table: &str, rows: Vec<Vec<Value>>) -> Self {
        self.tables.insert(table.to_string(), rows);
        self
    }
}

#[async_trait]
impl ClickhouseClient for FakeClient {
    async fn ping(&self) -> Result<(), ClickhouseError> {
        match &self.fail_ping {
            Some(message) => Err(ClickhouseError::Connection(message.clone())),
            None => Ok(()),
        }
    }

    async fn execute(&self, query: &str) -> Result<Vec<Vec<Value>>, ClickhouseError> {
        self.executed.lock().unwrap().push(query.to_string());
        if let Some(message) = &self.fail_queries {
            return Err(ClickhouseError::Other(message.clone()));
        }
        let table = query.rsplit(' ').next().unwrap_or_default();
        Ok(self.tables.get(table).cloned().unwrap_or_default())
    }
}

fn config() -> ClickhouseConfig {
    ClickhouseConfig::from_instance(&json!({
        "server": "localhost",
        "password": "s3cr3t",
        "tags": ["foo:bar"],
    }))
    .unwrap()
}

#[tokio::test]
async fn test_reports_system_tables() {
    let client = FakeClient::default()
        .with_table(
            "system.metrics",
            vec![
                vec![json!("Query"), json!(2)],
                vec![json!("TCPConnection"), json!("5")],
                vec![json!("Revision"), json!(54_400)],
                vec![json!("SomethingNew"), json!(1)],
            ],
        )
        .with_table("system.events", vec![vec![json!("SelectQuery"), json!("120")]])
        .with_table(
            "system.asynchronous_metrics",
            vec![vec![json!("Uptime"), json!(3600.5)]],
        );
    let client = Arc::new(client);

    let mut check = ClickhouseCheck::with_client(config(), client.clone());
    let mut aggregator = Aggregator::new("clickhouse");
    check.check(&mut aggregator).await.unwrap();

    let tags = ["foo:bar", "server:localhost", "port:8123", "db:default"];
    assert_service_check(&aggregator, CAN_CONNECT, ServiceCheckStatus::Ok);
    assert_metric(&aggregator, "clickhouse.query.active", Some(2.0), &tags);
    assert_metric(&aggregator, "clickhouse.connection.tcp", Some(5.0), &tags);
    assert_metric(&aggregator, "clickhouse.query.select.total", Some(120.0), &tags);
    assert_metric(&aggregator, "clickhouse.uptime", Some(3600.5), &tags);
    assert_eq!(aggregator.all_metrics().len(), 4);

    assert_eq!(client.executed.lock().unwrap().len(), QUERIES.len());
}

#[tokio::test]
async fn test_error_query() {
    let logs = capture_logs();
    let client = FakeClient {
        fail_queries: Some("test".to_string()),
        ..Default::default()
    };

    let mut check = ClickhouseCheck::with_client(config(), Arc::new(client));
    let mut aggregator = Aggregator::new("clickhouse");
    check.check(&mut aggregator).await.unwrap();

    let errors = logs.lines_at("ERROR");
    assert!(
        errors
            .iter()
            .any(|line| line.contains("Error querying system.metrics: test")),
        "{:?}",
        errors
    );
    // The remaining tables are still queried.
    assert!(logs.contains("Error querying system.events: test"));
    assert!(logs.contains("Error querying system.asynchronous_metrics: test"));
}

struct QuerySystemMetrics;

#[async_trait]
impl CollectionMethod for QuerySystemMetrics {
    fn name(&self) -> &str {
        "query_system_metrics"
    }

    async fn collect(
        &self,
        _client: &dyn ClickhouseClient,
        _tags: &[String],
        _aggregator: &mut Aggregator,
    ) -> Result<(), ClickhouseError> {
        Err(ClickhouseError::Other("test".to_string()))
    }
}

#[tokio::test]
async fn test_error_unknown() {
    let logs = capture_logs();
    let mut check = ClickhouseCheck::with_client(config(), Arc::new(FakeClient::default()))
        .with_collection_methods(vec![Box::new(QuerySystemMetrics)]);
    let mut aggregator = Aggregator::new("clickhouse");
    check.check(&mut aggregator).await.unwrap();

    assert!(logs.contains("Unexpected error running `query_system_metrics`: test"));
}

#[tokio::test]
async fn test_password_scrubbed_from_errors() {
    let logs = capture_logs();
    let client = FakeClient {
        fail_queries: Some("Authentication failed: password s3cr3t is incorrect".to_string()),
        ..Default::default()
    };

    let mut check = ClickhouseCheck::with_client(config(), Arc::new(client));
    let mut aggregator = Aggregator::new("clickhouse");
    check.check(&mut aggregator).await.unwrap();

    assert!(logs.contains("password ********** is incorrect"));
    assert!(!logs.contains("s3cr3t"));
}

#[tokio::test]
async fn test_connection_failure() {
    let client = FakeClient {
        fail_ping: Some("connection refused".to_string()),
        ..Default::default()
    };
    let client = Arc::new(client);

    let mut check = ClickhouseCheck::with_client(config(), client.clone());
    let mut aggregator = Aggregator::new("clickhouse");
    let err = check.check(&mut aggregator).await.unwrap_err();

    assert!(err.to_string().contains("connection refused"));
    assert_service_check(&aggregator, CAN_CONNECT, ServiceCheckStatus::Critical);
    assert!(client.executed.lock().unwrap().is_empty());
}
