//! The ClickHouse check: runs the collection methods against one server.

use std::sync::Arc;

use async_trait::async_trait;

use integrations_base::{AgentCheck, Aggregator, CheckError, ServiceCheckStatus, as_float};

use crate::client::{ClickhouseClient, HttpClickhouseClient};
use crate::config::ClickhouseConfig;
use crate::error::{ClickhouseError, ErrorSanitizer};
use crate::queries::{QUERIES, Query};

pub const CHECK_NAME: &str = "clickhouse";

pub const CAN_CONNECT: &str = "clickhouse.can_connect";

/// One step of a collection run.
#[async_trait]
pub trait CollectionMethod: Send + Sync {
    /// Name used in error logs.
    fn name(&self) -> &str;

    async fn collect(
        &self,
        client: &dyn ClickhouseClient,
        tags: &[String],
        aggregator: &mut Aggregator,
    ) -> Result<(), ClickhouseError>;
}

/// Reports the rows of one system table query.
#[derive(Debug, Clone)]
pub struct QueryMethod {
    query: Query,
    name: String,
}

impl QueryMethod {
    pub fn new(query: Query) -> Self {
        Self {
            name: format!("query_{}", snake_case(query.name)),
            query,
        }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }
}

fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[async_trait]
impl CollectionMethod for QueryMethod {
    fn name(&self) -> &str {
        &self.name
    }

    async fn collect(
        &self,
        client: &dyn ClickhouseClient,
        tags: &[String],
        aggregator: &mut Aggregator,
    ) -> Result<(), ClickhouseError> {
        let rows = client
            .execute(&self.query.sql())
            .await
            .map_err(|e| match e {
                ClickhouseError::Query { .. } => e,
                other => ClickhouseError::Query {
                    table: self.query.table.to_string(),
                    message: other.to_string(),
                },
            })?;

        for row in rows {
            let [metric, value] = row.as_slice() else {
                return Err(ClickhouseError::Decode(format!(
                    "expected 2 columns from {}, got {}",
                    self.query.table,
                    row.len()
                )));
            };
            let Some(metric) = metric.as_str() else {
                continue;
            };

            let Some(column) = self.query.column(metric) else {
                if !self.query.is_ignored(metric) {
                    tracing::debug!(table = %self.query.table, metric = %metric, "Unknown metric");
                }
                continue;
            };

            match as_float(value) {
                Some(value) => aggregator.submit_metric(
                    format!("{}.{}", CHECK_NAME, column.name),
                    column.metric_type,
                    value,
                    tags,
                ),
                None => tracing::debug!(
                    metric = %metric,
                    value = %value,
                    "Skipping non-numeric value"
                ),
            }
        }

        Ok(())
    }
}

/// The default collection methods, one per system table.
pub fn default_collection_methods() -> Vec<Box<dyn CollectionMethod>> {
    QUERIES
        .into_iter()
        .map(|query| Box::new(QueryMethod::new(query)) as Box<dyn CollectionMethod>)
        .collect()
}

/// Check collecting from one ClickHouse server.
pub struct ClickhouseCheck {
    config: ClickhouseConfig,
    client: Arc<dyn ClickhouseClient>,
    methods: Vec<Box<dyn CollectionMethod>>,
    sanitizer: ErrorSanitizer,
    connected: bool,
}

impl ClickhouseCheck {
    pub fn new(config: ClickhouseConfig) -> Result<Self, CheckError> {
        let client = HttpClickhouseClient::new(&config)?;
        Ok(Self::with_client(config, Arc::new(client)))
    }

    pub fn from_instance(instance: &serde_json::Value) -> Result<Self, CheckError> {
        Self::new(ClickhouseConfig::from_instance(instance)?)
    }

    pub fn with_client(config: ClickhouseConfig, client: Arc<dyn ClickhouseClient>) -> Self {
        Self {
            sanitizer: ErrorSanitizer::new().with_secret(config.password.clone()),
            config,
            client,
            methods: default_collection_methods(),
            connected: false,
        }
    }

    /// Replace the collection methods.
    pub fn with_collection_methods(mut self, methods: Vec<Box<dyn CollectionMethod>>) -> Self {
        self.methods = methods;
        self
    }

    pub fn config(&self) -> &ClickhouseConfig {
        &self.config
    }

    async fn connect(&mut self, aggregator: &mut Aggregator) -> Result<(), CheckError> {
        match self.client.ping().await {
            Ok(()) => {
                aggregator.service_check(CAN_CONNECT, ServiceCheckStatus::Ok, &self.config.tags, None);
                self.connected = true;
                Ok(())
            }
            Err(e) => {
                let message = self.sanitizer.clean(&e.to_string());
                aggregator.service_check(
                    CAN_CONNECT,
                    ServiceCheckStatus::Critical,
                    &self.config.tags,
                    Some(message.clone()),
                );
                Err(CheckError::collection(format!(
                    "Unable to connect to ClickHouse: {}",
                    message
                )))
            }
        }
    }
}

#[async_trait]
impl AgentCheck for ClickhouseCheck {
    fn name(&self) -> &str {
        CHECK_NAME
    }

    fn instance_name(&self) -> String {
        format!("{}:{}", self.config.server, self.config.port)
    }

    async fn check(&mut self, aggregator: &mut Aggregator) -> Result<(), CheckError> {
        if !self.connected {
            self.connect(aggregator).await?;
        }

        for method in &self.methods {
            match method
                .collect(self.client.as_ref(), &self.config.tags, aggregator)
                .await
            {
                Ok(()) => {}
                Err(ClickhouseError::Query { table, message }) => {
                    tracing::error!("Error querying {}: {}", table, self.sanitizer.clean(&message));
                }
                Err(e) => {
                    tracing::error!(
                        "Unexpected error running `{}`: {}",
                        method.name(),
                        self.sanitizer.clean(&e.to_string())
                    );
                }
            }
        }

        Ok(())
    }
}
