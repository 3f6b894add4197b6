//! ClickHouse client.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::config::ClickhouseConfig;
use crate::error::ClickhouseError;

/// Connection to one ClickHouse server.
#[async_trait]
pub trait ClickhouseClient: Send + Sync {
    /// Verify the server answers.
    async fn ping(&self) -> Result<(), ClickhouseError>;

    /// Run `query` and return its rows.
    async fn execute(&self, query: &str) -> Result<Vec<Vec<Value>>, ClickhouseError>;
}

/// Body of a `FORMAT JSONCompact` response.
#[derive(Debug, Deserialize)]
struct CompactResponse {
    data: Vec<Vec<Value>>,
}

/// Client for the ClickHouse HTTP interface.
#[derive(Debug, Clone)]
pub struct HttpClickhouseClient {
    client: reqwest::Client,
    url: String,
    db: String,
    user: String,
    password: String,
}

impl HttpClickhouseClient {
    pub fn new(config: &ClickhouseConfig) -> Result<Self, ClickhouseError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.connect_timeout + config.read_timeout)
            .danger_accept_invalid_certs(!config.tls_verify)
            .build()
            .map_err(|e| ClickhouseError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            url: config.url(),
            db: config.db.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
        })
    }

    fn request(&self, body: String) -> reqwest::RequestBuilder {
        self.client
            .post(&self.url)
            .query(&[("database", self.db.as_str())])
            .header("X-ClickHouse-User", &self.user)
            .header("X-ClickHouse-Key", &self.password)
            .body(body)
    }
}

/// Table name of a `... FROM <table>` query, for error reporting.
fn queried_table(query: &str) -> String {
    query
        .split_whitespace()
        .skip_while(|word| !word.eq_ignore_ascii_case("FROM"))
        .nth(1)
        .unwrap_or(query)
        .to_string()
}

#[async_trait]
impl ClickhouseClient for HttpClickhouseClient {
    async fn ping(&self) -> Result<(), ClickhouseError> {
        let response = self
            .request("SELECT 1".to_string())
            .send()
            .await
            .map_err(|e| ClickhouseError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ClickhouseError::Connection(format!(
                "{}: {}",
                status,
                body.trim()
            )));
        }

        Ok(())
    }

    async fn execute(&self, query: &str) -> Result<Vec<Vec<Value>>, ClickhouseError> {
        tracing::debug!(query = %query, "Executing query");

        let response = self
            .request(format!("{} FORMAT JSONCompact", query))
            .send()
            .await
            .map_err(|e| ClickhouseError::Connection(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClickhouseError::Decode(e.to_string()))?;

        if !status.is_success() {
            return Err(ClickhouseError::Query {
                table: queried_table(query),
                message: body.trim().to_string(),
            });
        }

        let parsed: CompactResponse =
            serde_json::from_str(&body).map_err(|e| ClickhouseError::Decode(e.to_string()))?;
        Ok(parsed.data)
    }
}
