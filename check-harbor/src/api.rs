//! Harbor REST API client.

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::config::HarborConfig;
use crate::error::HarborError;

/// `/api/health` body.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Health {
    pub status: String,
    #[serde(default)]
    pub components: Vec<ComponentHealth>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: String,
}

/// Replication endpoint from `/api/registries`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Registry {
    pub id: i64,
    pub name: String,
    /// Reported by Harbor 1.8 and later.
    #[serde(default)]
    pub status: Option<String>,
}

/// Storage of the registry volume, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Storage {
    pub total: f64,
    pub free: f64,
}

#[derive(Debug, Deserialize)]
struct VolumeInfo {
    storage: Storage,
}

#[derive(Debug, Deserialize)]
struct ChartRepoHealth {
    healthy: bool,
}

/// Calls made by the check.
#[async_trait]
pub trait HarborApi: Send + Sync {
    async fn ping(&self) -> Result<(), HarborError>;

    /// Overall and per-component health.
    async fn health(&self) -> Result<Health, HarborError>;

    /// Health of the chart repository, for versions without `/api/health`.
    async fn chartrepo_health(&self) -> Result<bool, HarborError>;

    async fn registries(&self) -> Result<Vec<Registry>, HarborError>;

    /// Whether Harbor can reach the registry.
    async fn registry_health(&self, id: i64) -> Result<bool, HarborError>;

    async fn projects(&self) -> Result<Vec<serde_json::Value>, HarborError>;

    async fn storage(&self) -> Result<Storage, HarborError>;
}

/// [`HarborApi`] over HTTP with basic auth.
#[derive(Debug, Clone)]
pub struct HarborClient {
    client: reqwest::Client,
    base: String,
    username: Option<String>,
    password: Option<String>,
}

impl HarborClient {
    pub fn new(config: &HarborConfig) -> Result<Self, HarborError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .danger_accept_invalid_certs(!config.tls_verify)
            .build()
            .map_err(|e| HarborError::Connection {
                url: config.url.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            base: format!("{}/api", config.url),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    fn authenticated(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.username {
            Some(username) => request.basic_auth(username, self.password.as_ref()),
            None => request,
        }
    }

    async fn send(
        &self,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, HarborError> {
        let response = self
            .authenticated(request)
            .send()
            .await
            .map_err(|e| HarborError::Connection {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(HarborError::Http {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, HarborError> {
        let url = self.endpoint(path);
        tracing::debug!(url = %url, "GET");
        let response = self.send(&url, self.client.get(&url)).await?;
        response.json().await.map_err(|e| HarborError::Decode {
            url,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl HarborApi for HarborClient {
    async fn ping(&self) -> Result<(), HarborError> {
        let url = self.endpoint("ping");
        self.send(&url, self.client.get(&url)).await.map(|_| ())
    }

    async fn health(&self) -> Result<Health, HarborError> {
        self.get("health").await
    }

    async fn chartrepo_health(&self) -> Result<bool, HarborError> {
        let health: ChartRepoHealth = self.get("chartrepo/health").await?;
        Ok(health.healthy)
    }

    async fn registries(&self) -> Result<Vec<Registry>, HarborError> {
        self.get("registries").await
    }

    async fn registry_health(&self, id: i64) -> Result<bool, HarborError> {
        let url = self.endpoint("registries/ping");
        let request = self.client.post(&url).json(&serde_json::json!({ "id": id }));
        match self.send(&url, request).await {
            Ok(_) => Ok(true),
            Err(HarborError::Http { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn projects(&self) -> Result<Vec<serde_json::Value>, HarborError> {
        self.get("projects").await
    }

    async fn storage(&self) -> Result<Storage, HarborError> {
        let info: VolumeInfo = self.get("systeminfo/volumes").await?;
        Ok(info.storage)
    }
}
