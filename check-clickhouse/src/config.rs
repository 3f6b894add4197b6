//! Instance configuration of the ClickHouse check.

use std::time::Duration;

use serde::Deserialize;

use integrations_base::CheckError;
use integrations_common::values::{deserialize_affirmative, deserialize_lenient_int};

pub const DEFAULT_PORT: u16 = 8123;
pub const DEFAULT_DB: &str = "default";
pub const DEFAULT_USER: &str = "default";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 10;

/// One entry of `instances`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClickhouseInstance {
    #[serde(default)]
    pub server: Option<String>,

    #[serde(default, deserialize_with = "deserialize_lenient_int")]
    pub port: Option<i64>,

    #[serde(default)]
    pub db: Option<String>,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default, deserialize_with = "deserialize_lenient_int")]
    pub connect_timeout: Option<i64>,

    #[serde(default, deserialize_with = "deserialize_lenient_int")]
    pub read_timeout: Option<i64>,

    /// Use HTTPS.
    #[serde(default, deserialize_with = "deserialize_affirmative")]
    pub secure: Option<bool>,

    #[serde(default, deserialize_with = "deserialize_affirmative")]
    pub tls_verify: Option<bool>,

    #[serde(default)]
    pub tags: Vec<String>,
}

/// Validated connection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ClickhouseConfig {
    pub server: String,
    pub port: u16,
    pub db: String,
    pub user: String,
    pub password: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub secure: bool,
    pub tls_verify: bool,
    /// Instance tags plus `server`, `port` and `db`.
    pub tags: Vec<String>,
}

impl ClickhouseConfig {
    pub fn from_instance(instance: &serde_json::Value) -> Result<Self, CheckError> {
        let raw: ClickhouseInstance = serde_json::from_value(instance.clone())
            .map_err(|e| CheckError::configuration(format!("Invalid instance: {}", e)))?;

        let server = raw
            .server
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CheckError::configuration("the `server` setting is required"))?;

        let port = match raw.port {
            None => DEFAULT_PORT,
            Some(port) => u16::try_from(port)
                .map_err(|_| CheckError::configuration(format!("Invalid port: {}", port)))?,
        };

        let seconds = |value: Option<i64>, default: u64, key: &str| match value {
            None => Ok(Duration::from_secs(default)),
            Some(secs) => u64::try_from(secs)
                .map(Duration::from_secs)
                .map_err(|_| CheckError::configuration(format!("Invalid {}: {}", key, secs))),
        };

        let db = raw.db.unwrap_or_else(|| DEFAULT_DB.to_string());

        let mut tags = raw.tags;
        tags.push(format!("server:{}", server));
        tags.push(format!("port:{}", port));
        tags.push(format!("db:{}", db));

        Ok(Self {
            connect_timeout: seconds(raw.connect_timeout, DEFAULT_CONNECT_TIMEOUT_SECS, "connect_timeout")?,
            read_timeout: seconds(raw.read_timeout, DEFAULT_READ_TIMEOUT_SECS, "read_timeout")?,
            user: raw.user.unwrap_or_else(|| DEFAULT_USER.to_string()),
            password: raw.password.unwrap_or_default(),
            secure: raw.secure.unwrap_or(false),
            tls_verify: raw.tls_verify.unwrap_or(false),
            server,
            port,
            db,
            tags,
        })
    }

    /// Base URL of the HTTP interface.
    pub fn url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}:{}/", scheme, self.server, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_and_tags() {
        let config = ClickhouseConfig::from_instance(&json!({
            "server": "localhost",
            "tags": ["env:dev"],
        }))
        .unwrap();

        assert_eq!(config.port, 8123);
        assert_eq!(config.db, "default");
        assert_eq!(config.user, "default");
        assert_eq!(config.password, "");
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert!(!config.tls_verify);
        assert_eq!(
            config.tags,
            vec!["env:dev", "server:localhost", "port:8123", "db:default"]
        );
        assert_eq!(config.url(), "http://localhost:8123/");
    }

    #[test]
    fn test_lenient_values() {
        let config = ClickhouseConfig::from_instance(&json!({
            "server": "ch.internal",
            "port": "8443",
            "secure": "yes",
            "tls_verify": "true",
            "read_timeout": "30",
        }))
        .unwrap();

        assert_eq!(config.port, 8443);
        assert!(config.secure && config.tls_verify);
        assert_eq!(config.read_timeout, Duration::from_secs(30));
        assert_eq!(config.url(), "https://ch.internal:8443/");
    }

    #[test]
    fn test_server_required() {
        let err = ClickhouseConfig::from_instance(&json!({"port": 9000})).unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(err.to_string(), "the `server` setting is required");

        let err = ClickhouseConfig::from_instance(&json!({"server": "x", "port": 70000})).unwrap_err();
        assert_eq!(err.to_string(), "Invalid port: 70000");
    }
}
