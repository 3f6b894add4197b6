//! Instance configuration of the Harbor check.

use serde::Deserialize;

use integrations_base::CheckError;
use integrations_common::values::deserialize_affirmative;

/// One entry of `instances`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HarborInstance {
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default, deserialize_with = "deserialize_affirmative")]
    pub tls_verify: Option<bool>,

    #[serde(default)]
    pub tags: Vec<String>,
}

/// Validated instance settings.
#[derive(Debug, Clone, PartialEq)]
pub struct HarborConfig {
    /// Base URL without trailing slash.
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls_verify: bool,
    pub tags: Vec<String>,
}

impl HarborConfig {
    pub fn from_instance(instance: &serde_json::Value) -> Result<Self, CheckError> {
        let raw: HarborInstance = serde_json::from_value(instance.clone())
            .map_err(|e| CheckError::configuration(format!("Invalid instance: {}", e)))?;

        let url = raw
            .url
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| CheckError::configuration("the `url` setting is required"))?;

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(CheckError::configuration(format!(
                "Invalid url {}: expected an http or https URL",
                url
            )));
        }

        Ok(Self {
            url,
            username: raw.username.filter(|u| !u.is_empty()),
            password: raw.password,
            tls_verify: raw.tls_verify.unwrap_or(true),
            tags: raw.tags,
        })
    }
}
