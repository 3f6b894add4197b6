//! Error types for the ClickHouse check.

use thiserror::Error;

use integrations_base::CheckError;

/// Errors raised while talking to ClickHouse.
#[derive(Debug, Error)]
pub enum ClickhouseError {
    /// The server rejected or failed a query.
    #[error("{message}")]
    Query { table: String, message: String },

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("{0}")]
    Other(String),
}

impl From<ClickhouseError> for CheckError {
    fn from(err: ClickhouseError) -> Self {
        CheckError::collection(err.to_string())
    }
}

/// Scrubs a secret out of error messages before they are logged.
#[derive(Debug, Clone, Default)]
pub struct ErrorSanitizer {
    secrets: Vec<String>,
}

impl ErrorSanitizer {
    pub const MASK: &'static str = "**********";

    pub fn new() -> Self {
        Self::default()
    }

    /// Mask `secret` wherever it appears; empty secrets are ignored.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        if !secret.is_empty() {
            self.secrets.push(secret);
        }
        self
    }

    pub fn clean(&self, message: &str) -> String {
        self.secrets
            .iter()
            .fold(message.to_string(), |message, secret| {
                message.replace(secret.as_str(), Self::MASK)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitizer() {
        let sanitizer = ErrorSanitizer::new().with_secret("s3cr3t");
        assert_eq!(
            sanitizer.clean("auth failed for default:s3cr3t@db"),
            "auth failed for default:**********@db"
        );

        let empty = ErrorSanitizer::new().with_secret("");
        assert_eq!(empty.clean("nothing to hide"), "nothing to hide");
    }
}
