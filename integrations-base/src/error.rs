//! Error types for the check framework.

use thiserror::Error;

/// Result type alias using [`CheckError`].
pub type Result<T> = std::result::Result<T, CheckError>;

/// Errors that can occur in a check.
#[derive(Error, Debug)]
pub enum CheckError {
    /// Invalid instance or init configuration.
    ///
    /// Raised while building a check from its configuration; the check is
    /// never scheduled.
    #[error("{0}")]
    Configuration(String),

    /// Configuration file not found.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration parse error.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Zenoh connection error.
    #[error("Zenoh connection error: {0}")]
    ZenohConnection(String),

    /// Zenoh session error.
    #[error("Zenoh session error: {0}")]
    ZenohSession(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Publishing error.
    #[error("Failed to publish to {key}: {message}")]
    Publish { key: String, message: String },

    /// Failure while collecting from the monitored system.
    #[error("{0}")]
    Collection(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl CheckError {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a collection error.
    pub fn collection(msg: impl Into<String>) -> Self {
        Self::Collection(msg.into())
    }

    /// Wrap an error with context.
    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::WithContext {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Whether this error came from invalid configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

impl From<zenoh::Error> for CheckError {
    fn from(err: zenoh::Error) -> Self {
        Self::ZenohSession(err.to_string())
    }
}

impl From<serde_json::Error> for CheckError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<json5::Error> for CheckError {
    fn from(err: json5::Error) -> Self {
        Self::ConfigParse(err.to_string())
    }
}

impl From<serde_yaml::Error> for CheckError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::ConfigParse(err.to_string())
    }
}

impl From<integrations_common::Error> for CheckError {
    fn from(err: integrations_common::Error) -> Self {
        match err {
            integrations_common::Error::Config(msg) => Self::ConfigParse(msg),
            integrations_common::Error::Session(e) => Self::ZenohSession(e.to_string()),
            integrations_common::Error::Io(e) => Self::Io(e),
            other @ (integrations_common::Error::Encode { .. }
            | integrations_common::Error::Decode { .. }) => Self::Serialization(other.to_string()),
            other @ integrations_common::Error::Tracing(_) => Self::ConfigParse(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_displays_message_only() {
        let err = CheckError::configuration("An authentication method needs to be provided");
        assert_eq!(err.to_string(), "An authentication method needs to be provided");
        assert!(err.is_configuration());
    }

    #[test]
    fn test_with_context() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = CheckError::with_context("reading profile", io);
        assert_eq!(err.to_string(), "reading profile: gone");
        assert!(!err.is_configuration());
    }
}
