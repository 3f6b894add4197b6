use thiserror::Error;

use crate::serialization::Format;

/// Errors shared by the integration crates.
#[derive(Debug, Error)]
pub enum Error {
    /// A configuration file or string could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The tracing subscriber could not be installed.
    #[error("Failed to initialize tracing: {0}")]
    Tracing(String),

    /// The session submissions are published on could not be opened.
    #[error("Agent session error: {0}")]
    Session(#[from] zenoh::Error),

    /// A metric sample or service check could not be encoded.
    #[error("Failed to encode submission as {format}: {message}")]
    Encode { format: Format, message: String },

    /// A payload could not be decoded into a submission.
    #[error("Failed to decode submission from {format}: {message}")]
    Decode { format: Format, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
