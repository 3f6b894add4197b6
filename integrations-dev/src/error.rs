//! Error types for the configuration tooling.

use thiserror::Error;

fn plural(count: &usize) -> &'static str {
    if *count == 1 { "" } else { "s" }
}

/// Errors raised while loading templates or rendering a specification.
#[derive(Debug, Error)]
pub enum SpecError {
    /// Validation found problems; the messages are on the loader.
    #[error("The configuration specification has {count} error{}", plural(.count))]
    Invalid { count: usize },

    #[error("Template `{0}` does not exist")]
    UnknownTemplate(String),

    #[error("Unable to parse template `{name}`: {message}")]
    TemplateParse { name: String, message: String },

    #[error("Template override `{path}` has no named mapping `{segment}`")]
    Override { path: String, segment: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SpecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_message() {
        assert_eq!(
            SpecError::Invalid { count: 1 }.to_string(),
            "The configuration specification has 1 error"
        );
        assert_eq!(
            SpecError::Invalid { count: 3 }.to_string(),
            "The configuration specification has 3 errors"
        );
    }
}
