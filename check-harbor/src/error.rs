//! Error types for the Harbor check.

use thiserror::Error;

use integrations_base::CheckError;

/// Errors raised while calling the Harbor API.
#[derive(Debug, Error)]
pub enum HarborError {
    #[error("{url} returned HTTP {status}")]
    Http { url: String, status: u16 },

    #[error("request to {url} failed: {message}")]
    Connection { url: String, message: String },

    #[error("invalid response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl HarborError {
    pub fn status(&self) -> Option<u16> {
        match self {
            HarborError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The endpoint does not exist on this Harbor version.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// The configured user lacks the permission.
    pub fn is_forbidden(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }
}

impl From<HarborError> for CheckError {
    fn from(err: HarborError) -> Self {
        CheckError::collection(err.to_string())
    }
}
