use thiserror::Error;

/// Failures surfaced by the comparison, gateway, generator and store layers.
///
/// Each variant maps to one class of user-visible notice; none of them is
/// retried automatically.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Rejected locally before any network call.
    #[error("{0}")]
    Validation(String),

    /// The remote answered with a non-success status.
    #[error("{message} (status {status})")]
    Upstream {
        status: u16,
        message: String,
        details: Option<String>,
    },

    /// No response was obtained at all.
    #[error("Network error: {0}")]
    Network(String),

    /// The call succeeded but the reply could not be turned into a result.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Persisting the configuration failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A local step that should not fail did, e.g. rendering a bundled template.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn parse(message: impl Into<String>) -> Self {
        ApiError::Parse(message.into())
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn details(&self) -> Option<&str> {
        match self {
            ApiError::Upstream { details, .. } => details.as_deref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Network(err.to_string())
    }
}
