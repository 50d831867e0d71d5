use thiserror::Error;

/// Errors raised while talking to a ServiceNow instance.
#[derive(Debug, Error)]
pub enum ServiceNowError {
    /// The connection profile is unusable (bad URL, client build failure).
    #[error("Invalid connection profile: {0}")]
    InvalidProfile(String),

    #[error("Invalid table name: {0:?}")]
    InvalidTable(String),

    /// The instance could not be reached.
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Credentials were rejected (401/403).
    #[error("Authentication rejected ({status}): {message}")]
    Auth { status: u16, message: String },

    /// The table does not exist or is not readable through the Table API.
    #[error("Table not found: {0}")]
    NotFound(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The response body was not the expected JSON envelope.
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ServiceNowError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ServiceNowError::Connection(_) | ServiceNowError::Timeout(_) => true,
            ServiceNowError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ServiceNowError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ServiceNowError::Timeout(err.to_string())
        } else if err.is_decode() {
            ServiceNowError::Decode(err.to_string())
        } else if err.is_builder() {
            ServiceNowError::InvalidProfile(err.to_string())
        } else {
            ServiceNowError::Connection(err.to_string())
        }
    }
}
