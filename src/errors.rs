use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Transient network error: {0}")]
    TransientNetwork(String),

    #[error("Mapping error: {0}")]
    Mapping(String),

    #[error("Remote API error: HTTP {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("Invalid response from remote API: {0}")]
    InvalidResponse(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage operation failed: {0}")]
    Storage(String),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl SyncError {
    /// Authentication and configuration problems need an operator; retrying on
    /// the next tick will not fix them.
    pub fn needs_operator(&self) -> bool {
        matches!(self, SyncError::Authentication(_) | SyncError::Configuration(_))
    }
}

// reqwest only reports transport-level failures here; HTTP status handling
// lives in the client so that 401/403/429/5xx can be classified.
impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            SyncError::TransientNetwork(err.to_string())
        } else if err.is_decode() {
            SyncError::InvalidResponse(err.to_string())
        } else if let Some(status) = err.status() {
            SyncError::Remote {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            SyncError::TransientNetwork(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_errors() {
        assert!(SyncError::Authentication("bad token".into()).needs_operator());
        assert!(SyncError::Configuration("no store url".into()).needs_operator());
        assert!(!SyncError::TransientNetwork("reset".into()).needs_operator());
        assert!(!SyncError::Mapping("bad price".into()).needs_operator());
    }

    #[test]
    fn test_remote_error_message() {
        let err = SyncError::Remote {
            status: 422,
            body: "title can't be blank".into(),
        };
        assert_eq!(
            err.to_string(),
            "Remote API error: HTTP 422: title can't be blank"
        );
    }
}
