use thiserror::Error;

/// Unified error type for Ghostline
#[derive(Error, Debug)]
pub enum GhostlineError {
    // Provider errors
    #[error("Missing provider API key")]
    MissingCredential,

    #[error("Proxy provider fetch failed: {0}")]
    ProviderFetch(String),

    // Pool errors
    #[error("No proxies available for selection")]
    EmptyPool,

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Request errors
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Request to {url} through proxy {proxy} failed after {attempts} attempt(s): {message}")]
    Transport {
        proxy: String,
        url: String,
        attempts: u32,
        message: String,
    },

    #[error("Response decode failed: {0}")]
    Decode(#[from] serde_json::Error),

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Ghostline operations
pub type Result<T> = std::result::Result<T, GhostlineError>;

impl GhostlineError {
    /// Whether another attempt through the same proxy may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, GhostlineError::Transport { .. })
    }

    /// Check if this error was caused by caller input or configuration
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            GhostlineError::MissingCredential
                | GhostlineError::InvalidConfig(_)
                | GhostlineError::InvalidRequest(_)
        )
    }
}

// Convert from URL parse errors
impl From<url::ParseError> for GhostlineError {
    fn from(err: url::ParseError) -> Self {
        GhostlineError::InvalidRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_carries_context() {
        let err = GhostlineError::Transport {
            proxy: "10.0.0.1:8080".to_string(),
            url: "http://example.com/".to_string(),
            attempts: 3,
            message: "connection refused".to_string(),
        };

        let text = err.to_string();
        assert!(text.contains("10.0.0.1:8080"));
        assert!(text.contains("http://example.com/"));
        assert!(text.contains("3 attempt(s)"));
        assert!(text.contains("connection refused"));
    }

    #[test]
    fn test_error_classification_helpers() {
        let transport = GhostlineError::Transport {
            proxy: "p".to_string(),
            url: "u".to_string(),
            attempts: 1,
            message: "m".to_string(),
        };
        assert!(transport.is_retryable());
        assert!(!transport.is_client_error());

        assert!(!GhostlineError::EmptyPool.is_retryable());
        assert!(GhostlineError::MissingCredential.is_client_error());
        assert!(GhostlineError::InvalidRequest("bad".to_string()).is_client_error());
        assert!(!GhostlineError::ProviderFetch("down".to_string()).is_client_error());
    }

    #[test]
    fn test_url_parse_error_maps_to_invalid_request() {
        let err: GhostlineError = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, GhostlineError::InvalidRequest(_)));
    }
}
