use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Empty response from model {0}")]
    EmptyResponse(String),
}

impl AiError {
    /// Whether retrying the same request might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            AiError::Network(_) | AiError::EmptyResponse(_) => true,
            AiError::Api { status, .. } => *status == 429 || *status >= 500,
            AiError::Config(_) | AiError::Parse(_) => false,
        }
    }
}

impl From<reqwest::Error> for AiError {
    fn from(e: reqwest::Error) -> Self {
        AiError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for AiError {
    fn from(e: serde_json::Error) -> Self {
        AiError::Parse(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limits_and_server_errors_are_transient() {
        let rate_limited = AiError::Api {
            status: 429,
            message: "slow down".into(),
        };
        let unavailable = AiError::Api {
            status: 503,
            message: "unavailable".into(),
        };
        assert!(rate_limited.is_transient());
        assert!(unavailable.is_transient());
    }

    #[test]
    fn bad_requests_are_not_transient() {
        let bad = AiError::Api {
            status: 400,
            message: "bad request".into(),
        };
        assert!(!bad.is_transient());
        assert!(!AiError::Config("missing key".into()).is_transient());
    }
}
