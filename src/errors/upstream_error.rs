use thiserror::Error;

/// Failure of a single upstream call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// The upstream answered with a non-2xx status. `body` is the raw response text.
    #[error("{status} - {body}")]
    Http { status: u16, body: String },
    /// No response was obtained (DNS, refused connection, timeout, broken body).
    #[error("upstream request failed: {0}")]
    Transport(String),
}

impl UpstreamError {
    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::Http { status, .. } => Some(*status),
            UpstreamError::Transport(_) => None,
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return UpstreamError::Transport("HTTP request timed out".to_string());
        }
        UpstreamError::Transport(err.to_string())
    }
}
