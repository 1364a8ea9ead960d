use thiserror::Error;

/// Failures reported by a push transport.
#[derive(Debug, Error)]
pub enum PushError {
    /// The provider rejected the request body (HTTP 400).
    #[error("Push provider rejected the payload as invalid JSON")]
    InvalidPayload,

    /// The server key was refused (HTTP 401).
    #[error("Push provider rejected the server key")]
    InvalidCredentials,

    /// The provider failed internally (HTTP 5xx).
    #[error("Push provider error: status {0}")]
    Server(u16),

    #[error("Push request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl PushError {
    /// Credential failures affect every send, not only the current device.
    pub fn is_credential_failure(&self) -> bool {
        matches!(self, PushError::InvalidCredentials)
    }
}
