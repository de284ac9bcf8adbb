//! Errors reported by the remote authentication service

/// Any failure of a remote login operation.
///
/// The "second factor required" signal is deliberately absent: it is a
/// recognized outcome of code verification (`SignInOutcome::PasswordRequired`),
/// not an error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteAuthError {
    #[error("could not connect to the authentication service: {0}")]
    Connect(String),

    #[error("request to the authentication service failed: {0}")]
    Transport(String),

    #[error("{code}: {message}")]
    Rejected { code: String, message: String },

    #[error("unexpected response from the authentication service: {0}")]
    Protocol(String),
}

impl RemoteAuthError {
    /// Short label for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RemoteAuthError::Connect(_) => "connect",
            RemoteAuthError::Transport(_) => "transport",
            RemoteAuthError::Rejected { .. } => "rejected",
            RemoteAuthError::Protocol(_) => "protocol",
        }
    }
}

/// Result alias for remote operations.
pub type Result<T> = std::result::Result<T, RemoteAuthError>;
