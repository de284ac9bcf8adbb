//! Error taxonomy for login operations

use auth_backend::RemoteAuthError;

/// Errors returned by coordinator operations.
#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("a login is already in progress")]
    AlreadyInProgress,

    #[error("no login in progress")]
    NothingToCancel,
}

/// Result alias for login operations.
pub type Result<T> = std::result::Result<T, LoginError>;

/// Why a phase handler did not produce a transition.
///
/// Only `Remote` can end a session; `InvalidInput` leaves the session in its
/// current phase so the operator can re-enter the field.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Remote(#[from] RemoteAuthError),
}
