//! Runtime policy for the login flow

use std::str::FromStr;
use std::time::Duration;

use auth_backend::ApiCredentials;

/// Idle sessions are expired after this long without operator input.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// What happens to a session when a remote call fails for any reason other
/// than the second-factor signal.
///
/// Remote calls are never retried automatically under either policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemoteErrorPolicy {
    /// Delete the session; the operator restarts with `/generate`.
    #[default]
    Abort,
    /// Keep the session in its current phase and ask for the same field again.
    RetryInPlace,
}

impl FromStr for RemoteErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "abort" => Ok(RemoteErrorPolicy::Abort),
            "retry_in_place" => Ok(RemoteErrorPolicy::RetryInPlace),
            other => Err(format!(
                "unknown remote error policy {other:?} (expected \"abort\" or \"retry_in_place\")"
            )),
        }
    }
}

/// Settings shared by every session of a coordinator.
#[derive(Debug, Clone)]
pub struct LoginSettings {
    /// Process-wide API credentials. `None` means the operator supplies
    /// them as the first two steps.
    pub api_credentials: Option<ApiCredentials>,
    pub on_remote_error: RemoteErrorPolicy,
    pub idle_timeout: Duration,
}

impl LoginSettings {
    pub fn interactive_credentials(&self) -> bool {
        self.api_credentials.is_none()
    }
}

impl Default for LoginSettings {
    fn default() -> Self {
        Self {
            api_credentials: None,
            on_remote_error: RemoteErrorPolicy::Abort,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}
