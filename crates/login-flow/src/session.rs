//! Login session state
//!
//! `Phase` carries exactly the data its step needs, so a session waiting for
//! a code always has the phone number and continuation token that go with
//! it. Terminal outcomes are not phases: they delete the session.

use std::fmt;

use auth_backend::{ApiCredentials, ContinuationToken};
use tokio::time::Instant;
use uuid::Uuid;

/// Stable identifier of an operator (the chat user id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperatorId(pub i64);

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Current step of a login.
///
/// Transitions (forward only):
/// - AwaitingApiId → AwaitingApiHash → AwaitingPhone
/// - AwaitingPhone → AwaitingCode (code requested)
/// - AwaitingCode → AwaitingPassword (second factor required)
/// - AwaitingCode | AwaitingPassword → (succeeded, session deleted)
#[derive(Clone)]
pub enum Phase {
    AwaitingApiId,
    AwaitingApiHash {
        api_id: i32,
    },
    AwaitingPhone {
        credentials: ApiCredentials,
    },
    AwaitingCode {
        credentials: ApiCredentials,
        phone: String,
        token: ContinuationToken,
    },
    AwaitingPassword {
        credentials: ApiCredentials,
        phone: String,
    },
}

impl Phase {
    /// First phase of a new login. With process-wide API credentials the
    /// operator starts at the phone number; otherwise they are collected
    /// interactively.
    pub fn initial(preset: Option<&ApiCredentials>) -> Self {
        match preset {
            Some(credentials) => Phase::AwaitingPhone {
                credentials: credentials.clone(),
            },
            None => Phase::AwaitingApiId,
        }
    }

    pub fn kind(&self) -> PhaseKind {
        match self {
            Phase::AwaitingApiId => PhaseKind::AwaitingApiId,
            Phase::AwaitingApiHash { .. } => PhaseKind::AwaitingApiHash,
            Phase::AwaitingPhone { .. } => PhaseKind::AwaitingPhone,
            Phase::AwaitingCode { .. } => PhaseKind::AwaitingCode,
            Phase::AwaitingPassword { .. } => PhaseKind::AwaitingPassword,
        }
    }
}

// Phone numbers stay out of Debug output; only the phase is shown.
impl fmt::Debug for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Phase::{:?}", self.kind())
    }
}

/// Data-free view of a [`Phase`], ordered by progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PhaseKind {
    AwaitingApiId,
    AwaitingApiHash,
    AwaitingPhone,
    AwaitingCode,
    AwaitingPassword,
}

impl PhaseKind {
    /// Label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            PhaseKind::AwaitingApiId => "awaiting_api_id",
            PhaseKind::AwaitingApiHash => "awaiting_api_hash",
            PhaseKind::AwaitingPhone => "awaiting_phone",
            PhaseKind::AwaitingCode => "awaiting_code",
            PhaseKind::AwaitingPassword => "awaiting_password",
        }
    }

    /// 1-based step number shown to the operator. When API credentials are
    /// configured the two credential steps are skipped.
    pub fn step(&self, interactive_credentials: bool) -> u8 {
        let base = match self {
            PhaseKind::AwaitingApiId => 1,
            PhaseKind::AwaitingApiHash => 2,
            PhaseKind::AwaitingPhone => 3,
            PhaseKind::AwaitingCode => 4,
            PhaseKind::AwaitingPassword => 5,
        };
        if interactive_credentials {
            base
        } else {
            base.saturating_sub(2).max(1)
        }
    }

    /// Total number of steps for a login that needs a second factor.
    pub fn total_steps(interactive_credentials: bool) -> u8 {
        if interactive_credentials { 5 } else { 3 }
    }
}

/// One in-progress login, owned by the coordinator.
#[derive(Debug)]
pub struct LoginSession {
    pub identity: OperatorId,
    /// Distinguishes this attempt from earlier or later ones for the same
    /// operator.
    pub attempt: Uuid,
    pub phase: Phase,
    /// Last validation or retained remote error, for diagnostics only.
    pub last_error: Option<String>,
    pub started_at: Instant,
}

impl LoginSession {
    pub fn new(identity: OperatorId, phase: Phase) -> Self {
        Self {
            identity,
            attempt: Uuid::new_v4(),
            phase,
            last_error: None,
            started_at: Instant::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_phase_depends_on_preset_credentials() {
        assert_eq!(Phase::initial(None).kind(), PhaseKind::AwaitingApiId);
        let creds = ApiCredentials::new(1, "hash");
        assert_eq!(
            Phase::initial(Some(&creds)).kind(),
            PhaseKind::AwaitingPhone
        );
    }

    #[test]
    fn phase_kinds_are_ordered_by_progression() {
        assert!(PhaseKind::AwaitingApiId < PhaseKind::AwaitingApiHash);
        assert!(PhaseKind::AwaitingApiHash < PhaseKind::AwaitingPhone);
        assert!(PhaseKind::AwaitingPhone < PhaseKind::AwaitingCode);
        assert!(PhaseKind::AwaitingCode < PhaseKind::AwaitingPassword);
    }

    #[test]
    fn step_numbers_skip_credential_steps_when_preset() {
        assert_eq!(PhaseKind::AwaitingPhone.step(true), 3);
        assert_eq!(PhaseKind::AwaitingPhone.step(false), 1);
        assert_eq!(PhaseKind::AwaitingPassword.step(false), 3);
        assert_eq!(PhaseKind::total_steps(true), 5);
        assert_eq!(PhaseKind::total_steps(false), 3);
    }

    #[test]
    fn debug_hides_phone_number() {
        let phase = Phase::AwaitingPassword {
            credentials: ApiCredentials::new(1, "hash"),
            phone: "+15551234567".into(),
        };
        let debug = format!("{phase:?}");
        assert_eq!(debug, "Phase::AwaitingPassword");
    }

    #[test]
    fn new_sessions_get_distinct_attempt_ids() {
        let a = LoginSession::new(OperatorId(7), Phase::AwaitingApiId);
        let b = LoginSession::new(OperatorId(7), Phase::AwaitingApiId);
        assert_ne!(a.attempt, b.attempt);
        assert!(a.last_error.is_none());
    }
}
