//! Messages the login flow hands to result delivery
//!
//! Replies are structured; the transport decides how to render them.

use auth_backend::Credential;

use crate::session::{OperatorId, PhaseKind};

/// A reply addressed to one operator.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub to: OperatorId,
    pub reply: Reply,
}

/// Request for the field the current phase needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prompt {
    pub phase: PhaseKind,
    pub step: u8,
    pub total: u8,
}

impl Prompt {
    pub fn for_phase(phase: PhaseKind, interactive_credentials: bool) -> Self {
        Self {
            phase,
            step: phase.step(interactive_credentials),
            total: PhaseKind::total_steps(interactive_credentials),
        }
    }
}

/// Notice sent just before a remote call starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Connecting,
    VerifyingCode,
    VerifyingPassword,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Ask for the next field.
    Prompt(Prompt),
    /// A remote call is about to run.
    Progress(Progress),
    /// Local validation failed; the same field is expected again.
    InvalidInput { phase: PhaseKind, reason: String },
    /// A remote call failed but the session was kept in `phase`.
    RetryField { phase: PhaseKind, error: String },
    /// Terminal success. Delivered exactly once.
    Succeeded {
        credential: Credential,
        second_factor: bool,
    },
    /// Terminal failure; the operator must start again.
    Failed { error: String },
    AlreadyInProgress,
    Cancelled,
    NothingToCancel,
    /// The session was removed after sitting idle.
    Expired,
    /// A remote call finished after its session was cancelled or expired;
    /// its result was thrown away.
    Discarded,
}

impl Reply {
    /// Label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Reply::Prompt(_) => "prompt",
            Reply::Progress(_) => "progress",
            Reply::InvalidInput { .. } => "invalid_input",
            Reply::RetryField { .. } => "retry_field",
            Reply::Succeeded { .. } => "succeeded",
            Reply::Failed { .. } => "failed",
            Reply::AlreadyInProgress => "already_in_progress",
            Reply::Cancelled => "cancelled",
            Reply::NothingToCancel => "nothing_to_cancel",
            Reply::Expired => "expired",
            Reply::Discarded => "discarded",
        }
    }
}
