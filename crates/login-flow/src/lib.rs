//! Interactive login state machine
//!
//! Drives a multi-step login over a text conversation and hands the
//! resulting session string back to the operator. The transport feeds
//! `begin` / `cancel` / `dispatch` calls into the [`Coordinator`] and reads
//! [`Outbound`] replies from the channel it was built with.
//!
//! Login lifecycle:
//! 1. `begin` creates a session in its first phase (API id, or phone when
//!    API credentials are configured process-wide)
//! 2. Each `dispatch` runs the handler for the current phase, which may open
//!    an [`EphemeralClient`] for one or two remote calls and releases it
//! 3. The session advances, stays put on invalid input, or ends
//! 4. Success, cancellation, fatal remote error and idle expiry all delete
//!    the session; a new `begin` starts over

pub mod client;
pub mod coordinator;
pub mod error;
pub mod expiry;
pub mod handlers;
pub mod metrics;
pub mod reply;
pub mod session;
pub mod settings;

#[cfg(test)]
pub(crate) mod mock;

pub use client::{CodeOutcome, EphemeralClient};
pub use coordinator::Coordinator;
pub use error::{LoginError, Result, StepError};
pub use expiry::spawn_expiry_task;
pub use handlers::Transition;
pub use reply::{Outbound, Progress, Prompt, Reply};
pub use session::{LoginSession, OperatorId, Phase, PhaseKind};
pub use settings::{DEFAULT_IDLE_TIMEOUT, LoginSettings, RemoteErrorPolicy};
