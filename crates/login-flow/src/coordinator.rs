//! Session coordinator
//!
//! Owns every in-progress login. The session map is a short-held std mutex
//! (never held across an await); each entry carries its own async gate that
//! `dispatch` holds for the whole handler run, so messages from one operator
//! are handled one at a time, in arrival order, while other operators
//! proceed in parallel.
//!
//! `cancel` and idle expiry remove the map entry without waiting for the
//! gate. A handler that finishes after its entry was removed (or replaced by
//! a new attempt) has its result discarded; a removed session is never
//! brought back. Transports that queue input capture the attempt with
//! `current_attempt` when a message arrives and hand it to `dispatch_to`, so
//! text sent to an ended login never reaches its successor.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use auth_backend::AuthBackend;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{LoginError, Result};
use crate::handlers::{self, Transition};
use crate::metrics;
use crate::reply::{Outbound, Progress, Prompt, Reply};
use crate::session::{LoginSession, OperatorId, Phase, PhaseKind};
use crate::settings::{LoginSettings, RemoteErrorPolicy};

/// Map entry for one operator's login.
struct Entry {
    attempt: Uuid,
    last_activity: Instant,
    gate: Arc<tokio::sync::Mutex<LoginSession>>,
}

pub struct Coordinator {
    sessions: Mutex<HashMap<OperatorId, Entry>>,
    backend: Arc<dyn AuthBackend>,
    settings: LoginSettings,
    replies: UnboundedSender<Outbound>,
}

impl Coordinator {
    /// Create a coordinator that sends every reply into `replies`.
    pub fn new(
        backend: Arc<dyn AuthBackend>,
        settings: LoginSettings,
        replies: UnboundedSender<Outbound>,
    ) -> Self {
        info!(
            backend = backend.id(),
            interactive_credentials = settings.interactive_credentials(),
            on_remote_error = ?settings.on_remote_error,
            idle_timeout_secs = settings.idle_timeout.as_secs(),
            "login coordinator initialized"
        );
        Self {
            sessions: Mutex::new(HashMap::new()),
            backend,
            settings,
            replies,
        }
    }

    pub fn settings(&self) -> &LoginSettings {
        &self.settings
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<OperatorId, Entry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reply(&self, to: OperatorId, reply: Reply) {
        let label = reply.label();
        if self.replies.send(Outbound { to, reply }).is_err() {
            debug!(operator = %to, reply = label, "reply channel closed, dropping reply");
        }
    }

    fn prompt(&self, phase: PhaseKind) -> Reply {
        Reply::Prompt(Prompt::for_phase(
            phase,
            self.settings.interactive_credentials(),
        ))
    }

    /// Start a login for `identity`.
    ///
    /// Fails with `AlreadyInProgress` (and leaves the existing session
    /// untouched) if one is already running.
    pub fn begin(&self, identity: OperatorId) -> Result<()> {
        let phase = Phase::initial(self.settings.api_credentials.as_ref());
        let kind = phase.kind();

        let attempt = {
            let mut sessions = self.sessions();
            if sessions.contains_key(&identity) {
                drop(sessions);
                debug!(operator = %identity, "login already in progress");
                self.reply(identity, Reply::AlreadyInProgress);
                return Err(LoginError::AlreadyInProgress);
            }
            let session = LoginSession::new(identity, phase);
            let attempt = session.attempt;
            sessions.insert(
                identity,
                Entry {
                    attempt,
                    last_activity: Instant::now(),
                    gate: Arc::new(tokio::sync::Mutex::new(session)),
                },
            );
            metrics::set_active_sessions(sessions.len());
            attempt
        };

        metrics::record_attempt_started();
        info!(operator = %identity, %attempt, phase = kind.label(), "login started");
        self.reply(identity, self.prompt(kind));
        Ok(())
    }

    /// Abandon the login for `identity`. Does not touch the remote service.
    pub fn cancel(&self, identity: OperatorId) -> Result<()> {
        let removed = {
            let mut sessions = self.sessions();
            let removed = sessions.remove(&identity);
            metrics::set_active_sessions(sessions.len());
            removed
        };

        match removed {
            Some(entry) => {
                metrics::record_outcome("cancelled");
                info!(operator = %identity, attempt = %entry.attempt, "login cancelled");
                self.reply(identity, Reply::Cancelled);
                Ok(())
            }
            None => {
                self.reply(identity, Reply::NothingToCancel);
                Err(LoginError::NothingToCancel)
            }
        }
    }

    /// Feed one line of operator input into the current phase.
    ///
    /// Without a session this is a silent no-op: no reply, no remote call.
    pub async fn dispatch(&self, identity: OperatorId, text: &str) {
        match self.current_attempt(identity) {
            Some(attempt) => self.dispatch_to(identity, attempt, text).await,
            None => debug!(operator = %identity, "no login in progress, ignoring message"),
        }
    }

    /// Attempt id of `identity`'s running login, if any.
    pub fn current_attempt(&self, identity: OperatorId) -> Option<Uuid> {
        self.sessions().get(&identity).map(|entry| entry.attempt)
    }

    /// Feed input that arrived while `attempt` was the running login.
    ///
    /// Input is dropped without a reply if that attempt has since been
    /// cancelled, expired or finished, even when a newer login is running.
    pub async fn dispatch_to(&self, identity: OperatorId, attempt: Uuid, text: &str) {
        let gate = {
            let mut sessions = self.sessions();
            match sessions.get_mut(&identity) {
                Some(entry) if entry.attempt == attempt => {
                    entry.last_activity = Instant::now();
                    entry.gate.clone()
                }
                _ => {
                    debug!(
                        operator = %identity,
                        %attempt,
                        "login ended before message was handled, ignoring it"
                    );
                    return;
                }
            }
        };

        let mut session = gate.lock().await;

        // Cancelled or expired while an earlier message held the gate
        if !self.is_current(identity, attempt) {
            debug!(operator = %identity, %attempt, "login ended while queued, ignoring message");
            return;
        }

        let from = session.phase.kind();
        let progress = |p: Progress| self.reply(identity, Reply::Progress(p));
        let transition =
            handlers::handle(session.phase.clone(), text, self.backend.as_ref(), &progress).await;

        self.apply(&mut session, from, transition);
    }

    fn is_current(&self, identity: OperatorId, attempt: Uuid) -> bool {
        self.sessions()
            .get(&identity)
            .is_some_and(|entry| entry.attempt == attempt)
    }

    /// Store or delete the session according to the handler's decision.
    fn apply(&self, session: &mut LoginSession, from: PhaseKind, transition: Transition) {
        let identity = session.identity;
        let attempt = session.attempt;
        let mut sessions = self.sessions();

        let current = match sessions.get_mut(&identity) {
            Some(entry) if entry.attempt == attempt => {
                entry.last_activity = Instant::now();
                true
            }
            _ => false,
        };
        if !current {
            drop(sessions);
            match &transition {
                Transition::Succeeded { credential, .. } => warn!(
                    operator = %identity,
                    %attempt,
                    fingerprint = %credential.fingerprint(),
                    "login finished after it was cancelled, discarding credential"
                ),
                _ => debug!(operator = %identity, %attempt, "discarding result of cancelled login"),
            }
            self.reply(identity, Reply::Discarded);
            return;
        }

        match transition {
            Transition::Advance(next) => {
                drop(sessions);
                let to = next.kind();
                debug_assert!(to > from, "phases only move forward");
                session.phase = next;
                session.last_error = None;
                info!(
                    operator = %identity,
                    %attempt,
                    from = from.label(),
                    to = to.label(),
                    "login advanced"
                );
                self.reply(identity, self.prompt(to));
            }
            Transition::Invalid(reason) => {
                drop(sessions);
                debug!(operator = %identity, phase = from.label(), "input rejected");
                session.last_error = Some(reason.clone());
                self.reply(
                    identity,
                    Reply::InvalidInput {
                        phase: from,
                        reason,
                    },
                );
            }
            Transition::Succeeded {
                credential,
                second_factor,
            } => {
                sessions.remove(&identity);
                metrics::set_active_sessions(sessions.len());
                drop(sessions);
                metrics::record_outcome("succeeded");
                info!(
                    operator = %identity,
                    %attempt,
                    second_factor,
                    fingerprint = %credential.fingerprint(),
                    elapsed_secs = session.started_at.elapsed().as_secs(),
                    "login succeeded"
                );
                self.reply(
                    identity,
                    Reply::Succeeded {
                        credential,
                        second_factor,
                    },
                );
            }
            Transition::RemoteFailed(error) => match self.settings.on_remote_error {
                RemoteErrorPolicy::Abort => {
                    sessions.remove(&identity);
                    metrics::set_active_sessions(sessions.len());
                    drop(sessions);
                    metrics::record_outcome("failed");
                    warn!(
                        operator = %identity,
                        %attempt,
                        phase = from.label(),
                        error = %error,
                        "login failed"
                    );
                    self.reply(
                        identity,
                        Reply::Failed {
                            error: error.to_string(),
                        },
                    );
                }
                RemoteErrorPolicy::RetryInPlace => {
                    drop(sessions);
                    warn!(
                        operator = %identity,
                        %attempt,
                        phase = from.label(),
                        error = %error,
                        "remote call failed, keeping session"
                    );
                    session.last_error = Some(error.to_string());
                    self.reply(
                        identity,
                        Reply::RetryField {
                            phase: from,
                            error: error.to_string(),
                        },
                    );
                }
            },
        }
    }

    /// Remove sessions idle for longer than `max_idle`. Sessions with a
    /// remote call in flight are left alone. Returns the expired operators.
    pub fn expire_idle(&self, max_idle: Duration) -> Vec<OperatorId> {
        let expired: Vec<(OperatorId, Uuid)> = {
            let mut sessions = self.sessions();
            let stale: Vec<(OperatorId, Uuid)> = sessions
                .iter()
                .filter(|(_, entry)| {
                    entry.last_activity.elapsed() >= max_idle && entry.gate.try_lock().is_ok()
                })
                .map(|(identity, entry)| (*identity, entry.attempt))
                .collect();
            for (identity, _) in &stale {
                sessions.remove(identity);
            }
            if !stale.is_empty() {
                metrics::set_active_sessions(sessions.len());
            }
            stale
        };

        for (identity, attempt) in &expired {
            metrics::record_outcome("expired");
            info!(
                operator = %identity,
                %attempt,
                idle_secs = max_idle.as_secs(),
                "login expired"
            );
            self.reply(*identity, Reply::Expired);
        }
        expired.into_iter().map(|(identity, _)| identity).collect()
    }

    /// Number of logins in progress.
    pub fn active_sessions(&self) -> usize {
        self.sessions().len()
    }

    /// Current phase for `identity`, waiting for any in-flight message.
    pub async fn phase_of(&self, identity: OperatorId) -> Option<PhaseKind> {
        let gate = self.sessions().get(&identity)?.gate.clone();
        let session = gate.lock().await;
        self.is_current(identity, session.attempt)
            .then(|| session.phase.kind())
    }

    /// Last recorded error for `identity`'s session, if any.
    pub async fn last_error(&self, identity: OperatorId) -> Option<String> {
        let gate = self.sessions().get(&identity)?.gate.clone();
        let session = gate.lock().await;
        session.last_error.clone()
    }
}
