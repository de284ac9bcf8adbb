//! Login flow metrics
//!
//! - `login_attempts_total` (counter)
//! - `login_outcomes_total` (counter): label `outcome`
//! - `remote_calls_total` (counter): labels `operation`, `result`
//! - `login_sessions_active` (gauge)
//!
//! Without an installed recorder these calls are no-ops.

/// Record a newly started login.
pub fn record_attempt_started() {
    metrics::counter!("login_attempts_total").increment(1);
}

/// Record how a login ended: succeeded, failed, cancelled, expired.
pub fn record_outcome(outcome: &'static str) {
    metrics::counter!("login_outcomes_total", "outcome" => outcome).increment(1);
}

/// Record one remote call and its result label (ok, or an error kind).
pub fn record_remote_call(operation: &'static str, result: &'static str) {
    metrics::counter!("remote_calls_total", "operation" => operation, "result" => result)
        .increment(1);
}

/// Publish the number of sessions currently held by the coordinator.
pub fn set_active_sessions(count: usize) {
    metrics::gauge!("login_sessions_active").set(count as f64);
}
