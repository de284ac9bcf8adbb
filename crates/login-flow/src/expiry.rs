//! Idle login expiry
//!
//! A periodic sweep that drops logins the operator walked away from, so an
//! abandoned session does not block a new `begin` forever.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::coordinator::Coordinator;

/// Spawn a task that expires sessions idle longer than the coordinator's
/// configured timeout, checking every `interval`.
pub fn spawn_expiry_task(
    coordinator: Arc<Coordinator>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let max_idle = coordinator.settings().idle_timeout;
        let mut ticker = tokio::time::interval(interval);
        // First tick fires immediately; nothing can be idle yet
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let expired = coordinator.expire_idle(max_idle);
            if !expired.is_empty() {
                debug!(count = expired.len(), "idle sweep expired logins");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;
    use crate::reply::Reply;
    use crate::session::OperatorId;
    use crate::settings::LoginSettings;

    #[tokio::test(start_paused = true)]
    async fn sweep_expires_abandoned_login() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let settings = LoginSettings {
            idle_timeout: Duration::from_secs(600),
            ..LoginSettings::default()
        };
        let coordinator = Arc::new(Coordinator::new(
            Arc::new(MockBackend::new()),
            settings,
            tx,
        ));
        let task = spawn_expiry_task(coordinator.clone(), Duration::from_secs(60));

        coordinator.begin(OperatorId(7)).unwrap();
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(coordinator.active_sessions(), 1);

        tokio::time::sleep(Duration::from_secs(400)).await;
        assert_eq!(coordinator.active_sessions(), 0);

        let mut replies = Vec::new();
        while let Ok(out) = rx.try_recv() {
            replies.push(out.reply);
        }
        assert_eq!(replies.last(), Some(&Reply::Expired));

        task.abort();
    }
}
