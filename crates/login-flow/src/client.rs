//! Scoped remote client for a single login step
//!
//! `acquire` opens a client, `release` closes it. If the guard is dropped
//! without `release` (an early return, a cancelled future, a panic), the
//! disconnect is spawned onto the current runtime instead, so every
//! acquisition is closed exactly once.

use auth_backend::{
    ApiCredentials, AuthBackend, AuthClient, ContinuationToken, Credential, RemoteAuthError,
    Result, SignInOutcome,
};
use tracing::{debug, warn};

use crate::metrics;

/// Result of submitting the one-time code.
#[derive(Debug, Clone, PartialEq)]
pub enum CodeOutcome {
    Authorized(Credential),
    /// Not an error: the account needs its password next.
    SecondFactorRequired,
}

/// Guard around a connected [`AuthClient`].
pub struct EphemeralClient {
    inner: Option<Box<dyn AuthClient>>,
}

impl EphemeralClient {
    pub async fn acquire(
        backend: &dyn AuthBackend,
        credentials: &ApiCredentials,
    ) -> Result<Self> {
        let result = backend.connect(credentials).await;
        metrics::record_remote_call("connect", result_label(&result));
        let inner = result?;
        debug!(backend = backend.id(), "ephemeral client acquired");
        Ok(Self { inner: Some(inner) })
    }

    fn client(&self) -> Result<&dyn AuthClient> {
        self.inner
            .as_deref()
            .ok_or_else(|| RemoteAuthError::Connect("client already released".into()))
    }

    /// Ask for a one-time code to be delivered to `phone`.
    pub async fn request_code(&self, phone: &str) -> Result<ContinuationToken> {
        let result = self.client()?.send_code(phone).await;
        metrics::record_remote_call("send_code", result_label(&result));
        result
    }

    /// Submit the code; on success the session is exported in a second call.
    pub async fn verify_code(
        &self,
        phone: &str,
        token: &ContinuationToken,
        code: &str,
    ) -> Result<CodeOutcome> {
        let result = self.client()?.sign_in(phone, token, code).await;
        metrics::record_remote_call("sign_in", result_label(&result));
        match result? {
            SignInOutcome::Authorized => Ok(CodeOutcome::Authorized(self.export().await?)),
            SignInOutcome::PasswordRequired => Ok(CodeOutcome::SecondFactorRequired),
        }
    }

    /// Check the second-factor password, then export the session.
    pub async fn verify_password(&self, password: &str) -> Result<Credential> {
        let result = self.client()?.check_password(password).await;
        metrics::record_remote_call("check_password", result_label(&result));
        result?;
        self.export().await
    }

    async fn export(&self) -> Result<Credential> {
        let result = self.client()?.export_session().await;
        metrics::record_remote_call("export_session", result_label(&result));
        result
    }

    /// Close the client and wait for the disconnect to finish.
    pub async fn release(mut self) {
        if let Some(client) = self.inner.take() {
            client.disconnect().await;
            debug!("ephemeral client released");
        }
    }
}

impl Drop for EphemeralClient {
    fn drop(&mut self) {
        let Some(client) = self.inner.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("ephemeral client dropped without release, disconnecting in background");
                handle.spawn(client.disconnect());
            }
            Err(_) => {
                warn!("ephemeral client dropped outside a runtime, connection left open");
            }
        }
    }
}

fn result_label<T>(result: &Result<T>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    }
}
