//! Contract for the remote authentication service
//!
//! The login flow never talks to the network itself. It asks an
//! [`AuthBackend`] for a short-lived [`AuthClient`] bound to one credential
//! pair, performs one or two calls on it, and disconnects it. Concrete
//! backends (an HTTP gateway, a test double) implement these traits.
//!
//! Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
//! (`Arc<dyn AuthBackend>`, `Box<dyn AuthClient>`).

pub mod error;
pub mod types;

pub use error::{RemoteAuthError, Result};
pub use types::{ApiCredentials, ContinuationToken, Credential, SignInOutcome};

use std::future::Future;
use std::pin::Pin;

/// Boxed, sendable future used by the backend traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Factory for per-attempt clients.
pub trait AuthBackend: Send + Sync {
    /// Identifier for logging (e.g. "gateway").
    fn id(&self) -> &str;

    /// Open a fresh connection scoped to a single login step.
    ///
    /// The returned client must not be shared between operators or reused
    /// after `disconnect`.
    fn connect<'a>(
        &'a self,
        credentials: &'a ApiCredentials,
    ) -> BoxFuture<'a, Result<Box<dyn AuthClient>>>;
}

/// A connected client able to perform the login operations.
///
/// Every call is attempted exactly once; implementations do not retry.
pub trait AuthClient: Send + Sync {
    /// Ask the service to deliver a one-time code to `phone`.
    fn send_code<'a>(&'a self, phone: &'a str) -> BoxFuture<'a, Result<ContinuationToken>>;

    /// Submit the one-time code for `phone`.
    fn sign_in<'a>(
        &'a self,
        phone: &'a str,
        token: &'a ContinuationToken,
        code: &'a str,
    ) -> BoxFuture<'a, Result<SignInOutcome>>;

    /// Submit the second-factor password.
    fn check_password<'a>(&'a self, password: &'a str) -> BoxFuture<'a, Result<()>>;

    /// Export the authorized session as a reusable credential.
    fn export_session(&self) -> BoxFuture<'_, Result<Credential>>;

    /// Tear down the connection. Consumes the client so it cannot be used
    /// again; the returned future owns everything it needs and may be
    /// spawned.
    fn disconnect(self: Box<Self>) -> BoxFuture<'static, ()>;
}
