//! Scriptable in-memory auth backend for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use auth_backend::{
    ApiCredentials, AuthBackend, AuthClient, BoxFuture, ContinuationToken, Credential,
    RemoteAuthError, Result, SignInOutcome,
};
use tokio::sync::Notify;

/// Remote calls observed by the mock, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    SendCode(String),
    SignIn {
        phone: String,
        token: String,
        code: String,
    },
    CheckPassword(String),
    ExportSession,
}

/// Canned results for each operation.
#[derive(Clone)]
pub(crate) struct Script {
    pub connect: Result<()>,
    pub send_code: Result<ContinuationToken>,
    pub sign_in: Result<SignInOutcome>,
    pub check_password: Result<()>,
    pub export_session: Result<Credential>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            connect: Ok(()),
            send_code: Ok(ContinuationToken::new("code-hash-1")),
            sign_in: Ok(SignInOutcome::Authorized),
            check_password: Ok(()),
            export_session: Ok(Credential::new("SESSION-STRING")),
        }
    }
}

#[derive(Default)]
pub(crate) struct Stats {
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    calls: Mutex<Vec<Call>>,
    credentials: Mutex<Vec<ApiCredentials>>,
}

impl Stats {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn credentials(&self) -> Vec<ApiCredentials> {
        self.credentials.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

/// Blocks `send_code` until released, so tests can act while a remote call
/// is in flight.
#[derive(Clone, Default)]
pub(crate) struct Hold {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

#[derive(Default)]
pub(crate) struct MockBackend {
    script: Mutex<Script>,
    stats: Arc<Stats>,
    hold: Mutex<Option<Hold>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, edit: impl FnOnce(&mut Script)) {
        edit(&mut self.script.lock().unwrap());
    }

    pub fn hold_send_code(&self) -> Hold {
        let hold = Hold::default();
        *self.hold.lock().unwrap() = Some(hold.clone());
        hold
    }

    pub fn stats(&self) -> Arc<Stats> {
        self.stats.clone()
    }
}

impl AuthBackend for MockBackend {
    fn id(&self) -> &str {
        "mock"
    }

    fn connect<'a>(
        &'a self,
        credentials: &'a ApiCredentials,
    ) -> BoxFuture<'a, Result<Box<dyn AuthClient>>> {
        Box::pin(async move {
            let script = self.script.lock().unwrap().clone();
            script.connect.clone()?;
            self.stats.connects.fetch_add(1, Ordering::SeqCst);
            self.stats
                .credentials
                .lock()
                .unwrap()
                .push(credentials.clone());
            Ok(Box::new(MockClient {
                script,
                stats: self.stats.clone(),
                hold: self.hold.lock().unwrap().clone(),
            }) as Box<dyn AuthClient>)
        })
    }
}

struct MockClient {
    script: Script,
    stats: Arc<Stats>,
    hold: Option<Hold>,
}

impl AuthClient for MockClient {
    fn send_code<'a>(&'a self, phone: &'a str) -> BoxFuture<'a, Result<ContinuationToken>> {
        Box::pin(async move {
            self.stats.record(Call::SendCode(phone.to_string()));
            if let Some(hold) = &self.hold {
                hold.entered.notify_one();
                hold.release.notified().await;
            }
            self.script.send_code.clone()
        })
    }

    fn sign_in<'a>(
        &'a self,
        phone: &'a str,
        token: &'a ContinuationToken,
        code: &'a str,
    ) -> BoxFuture<'a, Result<SignInOutcome>> {
        Box::pin(async move {
            self.stats.record(Call::SignIn {
                phone: phone.to_string(),
                token: token.as_str().to_string(),
                code: code.to_string(),
            });
            self.script.sign_in.clone()
        })
    }

    fn check_password<'a>(&'a self, password: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.stats.record(Call::CheckPassword(password.to_string()));
            self.script.check_password.clone()
        })
    }

    fn export_session(&self) -> BoxFuture<'_, Result<Credential>> {
        Box::pin(async move {
            self.stats.record(Call::ExportSession);
            self.script.export_session.clone()
        })
    }

    fn disconnect(self: Box<Self>) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            self.stats.disconnects.fetch_add(1, Ordering::SeqCst);
        })
    }
}

/// Shorthand for a service rejection.
pub(crate) fn rejected(code: &str) -> RemoteAuthError {
    RemoteAuthError::Rejected {
        code: code.to_string(),
        message: String::new(),
    }
}
