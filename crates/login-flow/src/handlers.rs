//! Phase handlers
//!
//! One function per phase. Each takes the phase data plus one line of
//! operator input and returns a [`Transition`]; none of them keep state
//! between calls. Remote phases open an [`EphemeralClient`] for the duration
//! of the call and release it on every path.
//!
//! | Phase | Input | Remote call | Next |
//! |---|---|---|---|
//! | AwaitingApiId | positive integer | – | AwaitingApiHash |
//! | AwaitingApiHash | non-empty | – | AwaitingPhone |
//! | AwaitingPhone | non-empty | send code | AwaitingCode |
//! | AwaitingCode | non-empty | sign in (+ export) | succeeded / AwaitingPassword |
//! | AwaitingPassword | non-empty | check password (+ export) | succeeded |

use auth_backend::{ApiCredentials, AuthBackend, ContinuationToken, Credential, RemoteAuthError};

use crate::client::{CodeOutcome, EphemeralClient};
use crate::error::StepError;
use crate::reply::Progress;
use crate::session::Phase;

/// What a handler decided.
#[derive(Debug)]
pub enum Transition {
    /// Move on to `next`.
    Advance(Phase),
    /// Input failed local validation; the phase is unchanged.
    Invalid(String),
    /// The account is logged in.
    Succeeded {
        credential: Credential,
        second_factor: bool,
    },
    /// A remote call failed (anything except the second-factor signal).
    RemoteFailed(RemoteAuthError),
}

impl From<Result<Transition, StepError>> for Transition {
    fn from(result: Result<Transition, StepError>) -> Self {
        match result {
            Ok(transition) => transition,
            Err(StepError::InvalidInput(reason)) => Transition::Invalid(reason),
            Err(StepError::Remote(error)) => Transition::RemoteFailed(error),
        }
    }
}

/// Callback for progress notices sent before remote calls.
pub type ProgressSink<'a> = &'a (dyn Fn(Progress) + Send + Sync);

/// Run the handler for `phase` with one line of operator input.
pub async fn handle(
    phase: Phase,
    input: &str,
    backend: &dyn AuthBackend,
    notify: ProgressSink<'_>,
) -> Transition {
    let result = match phase {
        Phase::AwaitingApiId => on_api_id(input),
        Phase::AwaitingApiHash { api_id } => on_api_hash(api_id, input),
        Phase::AwaitingPhone { credentials } => {
            on_phone(credentials, input, backend, notify).await
        }
        Phase::AwaitingCode {
            credentials,
            phone,
            token,
        } => on_code(credentials, phone, token, input, backend, notify).await,
        Phase::AwaitingPassword { credentials, .. } => {
            on_password(credentials, input, backend, notify).await
        }
    };
    result.into()
}

fn on_api_id(input: &str) -> Result<Transition, StepError> {
    let api_id = parse_api_id(input)?;
    Ok(Transition::Advance(Phase::AwaitingApiHash { api_id }))
}

fn on_api_hash(api_id: i32, input: &str) -> Result<Transition, StepError> {
    let api_hash = input.trim();
    if api_hash.is_empty() {
        return Err(StepError::InvalidInput("API_HASH must not be empty.".into()));
    }
    Ok(Transition::Advance(Phase::AwaitingPhone {
        credentials: ApiCredentials::new(api_id, api_hash),
    }))
}

async fn on_phone(
    credentials: ApiCredentials,
    input: &str,
    backend: &dyn AuthBackend,
    notify: ProgressSink<'_>,
) -> Result<Transition, StepError> {
    let phone = input.trim();
    if phone.is_empty() {
        return Err(StepError::InvalidInput(
            "Phone number must not be empty.".into(),
        ));
    }

    notify(Progress::Connecting);
    let client = EphemeralClient::acquire(backend, &credentials).await?;
    let result = client.request_code(phone).await;
    client.release().await;
    let token = result?;

    Ok(Transition::Advance(Phase::AwaitingCode {
        credentials,
        phone: phone.to_string(),
        token,
    }))
}

async fn on_code(
    credentials: ApiCredentials,
    phone: String,
    token: ContinuationToken,
    input: &str,
    backend: &dyn AuthBackend,
    notify: ProgressSink<'_>,
) -> Result<Transition, StepError> {
    let code = normalize_code(input);
    if code.is_empty() {
        return Err(StepError::InvalidInput("The code must not be empty.".into()));
    }

    notify(Progress::VerifyingCode);
    let client = EphemeralClient::acquire(backend, &credentials).await?;
    let result = client.verify_code(&phone, &token, &code).await;
    client.release().await;

    Ok(match result? {
        CodeOutcome::Authorized(credential) => Transition::Succeeded {
            credential,
            second_factor: false,
        },
        CodeOutcome::SecondFactorRequired => {
            Transition::Advance(Phase::AwaitingPassword { credentials, phone })
        }
    })
}

async fn on_password(
    credentials: ApiCredentials,
    input: &str,
    backend: &dyn AuthBackend,
    notify: ProgressSink<'_>,
) -> Result<Transition, StepError> {
    // Passwords are passed through untrimmed
    if input.is_empty() {
        return Err(StepError::InvalidInput("The password must not be empty.".into()));
    }

    notify(Progress::VerifyingPassword);
    let client = EphemeralClient::acquire(backend, &credentials).await?;
    let result = client.verify_password(input).await;
    client.release().await;

    Ok(Transition::Succeeded {
        credential: result?,
        second_factor: true,
    })
}

fn parse_api_id(input: &str) -> Result<i32, StepError> {
    match input.trim().parse::<i32>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(StepError::InvalidInput("API_ID must be a number.".into())),
    }
}

/// Codes are often typed with separators ("12 345", "12-345") so they are
/// not recognized as codes by the chat client.
fn normalize_code(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}
