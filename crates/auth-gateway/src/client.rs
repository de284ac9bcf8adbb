//! Gateway-backed implementation of the auth backend traits
//!
//! Transport failures while opening a client are reported as
//! `RemoteAuthError::Connect`; after that they are `Transport`. Non-2xx
//! responses carrying the gateway's error envelope become `Rejected` with the
//! service's error code, anything else unexpected is `Protocol`.

use std::time::Duration;

use auth_backend::{
    ApiCredentials, AuthBackend, AuthClient, BoxFuture, ContinuationToken, Credential,
    RemoteAuthError, Result, SignInOutcome,
};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::constants::{
    CHECK_PASSWORD_PATH, CLIENTS_PATH, EXPORT_SESSION_PATH, PASSWORD_NEEDED_CODE, SEND_CODE_PATH,
    SIGN_IN_PATH,
};
use crate::wire::{
    CheckPasswordRequest, ErrorEnvelope, ExportSessionResponse, OpenClientRequest,
    OpenClientResponse, SendCodeRequest, SendCodeResponse, SignInRequest, SignInResponse,
    SignInStatus,
};

/// Opens gateway clients for login steps.
///
/// Cheap to clone; the underlying `reqwest::Client` pools connections to the
/// gateway across clients.
#[derive(Debug, Clone)]
pub struct GatewayBackend {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl GatewayBackend {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl AuthBackend for GatewayBackend {
    fn id(&self) -> &str {
        "gateway"
    }

    fn connect<'a>(
        &'a self,
        credentials: &'a ApiCredentials,
    ) -> BoxFuture<'a, Result<Box<dyn AuthClient>>> {
        Box::pin(async move {
            let url = format!("{}{}", self.base_url, CLIENTS_PATH);
            let request = self.http.post(&url).timeout(self.timeout).json(&OpenClientRequest {
                api_id: credentials.api_id,
                api_hash: credentials.api_hash.expose(),
            });

            let opened: OpenClientResponse = send_json(request).await.map_err(|e| match e {
                RemoteAuthError::Transport(msg) => RemoteAuthError::Connect(msg),
                other => other,
            })?;

            debug!(client_id = %opened.client_id, "gateway client opened");

            Ok(Box::new(GatewayClient {
                http: self.http.clone(),
                base_url: self.base_url.clone(),
                client_id: opened.client_id,
                timeout: self.timeout,
            }) as Box<dyn AuthClient>)
        })
    }
}

/// One open gateway client. Dropped clients are not deleted on the gateway;
/// callers must go through [`AuthClient::disconnect`].
#[derive(Debug)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    timeout: Duration,
}

impl GatewayClient {
    fn resource_url(&self) -> String {
        format!("{}{}/{}", self.base_url, CLIENTS_PATH, self.client_id)
    }

    fn operation_url(&self, operation: &str) -> String {
        format!("{}/{}", self.resource_url(), operation)
    }
}

impl AuthClient for GatewayClient {
    fn send_code<'a>(&'a self, phone: &'a str) -> BoxFuture<'a, Result<ContinuationToken>> {
        Box::pin(async move {
            let request = self
                .http
                .post(self.operation_url(SEND_CODE_PATH))
                .timeout(self.timeout)
                .json(&SendCodeRequest {
                    phone_number: phone,
                });
            let sent: SendCodeResponse = send_json(request).await?;
            Ok(ContinuationToken::new(sent.phone_code_hash))
        })
    }

    fn sign_in<'a>(
        &'a self,
        phone: &'a str,
        token: &'a ContinuationToken,
        code: &'a str,
    ) -> BoxFuture<'a, Result<SignInOutcome>> {
        Box::pin(async move {
            let request = self
                .http
                .post(self.operation_url(SIGN_IN_PATH))
                .timeout(self.timeout)
                .json(&SignInRequest {
                    phone_number: phone,
                    phone_code_hash: token.as_str(),
                    phone_code: code,
                });

            // The gateway may relay the account's 2FA requirement either as a
            // status or as the upstream error code.
            match send_json::<SignInResponse>(request).await {
                Ok(SignInResponse {
                    status: SignInStatus::Authorized,
                }) => Ok(SignInOutcome::Authorized),
                Ok(SignInResponse {
                    status: SignInStatus::PasswordRequired,
                }) => Ok(SignInOutcome::PasswordRequired),
                Err(RemoteAuthError::Rejected { code, .. }) if code == PASSWORD_NEEDED_CODE => {
                    Ok(SignInOutcome::PasswordRequired)
                }
                Err(e) => Err(e),
            }
        })
    }

    fn check_password<'a>(&'a self, password: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let request = self
                .http
                .post(self.operation_url(CHECK_PASSWORD_PATH))
                .timeout(self.timeout)
                .json(&CheckPasswordRequest { password });
            send_json::<serde_json::Value>(request).await.map(|_| ())
        })
    }

    fn export_session(&self) -> BoxFuture<'_, Result<Credential>> {
        Box::pin(async move {
            let request = self
                .http
                .post(self.operation_url(EXPORT_SESSION_PATH))
                .timeout(self.timeout);
            let exported: ExportSessionResponse = send_json(request).await?;
            if exported.session_string.is_empty() {
                return Err(RemoteAuthError::Protocol(
                    "gateway exported an empty session string".into(),
                ));
            }
            Ok(Credential::new(exported.session_string))
        })
    }

    fn disconnect(self: Box<Self>) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            let url = self.resource_url();
            match self.http.delete(&url).timeout(self.timeout).send().await {
                Ok(response)
                    if response.status().is_success()
                        || response.status() == reqwest::StatusCode::NOT_FOUND =>
                {
                    debug!(client_id = %self.client_id, "gateway client closed");
                }
                Ok(response) => {
                    warn!(
                        client_id = %self.client_id,
                        status = %response.status(),
                        "gateway refused to close client"
                    );
                }
                Err(e) => {
                    warn!(client_id = %self.client_id, error = %e, "failed to close gateway client");
                }
            }
        })
    }
}

/// Send a request and decode a JSON success body, mapping failures onto
/// `RemoteAuthError`.
async fn send_json<R: DeserializeOwned>(request: reqwest::RequestBuilder) -> Result<R> {
    let response = request
        .send()
        .await
        .map_err(|e| RemoteAuthError::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(envelope) => RemoteAuthError::Rejected {
                code: envelope.error.code,
                message: envelope.error.message,
            },
            Err(_) => RemoteAuthError::Protocol(format!("gateway returned {status}: {body}")),
        });
    }

    response
        .json::<R>()
        .await
        .map_err(|e| RemoteAuthError::Protocol(format!("invalid response body: {e}")))
}
