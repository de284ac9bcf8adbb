//! JSON bodies exchanged with the login gateway

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct OpenClientRequest<'a> {
    pub api_id: i32,
    pub api_hash: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenClientResponse {
    pub client_id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct SendCodeRequest<'a> {
    pub phone_number: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SendCodeResponse {
    pub phone_code_hash: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct SignInRequest<'a> {
    pub phone_number: &'a str,
    pub phone_code_hash: &'a str,
    pub phone_code: &'a str,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub(crate) enum SignInStatus {
    Authorized,
    PasswordRequired,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SignInResponse {
    pub status: SignInStatus,
}

#[derive(Debug, Serialize)]
pub(crate) struct CheckPasswordRequest<'a> {
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExportSessionResponse {
    pub session_string: String,
}

/// Error envelope: `{"error": {"code": "...", "message": "..."}}`
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub code: String,
    #[serde(default)]
    pub message: String,
}
