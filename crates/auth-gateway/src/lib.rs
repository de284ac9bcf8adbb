//! HTTP login gateway backend
//!
//! Implements [`auth_backend::AuthBackend`] against a login gateway that
//! fronts the remote account service with a small JSON API. Each login step
//! opens a gateway client (`POST /v1/clients`), performs its calls against
//! `/v1/clients/{id}/...`, and deletes the client when it is released.
//!
//! Login step flow:
//! 1. `send-code` with the phone number returns a `phone_code_hash`
//! 2. `sign-in` with phone, hash and code returns `authorized` or `password_required`
//! 3. `check-password` for accounts with a second factor
//! 4. `export-session` returns the reusable session string

pub mod client;
pub mod constants;
mod wire;

pub use client::{GatewayBackend, GatewayClient};
pub use constants::DEFAULT_TIMEOUT_SECS;
