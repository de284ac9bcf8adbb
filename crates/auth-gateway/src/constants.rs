//! Login gateway endpoint paths and defaults
//!
//! Paths are relative to the configured gateway base URL. `{id}` is the
//! gateway-assigned client id returned by `CLIENTS_PATH`.

/// Open a client bound to an API id/hash pair (POST)
pub const CLIENTS_PATH: &str = "/v1/clients";

/// Request a one-time code (POST, relative to the client resource)
pub const SEND_CODE_PATH: &str = "send-code";

/// Submit the one-time code (POST)
pub const SIGN_IN_PATH: &str = "sign-in";

/// Submit the second-factor password (POST)
pub const CHECK_PASSWORD_PATH: &str = "check-password";

/// Export the authorized session string (POST)
pub const EXPORT_SESSION_PATH: &str = "export-session";

/// Error code the gateway relays when the account needs its 2FA password.
pub const PASSWORD_NEEDED_CODE: &str = "SESSION_PASSWORD_NEEDED";

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
