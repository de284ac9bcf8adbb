//! Configuration and startup error types

use thiserror::Error;

/// Errors raised while assembling process configuration.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {message}")]
    InvalidEnv { var: &'static str, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result alias using common Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_includes_context() {
        let config_err = Error::Config("operators must not be empty".into());
        assert_eq!(
            config_err.to_string(),
            "Configuration error: operators must not be empty"
        );

        let missing = Error::Missing("BOT_TOKEN");
        assert_eq!(missing.to_string(), "Missing required setting: BOT_TOKEN");

        let invalid = Error::InvalidEnv {
            var: "ADMIN_ID",
            message: "not a number".into(),
        };
        assert_eq!(
            invalid.to_string(),
            "Invalid value for ADMIN_ID: not a number"
        );
    }

    #[test]
    fn io_error_converts() {
        let err: Error =
            std::io::Error::new(std::io::ErrorKind::NotFound, "config.toml").into();
        assert!(err.to_string().starts_with("I/O error:"), "got: {err}");
    }
}
