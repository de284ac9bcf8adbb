//! Service-specific error types

use thiserror::Error;

/// Chat transport errors.
///
/// Login failures never show up here: the coordinator turns them into
/// replies before they reach the transport.
#[derive(Error, Debug)]
pub enum Error {
    /// The request never produced a usable response. The request URL is
    /// stripped because it embeds the bot token.
    #[error("Telegram request failed: {0}")]
    Transport(String),

    #[error("Telegram rejected {method}: {description}")]
    Api {
        method: &'static str,
        description: String,
    },
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.without_url().to_string())
    }
}

/// Result alias using service Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = Error::Api {
            method: "sendMessage",
            description: "Bad Request: chat not found".into(),
        };
        assert_eq!(
            err.to_string(),
            "Telegram rejected sendMessage: Bad Request: chat not found"
        );
        assert!(
            Error::Transport("connection refused".into())
                .to_string()
                .contains("connection refused")
        );
    }

    #[tokio::test]
    async fn transport_errors_do_not_leak_the_token() {
        let client = reqwest::Client::new();
        let err = client
            .get("http://127.0.0.1:1/botSECRET-TOKEN/getMe")
            .send()
            .await
            .unwrap_err();

        let err = Error::from(err);
        assert!(!err.to_string().contains("SECRET-TOKEN"), "got: {err}");
    }
}
