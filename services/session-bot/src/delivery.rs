//! Reply delivery
//!
//! Renders coordinator replies as Telegram HTML and sends them to the
//! operator's private chat (for private chats the chat id is the user id).

use login_flow::{Outbound, PhaseKind, Progress, Prompt, Reply};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, warn};

use crate::metrics;
use crate::telegram::TelegramClient;

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn field_name(phase: PhaseKind) -> &'static str {
    match phase {
        PhaseKind::AwaitingApiId => "<b>API_ID</b>",
        PhaseKind::AwaitingApiHash => "<b>API_HASH</b>",
        PhaseKind::AwaitingPhone => "<b>phone number</b>",
        PhaseKind::AwaitingCode => "<b>code</b>",
        PhaseKind::AwaitingPassword => "<b>password</b>",
    }
}

fn render_prompt(prompt: &Prompt) -> String {
    let body = match prompt.phase {
        PhaseKind::AwaitingApiId => {
            "Please send your <b>API_ID</b>.\n\nGet it from my.telegram.org."
        }
        PhaseKind::AwaitingApiHash => "API_ID saved. Now please send your <b>API_HASH</b>.",
        PhaseKind::AwaitingPhone => {
            "Please send your <b>phone number</b> in international format \
             (e.g., +919876543210)."
        }
        PhaseKind::AwaitingCode => {
            "A login code has been sent to your Telegram account. Please send it here."
        }
        PhaseKind::AwaitingPassword => {
            "Your account has Two-Step Verification (2FA) enabled. Please send your password."
        }
    };
    format!("<b>(Step {}/{})</b>\n{body}", prompt.step, prompt.total)
}

/// Render one reply as Telegram HTML.
pub fn render(reply: &Reply) -> String {
    match reply {
        Reply::Prompt(prompt) => render_prompt(prompt),
        Reply::Progress(Progress::Connecting) => {
            "⏳ Please wait, trying to connect to Telegram...".into()
        }
        Reply::Progress(Progress::VerifyingCode) => "⏳ Verifying code...".into(),
        Reply::Progress(Progress::VerifyingPassword) => "⏳ Verifying 2FA password...".into(),
        Reply::InvalidInput { reason, .. } => {
            format!("❌ {} Please try again.", escape_html(reason))
        }
        Reply::RetryField { phase, error } => format!(
            "❌ <b>Error:</b> {}\n\nPlease send your {} again, or /cancel to stop.",
            escape_html(error),
            field_name(*phase)
        ),
        Reply::Succeeded {
            credential,
            second_factor,
        } => format!(
            "✅ <b>{}Login Successful!</b>\n\n\
             Here is your session string. Copy it and save it securely.\n\n\
             <code>{}</code>",
            if *second_factor { "2FA " } else { "" },
            escape_html(credential.expose())
        ),
        Reply::Failed { error } => format!(
            "❌ <b>Error:</b> {}\n\nProcess cancelled. Please start again with /generate.",
            escape_html(error)
        ),
        Reply::AlreadyInProgress => "A process is already running. Send /cancel first.".into(),
        Reply::Cancelled => "✅ Process cancelled.".into(),
        Reply::NothingToCancel => "Nothing to cancel.".into(),
        Reply::Expired => {
            "⌛ Your login timed out after a period of inactivity. \
             Send /generate to start again."
                .into()
        }
        Reply::Discarded => {
            "The login was cancelled before the last step finished; its result was discarded."
                .into()
        }
    }
}

/// Send replies until every sender is gone. Failures are logged and the
/// reply is dropped.
pub async fn run(telegram: TelegramClient, mut replies: UnboundedReceiver<Outbound>) {
    while let Some(Outbound { to, reply }) = replies.recv().await {
        let label = reply.label();
        match telegram.send_message(to.0, &render(&reply)).await {
            Ok(()) => debug!(operator = %to, reply = label, "reply delivered"),
            Err(e) => {
                metrics::record_delivery_failure(label);
                if let Reply::Succeeded { credential, .. } = &reply {
                    error!(
                        operator = %to,
                        fingerprint = %credential.fingerprint(),
                        error = %e,
                        "failed to deliver session string"
                    );
                } else {
                    warn!(operator = %to, reply = label, error = %e, "failed to deliver reply");
                }
            }
        }
    }
    debug!("reply channel closed, delivery stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::mock;
    use auth_backend::Credential;
    use login_flow::OperatorId;

    #[test]
    fn escape_covers_html_metacharacters() {
        assert_eq!(escape_html("a<b>&\"c\""), "a&lt;b&gt;&amp;&quot;c&quot;");
        assert_eq!(escape_html("plain +15551234567"), "plain +15551234567");
    }

    #[test]
    fn prompts_show_step_numbers() {
        let text = render(&Reply::Prompt(Prompt::for_phase(PhaseKind::AwaitingApiId, true)));
        assert!(text.starts_with("<b>(Step 1/5)</b>"));
        assert!(text.contains("API_ID"));

        let text = render(&Reply::Prompt(Prompt::for_phase(PhaseKind::AwaitingPhone, false)));
        assert!(text.starts_with("<b>(Step 1/3)</b>"));
        assert!(text.contains("phone number"));
    }

    #[test]
    fn credential_is_wrapped_in_code_and_escaped() {
        let text = render(&Reply::Succeeded {
            credential: Credential::new("AbC<1>&2"),
            second_factor: true,
        });
        assert!(text.contains("2FA Login Successful!"));
        assert!(text.contains("<code>AbC&lt;1&gt;&amp;2</code>"));

        let text = render(&Reply::Succeeded {
            credential: Credential::new("XYZ123"),
            second_factor: false,
        });
        assert!(text.contains("<b>Login Successful!</b>"));
        assert!(text.contains("<code>XYZ123</code>"));
    }

    #[test]
    fn remote_errors_are_escaped() {
        let text = render(&Reply::Failed {
            error: "service rejected request: <PHONE_NUMBER_INVALID>".into(),
        });
        assert!(text.contains("&lt;PHONE_NUMBER_INVALID&gt;"));
        assert!(text.contains("/generate"));

        let text = render(&Reply::RetryField {
            phase: PhaseKind::AwaitingCode,
            error: "PHONE_CODE_INVALID".into(),
        });
        assert!(text.contains("<b>code</b> again"));
    }

    #[test]
    fn invalid_input_keeps_reason() {
        let text = render(&Reply::InvalidInput {
            phase: PhaseKind::AwaitingApiId,
            reason: "API_ID must be a number.".into(),
        });
        assert_eq!(text, "❌ API_ID must be a number. Please try again.");
    }

    #[tokio::test]
    async fn run_sends_each_reply_to_operator_chat() {
        let (telegram, mock) = mock::start().await;
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tx.send(Outbound {
            to: OperatorId(1001),
            reply: Reply::Cancelled,
        })
        .unwrap();
        tx.send(Outbound {
            to: OperatorId(2002),
            reply: Reply::NothingToCancel,
        })
        .unwrap();
        drop(tx);

        run(telegram, rx).await;

        let sent = mock.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0]["chat_id"], 1001);
        assert_eq!(sent[0]["text"], "✅ Process cancelled.");
        assert_eq!(sent[1]["chat_id"], 2002);
    }

    #[tokio::test]
    async fn run_survives_send_failures() {
        let (telegram, mock) = mock::start().await;
        *mock.send_error.lock().unwrap() = Some("Forbidden: bot was blocked by the user".into());
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tx.send(Outbound {
            to: OperatorId(1001),
            reply: Reply::Expired,
        })
        .unwrap();
        drop(tx);

        // Returns once the channel is drained instead of bailing on the error
        run(telegram, rx).await;
        assert!(mock.sent().is_empty());
    }
}
