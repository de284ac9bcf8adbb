//! Update routing
//!
//! Turns Telegram updates into coordinator calls. Only configured operators
//! are served; everyone else is ignored without a reply.
//!
//! `/generate` and `/cancel` act immediately, so a cancel lands even while a
//! remote call for the same operator is in flight. Plain text goes through a
//! per-operator queue: one operator's messages are dispatched in the order
//! they arrived, while other operators are never held up behind them.
//!
//! Queued text is tagged with the login attempt that was running when it
//! arrived. Text sent before `/generate` is dropped on arrival, and text
//! still queued when its login is cancelled never reaches the next one.

use std::collections::HashMap;
use std::sync::Arc;

use login_flow::{Coordinator, OperatorId};
use tokio::sync::mpsc;
use uuid::Uuid;
use tracing::{Instrument, debug, info_span, warn};

use crate::metrics;
use crate::telegram::{TelegramClient, Update};

pub const HELP_TEXT: &str = "👋 <b>Session String Generator</b>\n\n\
    This bot will help you generate a session string for your user account.\n\n\
    ➡️ Send /generate to begin.\n\
    ➡️ Send /cancel at any time to stop.";

/// A parsed message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Start,
    Generate,
    Cancel,
    Unknown(&'a str),
    Text(&'a str),
}

impl<'a> Command<'a> {
    /// Parse a message. Commands may carry a `@botname` suffix and trailing
    /// arguments, both of which are ignored.
    pub fn parse(text: &'a str) -> Self {
        let Some(rest) = text.strip_prefix('/') else {
            return Command::Text(text);
        };
        let word = rest.split_whitespace().next().unwrap_or_default();
        let name = word.split_once('@').map_or(word, |(name, _)| name);
        match name {
            "start" => Command::Start,
            "generate" => Command::Generate,
            "cancel" => Command::Cancel,
            _ => Command::Unknown(name),
        }
    }
}

/// What to do with one update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Help { chat: i64 },
    Begin(OperatorId),
    Cancel(OperatorId),
    Dispatch(OperatorId, String),
    Ignore(&'static str),
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Action::Help { .. } => "help",
            Action::Begin(_) => "begin",
            Action::Cancel(_) => "cancel",
            Action::Dispatch(..) => "dispatch",
            Action::Ignore(reason) => *reason,
        }
    }
}

/// Decide what an update means for an operator set.
pub fn classify(update: &Update, is_operator: impl Fn(i64) -> bool) -> Action {
    let Some(message) = &update.message else {
        return Action::Ignore("no_message");
    };
    let Some(from) = &message.from else {
        return Action::Ignore("anonymous");
    };
    if !is_operator(from.id) {
        return Action::Ignore("unauthorized");
    }
    let Some(text) = message.text.as_deref() else {
        return Action::Ignore("no_text");
    };

    let operator = OperatorId(from.id);
    match Command::parse(text) {
        Command::Start => Action::Help {
            chat: message.chat.id,
        },
        Command::Generate => Action::Begin(operator),
        Command::Cancel => Action::Cancel(operator),
        Command::Unknown(name) => {
            debug!(command = name, "ignoring unknown command");
            Action::Ignore("unknown_command")
        }
        Command::Text(_) if !message.chat.is_private() => Action::Ignore("not_private"),
        Command::Text(text) => Action::Dispatch(operator, text.to_string()),
    }
}

pub struct Router {
    coordinator: Arc<Coordinator>,
    telegram: TelegramClient,
    queues: HashMap<OperatorId, mpsc::UnboundedSender<(Uuid, String)>>,
}

impl Router {
    /// Build the router and spawn one dispatch queue per operator.
    pub fn new(
        coordinator: Arc<Coordinator>,
        telegram: TelegramClient,
        operators: &[i64],
    ) -> Self {
        let queues = operators
            .iter()
            .map(|&id| {
                let operator = OperatorId(id);
                let (tx, rx) = mpsc::unbounded_channel();
                tokio::spawn(run_queue(coordinator.clone(), operator, rx));
                (operator, tx)
            })
            .collect();
        Self {
            coordinator,
            telegram,
            queues,
        }
    }

    pub async fn handle(&self, update: Update) {
        let span = info_span!(
            "update",
            update_id = update.update_id,
            trace_id = %format!("upd_{}", uuid::Uuid::new_v4().as_simple()),
        );
        async {
            let action = classify(&update, |id| self.queues.contains_key(&OperatorId(id)));
            metrics::record_update(action.label());
            debug!(
                action = action.label(),
                message_id = update.message.as_ref().map(|m| m.message_id),
                "routing update"
            );

            match action {
                Action::Help { chat } => {
                    if let Err(e) = self.telegram.send_message(chat, HELP_TEXT).await {
                        warn!(error = %e, "failed to send help text");
                    }
                }
                // Failures were already answered through the reply channel
                Action::Begin(operator) => {
                    let _ = self.coordinator.begin(operator);
                }
                Action::Cancel(operator) => {
                    let _ = self.coordinator.cancel(operator);
                }
                Action::Dispatch(operator, text) => {
                    let Some(attempt) = self.coordinator.current_attempt(operator) else {
                        debug!(operator = %operator, "no login in progress, ignoring message");
                        return;
                    };
                    match self.queues.get(&operator) {
                        Some(queue) if queue.send((attempt, text)).is_ok() => {}
                        _ => warn!(operator = %operator, "dispatch queue closed, dropping message"),
                    }
                }
                Action::Ignore(_) => {}
            }
        }
        .instrument(span)
        .await
    }
}

async fn run_queue(
    coordinator: Arc<Coordinator>,
    operator: OperatorId,
    mut rx: mpsc::UnboundedReceiver<(Uuid, String)>,
) {
    while let Some((attempt, text)) = rx.recv().await {
        coordinator.dispatch_to(operator, attempt, &text).await;
    }
    debug!(operator = %operator, "dispatch queue closed");
}
