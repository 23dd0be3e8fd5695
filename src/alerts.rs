//! Tracing layer that forwards this crate's WARN and ERROR events to a Telegram chat.

use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::ChatId;
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

const MAX_ALERT_CHARS: usize = 4000;
const WARN_FLUSH_INTERVAL: Duration = Duration::from_secs(10);
const WARN_BUFFER_LIMIT: usize = 20;

#[derive(Debug, PartialEq)]
enum Alert {
    /// Sent as soon as it arrives.
    Error(String),
    /// Collected and sent in batches.
    Warning(String),
}

pub struct AlertLayer {
    tx: mpsc::UnboundedSender<Alert>,
}

impl AlertLayer {
    /// Must be called inside a tokio runtime.
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Alert>();

        tokio::spawn(async move {
            let mut warnings: Vec<String> = Vec::new();
            let mut interval = tokio::time::interval(WARN_FLUSH_INTERVAL);

            loop {
                tokio::select! {
                    alert = rx.recv() => match alert {
                        Some(Alert::Error(text)) => deliver(&bot, chat_id, &text).await,
                        Some(Alert::Warning(text)) => {
                            warnings.push(text);
                            if warnings.len() >= WARN_BUFFER_LIMIT {
                                flush(&bot, chat_id, &mut warnings).await;
                            }
                        }
                        None => break,
                    },
                    _ = interval.tick() => flush(&bot, chat_id, &mut warnings).await,
                }
            }
        });

        Self { tx }
    }
}

async fn deliver(bot: &Bot, chat_id: ChatId, text: &str) {
    // Plain text: log lines are not HTML-safe.
    if let Err(e) = bot.send_message(chat_id, clip(text)).await {
        eprintln!("Failed to deliver alert: {e}");
    }
}

async fn flush(bot: &Bot, chat_id: ChatId, warnings: &mut Vec<String>) {
    if warnings.is_empty() {
        return;
    }
    let combined = warnings.join("\n");
    warnings.clear();
    deliver(bot, chat_id, &combined).await;
}

fn clip(text: &str) -> String {
    match text.char_indices().nth(MAX_ALERT_CHARS) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

/// Only events raised by this crate are forwarded; library chatter
/// (including errors from sending the alerts themselves) stays local.
fn alert_for(level: Level, target: &str, message: String) -> Option<Alert> {
    if !target.starts_with(env!("CARGO_CRATE_NAME")) {
        return None;
    }
    match level {
        Level::ERROR => Some(Alert::Error(format!("❌ {message}"))),
        Level::WARN => Some(Alert::Warning(format!("⚠️ {message}"))),
        _ => None,
    }
}

#[derive(Default)]
struct FieldCollector {
    message: String,
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value);
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.push(field, &format!("{value:?}"));
    }
}

impl FieldCollector {
    fn push(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            if self.message.is_empty() {
                self.message.push_str(value);
            } else {
                self.message.insert_str(0, &format!("{value}, "));
            }
        } else {
            if !self.message.is_empty() {
                self.message.push_str(", ");
            }
            self.message.push_str(&format!("{} = {value}", field.name()));
        }
    }
}

impl<S: Subscriber> Layer<S> for AlertLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if *metadata.level() > Level::WARN {
            return;
        }

        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        if let Some(alert) = alert_for(*metadata.level(), metadata.target(), fields.message) {
            if self.tx.send(alert).is_err() {
                eprintln!("Alert channel closed, message dropped");
            }
        }
    }
}
