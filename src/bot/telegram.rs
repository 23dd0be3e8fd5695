//! Telegram side of the bot: turns updates into calls on [`App`] and
//! delivers the resulting replies.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{InputFile, MessageId, ParseMode, ReplyParameters};
use tracing::{error, info, warn};

use super::handlers::{App, Outcome, Reply, confirm_choice};
use crate::store::User;

/// Thin wrapper over the Bot API for sending replies.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    /// Send one reply, as a document when it carries one.
    pub async fn send_reply(&self, chat_id: ChatId, reply: &Reply, reply_to: MessageId) -> Result<MessageId, String> {
        let reply_params = reply.quote.then(|| ReplyParameters::new(reply_to));

        if let Some(document) = &reply.document {
            info!("📎 Sending {} to chat {} ({} bytes)", document.file_name, chat_id, document.contents.len());
            let input_file = InputFile::memory(document.contents.clone().into_bytes()).file_name(document.file_name.clone());
            let mut request = self
                .bot
                .send_document(chat_id, input_file)
                .caption(reply.text.clone())
                .parse_mode(ParseMode::Html);
            if let Some(params) = reply_params {
                request = request.reply_parameters(params);
            }
            if let Some(keyboard) = reply.keyboard {
                request = request.reply_markup(keyboard.markup());
            }
            return request.await.map(|msg| msg.id).map_err(|e| {
                let msg = format!("Failed to send document: {e}");
                warn!("{}", msg);
                msg
            });
        }

        let mut request = self.bot.send_message(chat_id, reply.text.clone()).parse_mode(ParseMode::Html);
        if let Some(params) = reply_params {
            request = request.reply_parameters(params);
        }
        if let Some(keyboard) = reply.keyboard {
            request = request.reply_markup(keyboard.markup());
        }
        request.await.map(|msg| msg.id).map_err(|e| {
            let msg = format!("Failed to send: {e}");
            warn!("{}", msg);
            msg
        })
    }
}

pub async fn handle_message(bot: Bot, msg: Message, app: Arc<App>) -> ResponseResult<()> {
    let (Some(from), Some(text)) = (msg.from.as_ref(), msg.text()) else {
        return Ok(());
    };

    let user = User {
        id: from.id.0 as i64,
        username: from.username.clone(),
        display_name: from.full_name(),
    };

    let outcome = match app.handle_message(&user, text).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Failed to handle message from {} ({}): {e}", user.display_name, user.id);
            Outcome::apology()
        }
    };

    let client = TelegramClient::new(bot);
    for reply in &outcome.replies {
        // Already logged; keep going so the user still sees the rest.
        let _ = client.send_reply(msg.chat.id, reply, msg.id).await;
    }
    Ok(())
}

pub async fn handle_callback(bot: Bot, q: CallbackQuery) -> ResponseResult<()> {
    let Some(text) = q.data.as_deref().and_then(confirm_choice) else {
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    };

    info!("🔘 Confirm choice {:?} from {}", q.data, q.from.id);
    bot.answer_callback_query(q.id.clone()).text("Принято").await?;

    if let Some(message) = &q.message {
        let chat_id = message.chat().id;
        if let Err(e) = bot.edit_message_reply_markup(chat_id, message.id()).await {
            warn!("Failed to clear confirm keyboard: {e}");
        }
        bot.send_message(chat_id, text).await?;
    }
    Ok(())
}
