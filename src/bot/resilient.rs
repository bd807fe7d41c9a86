//! Telegram send/edit/delete wrappers with automatic retry.
//!
//! All operations go through [`crate::utils::retry_telegram_operation`] so
//! transient network failures are retried with exponential backoff and
//! jitter. Edits degrade gracefully on the expected "message is not
//! modified" / "message to edit not found" responses.

use crate::config::TELEGRAM_MESSAGE_LIMIT;
use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{ChatId, Message, MessageId, ParseMode, ReplyParameters};
use tracing::{debug, warn};

/// Send a message, optionally as a reply and with a parse mode.
pub async fn send_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: impl Into<String>,
    parse_mode: Option<ParseMode>,
    reply_to: Option<MessageId>,
) -> Result<Message> {
    let text = text.into();
    crate::utils::retry_telegram_operation(|| async {
        let mut req = bot.send_message(chat_id, text.clone());
        if let Some(pm) = parse_mode {
            req = req.parse_mode(pm);
        }
        if let Some(msg_id) = reply_to {
            req = req.reply_parameters(ReplyParameters::new(msg_id));
        }
        req.await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
    })
    .await
}

/// Edit a message's text.
pub async fn edit_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    text: impl Into<String>,
    parse_mode: Option<ParseMode>,
) -> Result<Message> {
    let text = text.into();
    crate::utils::retry_telegram_operation(|| async {
        let mut req = bot.edit_message_text(chat_id, msg_id, text.clone());
        if let Some(pm) = parse_mode {
            req = req.parse_mode(pm);
        }
        req.await
            .map_err(|e| anyhow::anyhow!("Telegram edit error: {e}"))
    })
    .await
}

/// Edit a message with plain text, truncating and swallowing expected errors.
///
/// Returns `true` when the edit went through. Used for status and failure
/// texts, where a reply must never be lost to a formatting or edit error.
pub async fn edit_message_safe(bot: &Bot, chat_id: ChatId, msg_id: MessageId, text: &str) -> bool {
    const ERROR_NOT_MODIFIED: &str = "message is not modified";
    const ERROR_NOT_FOUND: &str = "message to edit not found";

    let truncated = if text.chars().count() > TELEGRAM_MESSAGE_LIMIT {
        crate::utils::truncate_str(text, TELEGRAM_MESSAGE_LIMIT)
    } else {
        text.to_string()
    };

    match edit_message_resilient(bot, chat_id, msg_id, truncated, None).await {
        Ok(_) => true,
        Err(e) => {
            let err_msg = e.to_string();
            if err_msg.contains(ERROR_NOT_MODIFIED) || err_msg.contains(ERROR_NOT_FOUND) {
                debug!("Message update skipped: {err_msg}");
            } else {
                warn!("Failed to edit message after retries: {e}");
            }
            false
        }
    }
}

/// Delete a message, logging instead of failing when Telegram refuses.
pub async fn delete_message_resilient(bot: &Bot, chat_id: ChatId, msg_id: MessageId) {
    let result = crate::utils::retry_telegram_operation(|| async {
        bot.delete_message(chat_id, msg_id)
            .await
            .map_err(|e| anyhow::anyhow!("Telegram delete error: {e}"))
    })
    .await;

    if let Err(e) = result {
        warn!("Failed to delete placeholder message: {e}");
    }
}
