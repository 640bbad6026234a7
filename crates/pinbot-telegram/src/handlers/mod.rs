//! Telegram update handlers.
//!
//! Commands (`/start`, `/help`, `/sources`) are answered directly; any other
//! text is treated as a PIN code query.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use pinbot_core::domain::ChatId;

use crate::router::AppState;

mod commands;
mod text;

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(body) = msg.text() else {
        send_html_split(&state, ChatId(msg.chat.id.0), pinbot_core::formatting::WELCOME_TEXT)
            .await;
        return Ok(());
    };

    if body.starts_with('/') {
        return commands::handle_command(&msg, body, state).await;
    }

    text::handle_text(&msg, body, state).await
}

pub(crate) async fn send_html_split(state: &AppState, chat_id: ChatId, html: &str) {
    for chunk in pinbot_core::formatting::split_message(html, state.message_limit()) {
        if let Err(e) = state.messenger.send_html(chat_id, &chunk).await {
            tracing::warn!(chat_id = chat_id.0, error = %e, "failed to send reply");
            return;
        }
    }
}
