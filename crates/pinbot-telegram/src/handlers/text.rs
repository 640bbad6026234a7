use std::sync::Arc;

use teloxide::prelude::*;

use pinbot_core::{
    domain::{ChatId, Resolution},
    errors::Error,
    formatting::{not_found_html, report_html, INVALID_INPUT_TEXT},
    resolver::Resolver,
};

use crate::router::AppState;

use super::send_html_split;

const LOOKUP_FAILED_TEXT: &str =
    "⚠️ Could not look up this PIN code right now. Please try again later.";

pub async fn handle_text(msg: &Message, text: &str, state: Arc<AppState>) -> ResponseResult<()> {
    let reply = reply_for_text(&state.resolver, text).await;
    send_html_split(&state, ChatId(msg.chat.id.0), &reply).await;
    Ok(())
}

/// Resolve free text typed by a user and render the reply.
pub(crate) async fn reply_for_text(resolver: &Resolver, text: &str) -> String {
    match resolver.resolve(text.trim()).await {
        Ok(Resolution::Found(report)) => report_html(&report),
        Ok(Resolution::NotFound(code)) => not_found_html(&code),
        Err(Error::InvalidInput(_)) => INVALID_INPUT_TEXT.to_string(),
        Err(e) => {
            tracing::error!(error = %e, "postal code lookup failed");
            LOOKUP_FAILED_TEXT.to_string()
        }
    }
}
