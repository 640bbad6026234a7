use std::sync::Arc;

use teloxide::prelude::*;

use pinbot_core::{
    domain::ChatId,
    formatting::{source_stats_html, HELP_TEXT, WELCOME_TEXT},
};

use crate::router::AppState;

use super::send_html_split;

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

pub async fn handle_command(
    msg: &Message,
    text: &str,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let chat_id = ChatId(msg.chat.id.0);
    let (cmd, _args) = parse_command(text);

    let reply = match cmd.as_str() {
        "start" => WELCOME_TEXT.to_string(),
        "help" => HELP_TEXT.to_string(),
        "sources" => source_stats_html(&state.resolver.exclusions().stats()),
        _ => format!("Unknown command. {HELP_TEXT}"),
    };
    send_html_split(&state, chat_id, &reply).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_command_with_bot_suffix_and_args() {
        assert_eq!(
            parse_command("/Sources@pin_bot extra words"),
            ("sources".to_string(), "extra words".to_string())
        );
        assert_eq!(parse_command("/start"), ("start".to_string(), String::new()));
    }
}
