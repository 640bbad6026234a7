use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use pinbot_core::{config::Config, ports::MessagingPort, resolver::Resolver};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub resolver: Arc<Resolver>,
    pub messenger: Arc<dyn MessagingPort>,
}

impl AppState {
    /// Largest chunk we send in one message.
    pub fn message_limit(&self) -> usize {
        self.cfg
            .telegram_message_limit
            .min(self.messenger.capabilities().max_message_len)
            .max(200)
    }
}

pub async fn run_polling(cfg: Arc<Config>, resolver: Arc<Resolver>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    // Basic startup info.
    match bot.get_me().await {
        Ok(me) => tracing::info!(username = %me.username(), "pinbot started"),
        Err(e) => tracing::warn!(error = %e, "could not fetch bot identity"),
    }
    tracing::info!(
        directory = %cfg.directory_path.display(),
        exclusion_sources = cfg.exclusion_sources.len(),
        hard_block = cfg.hard_block_path.is_some(),
        source_timeout_ms = cfg.source_timeout.as_millis() as u64,
        "reference data configured"
    );

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));

    let state = Arc::new(AppState {
        cfg,
        resolver,
        messenger,
    });

    let handler =
        dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{path::PathBuf, time::Duration};

    use async_trait::async_trait;

    use pinbot_core::{
        config::DirectoryColumns,
        domain::{AreaRecord, ChatId, PostalCode},
        exclusion::ExclusionAggregator,
        ports::{CodeDirectory, MessagingCapabilities},
        Result,
    };

    use super::*;

    struct EmptyDirectory;

    #[async_trait]
    impl CodeDirectory for EmptyDirectory {
        async fn lookup_areas(&self, _code: &PostalCode) -> Result<Vec<AreaRecord>> {
            Ok(Vec::new())
        }
    }

    struct CappedMessenger(usize);

    #[async_trait]
    impl MessagingPort for CappedMessenger {
        fn capabilities(&self) -> MessagingCapabilities {
            MessagingCapabilities {
                max_message_len: self.0,
            }
        }

        async fn send_html(&self, _chat_id: ChatId, _html: &str) -> Result<()> {
            Ok(())
        }
    }

    fn state(configured: usize, transport_cap: usize) -> AppState {
        AppState {
            cfg: Arc::new(Config {
                telegram_bot_token: "token".to_string(),
                telegram_message_limit: configured,
                directory_path: PathBuf::from("pincode_clean.csv"),
                directory_columns: DirectoryColumns::default(),
                exclusion_sources: Vec::new(),
                hard_block_path: None,
                source_timeout: Duration::from_secs(1),
            }),
            resolver: Arc::new(Resolver::new(
                Arc::new(EmptyDirectory),
                ExclusionAggregator::default(),
            )),
            messenger: Arc::new(CappedMessenger(transport_cap)),
        }
    }

    #[tokio::test]
    async fn message_limit_respects_transport_cap_and_floor() {
        assert_eq!(state(4096, 1000).message_limit(), 1000);
        assert_eq!(state(500, 4096).message_limit(), 500);
        assert_eq!(state(10, 4096).message_limit(), 200);

        let st = state(4096, 4096);
        assert!(st.messenger.send_html(ChatId(1), "<b>ok</b>").await.is_ok());
    }
}
