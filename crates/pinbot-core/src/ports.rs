use async_trait::async_trait;

use crate::{domain::*, Result};

/// Read-only lookup from a postal code to the areas registered under it.
///
/// An unknown code yields an empty vector, not an error.
#[async_trait]
pub trait CodeDirectory: Send + Sync {
    async fn lookup_areas(&self, code: &PostalCode) -> Result<Vec<AreaRecord>>;
}

/// One independent negative-area feed.
///
/// The match mode is fixed when the source is configured; the aggregator never
/// probes a source to find out what shape its rows have.
#[async_trait]
pub trait ExclusionSource: Send + Sync {
    fn id(&self) -> &str;

    fn match_mode(&self) -> MatchMode;

    async fn query(&self, code: &PostalCode) -> Result<Vec<ExclusionEntry>>;
}

/// Unconditional "cannot process" list, keyed by code only.
#[async_trait]
pub trait HardBlockList: Send + Sync {
    fn id(&self) -> &str;

    async fn is_hard_blocked(&self, code: &PostalCode) -> Result<bool>;
}

/// Capabilities of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    pub max_message_len: usize,
}

/// Outbound port for the chat transport.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<()>;
}
