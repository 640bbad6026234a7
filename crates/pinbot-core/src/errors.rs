use std::path::PathBuf;

/// Core error type for the PIN code bot.
///
/// Adapter crates should map their specific errors into this type so the bot
/// core can handle failures consistently (user-facing message vs operational).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid postal code: {0:?}")]
    InvalidInput(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error in {path}: {reason}")]
    Csv { path: PathBuf, reason: String },

    #[error("source {source_id} unavailable: {reason}")]
    Source { source_id: String, reason: String },

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
