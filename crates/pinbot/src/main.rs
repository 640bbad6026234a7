use std::sync::Arc;

use pinbot_csv::{CsvDirectory, CsvExclusionSource, CsvHardBlockList};

use pinbot_core::{config::Config, exclusion::ExclusionAggregator, resolver::Resolver};

const HARD_BLOCK_SOURCE_ID: &str = "cannot_process";

#[tokio::main]
async fn main() -> Result<(), pinbot_core::Error> {
    pinbot_core::logging::init("pinbot")?;

    let cfg = Arc::new(Config::load()?);

    let directory = Arc::new(CsvDirectory::load(&cfg.directory_path, &cfg.directory_columns)?);

    let mut exclusions = ExclusionAggregator::new(cfg.source_timeout);
    for source in &cfg.exclusion_sources {
        tracing::info!(
            id = %source.id,
            path = %source.path.display(),
            mode = ?source.mode,
            "exclusion source"
        );
        exclusions = exclusions.with_source(Arc::new(CsvExclusionSource::from_config(source)));
    }
    if let Some(path) = &cfg.hard_block_path {
        tracing::info!(path = %path.display(), "hard-block list");
        let list = CsvHardBlockList::new(HARD_BLOCK_SOURCE_ID, path.clone());
        exclusions = exclusions.with_hard_block(Arc::new(list));
    }

    let resolver = Arc::new(Resolver::new(directory, exclusions));

    pinbot_telegram::router::run_polling(cfg, resolver)
        .await
        .map_err(|e| pinbot_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
