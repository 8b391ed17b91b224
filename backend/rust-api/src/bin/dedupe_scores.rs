use anyhow::Context;
use tracing_subscriber::fmt::init;

use mathpractice_api::{
    config::{Config, StorageBackend},
    models::{
        game::{GameMode, Operation},
        score::DedupeReport,
    },
    services::{connect_mongo, score_store::ScoreStore},
};

/// Collapses duplicate score documents on every board down to each
/// player's best.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();

    let config = Config::load().context("Failed to load configuration")?;
    if config.storage_backend != StorageBackend::Mongo {
        anyhow::bail!("dedupe-scores only applies to the mongo backend (set storage.backend = mongo)");
    }

    let store = connect_mongo(&config).await?;

    let mut overall = DedupeReport::default();
    for operation in Operation::ALL {
        for mode in GameMode::ALL {
            let report = store
                .dedupe(operation, mode)
                .await
                .with_context(|| format!("Failed to dedupe {}/{}", operation, mode))?;
            overall.total += report.total;
            overall.kept += report.kept;
            overall.deleted += report.deleted;
        }
    }

    tracing::info!(
        "Dedupe complete: total={} kept={} deleted={}",
        overall.total,
        overall.kept,
        overall.deleted
    );
    Ok(())
}
