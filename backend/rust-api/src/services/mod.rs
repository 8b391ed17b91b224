use std::{collections::HashMap, sync::Arc};

use anyhow::Context;
use tokio::sync::Mutex;

use crate::config::{Config, StorageBackend};

use self::{
    leaderboard_hub::LeaderboardHub,
    mongo_score_store::MongoScoreStore,
    score_store::{MemoryScoreStore, ScoreStore},
    session_service::SessionRegistry,
};

pub struct AppState {
    pub config: Config,
    pub scores: Arc<dyn ScoreStore>,
    pub sessions: SessionRegistry,
    pub leaderboards: LeaderboardHub,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let scores: Arc<dyn ScoreStore> = match config.storage_backend {
            StorageBackend::Memory => {
                tracing::info!("Using in-memory score store");
                Arc::new(MemoryScoreStore::new())
            }
            StorageBackend::Mongo => Arc::new(connect_mongo(&config).await?),
        };

        Ok(Self::with_store(config, scores))
    }

    pub fn with_store(config: Config, scores: Arc<dyn ScoreStore>) -> Self {
        Self {
            config,
            scores,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            leaderboards: LeaderboardHub::new(),
        }
    }
}

pub async fn connect_mongo(config: &Config) -> anyhow::Result<MongoScoreStore> {
    let uri = config
        .mongo_uri
        .as_deref()
        .context("database.mongo_uri must be set for the mongo backend")?;

    tracing::info!("Attempting to connect to MongoDB...");
    let client = mongodb::Client::with_uri_str(uri)
        .await
        .context("Failed to create MongoDB client")?;
    let store = MongoScoreStore::new(client.database(&config.mongo_database));

    tokio::time::timeout(std::time::Duration::from_secs(10), store.ping())
        .await
        .map_err(|_| anyhow::anyhow!("MongoDB ping timeout after 10s"))??;

    tracing::info!("MongoDB connected: database={}", config.mongo_database);
    Ok(store)
}

pub mod game_session;
pub mod leaderboard_hub;
pub mod mongo_score_store;
pub mod question_generator;
pub mod score_store;
pub mod scoring;
pub mod session_service;
