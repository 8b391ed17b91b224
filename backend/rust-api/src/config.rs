use serde::Deserialize;
use std::{env, str::FromStr};

use crate::services::score_store::DEFAULT_LEADERBOARD_LIMIT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Scores live in process memory and vanish on restart.
    Memory,
    Mongo,
}

impl FromStr for StorageBackend {
    type Err = config::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "local" => Ok(StorageBackend::Memory),
            "mongo" | "mongodb" | "cloud" => Ok(StorageBackend::Mongo),
            other => Err(config::ConfigError::Message(format!(
                "unknown storage backend: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub storage_backend: StorageBackend,
    pub mongo_uri: Option<String>,
    pub mongo_database: String,
    pub bind_addr: String,
    pub tick_interval_ms: u64,
    pub leaderboard_limit: usize,
    /// How long an ended game stays readable before it is evicted.
    pub session_retention_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_backend: StorageBackend::Memory,
            mongo_uri: None,
            mongo_database: "mathpractice".to_string(),
            bind_addr: "0.0.0.0:8081".to_string(),
            tick_interval_ms: 1000,
            leaderboard_limit: DEFAULT_LEADERBOARD_LIMIT,
            session_retention_ms: 300_000,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Root .env first, then the local one
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/*.toml, then APP__SECTION__KEY overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        Self::from_settings(&settings)
    }

    fn from_settings(settings: &config::Config) -> Result<Self, config::ConfigError> {
        let defaults = Config::default();

        let storage_backend = match settings
            .get_string("storage.backend")
            .or_else(|_| env::var("STORAGE_BACKEND"))
        {
            Ok(value) => value.parse()?,
            Err(_) => defaults.storage_backend,
        };

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .ok();

        if storage_backend == StorageBackend::Mongo && mongo_uri.is_none() {
            return Err(config::ConfigError::Message(
                "database.mongo_uri (or MONGO_URI) must be set when storage.backend = mongo"
                    .to_string(),
            ));
        }

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or(defaults.mongo_database);

        let bind_addr = settings
            .get_string("server.bind_addr")
            .or_else(|_| env::var("BIND_ADDR"))
            .unwrap_or(defaults.bind_addr);

        let tick_interval_ms = settings
            .get_int("game.tick_interval_ms")
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults.tick_interval_ms);

        let leaderboard_limit = settings
            .get_int("game.leaderboard_limit")
            .ok()
            .and_then(|v| usize::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults.leaderboard_limit);

        let session_retention_ms = settings
            .get_int("game.session_retention_ms")
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(defaults.session_retention_ms);

        Ok(Config {
            storage_backend,
            mongo_uri,
            mongo_database,
            bind_addr,
            tick_interval_ms,
            leaderboard_limit,
            session_retention_ms,
        })
    }
}
