use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::game::{GameMode, Operation};

/// One best-score record per player per operation/mode board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreRecord {
    pub id: String,
    pub username: String,
    pub operation: Operation,
    pub mode: GameMode,
    pub score: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub username: String,
    pub score: i32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SaveReason {
    NewOrBetter,
    NotBetter,
    InvalidUsername,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SaveOutcome {
    pub saved: bool,
    pub reason: SaveReason,
}

impl SaveOutcome {
    pub fn saved() -> Self {
        Self {
            saved: true,
            reason: SaveReason::NewOrBetter,
        }
    }

    pub fn skipped(reason: SaveReason) -> Self {
        Self {
            saved: false,
            reason,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DedupeReport {
    pub total: u64,
    pub kept: u64,
    pub deleted: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BestScoreResponse {
    pub username: String,
    pub operation: Operation,
    pub mode: GameMode,
    pub best_score: i32,
    pub store_available: bool,
}
