use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use self::game::{GameConfig, GameMode, GameState, MedalTier, Operation, Question};
use self::score::LeaderboardEntry;

pub mod answer;
pub mod game;
pub mod player;
pub mod score;
pub mod timer;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Active,
    Ended,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StartGameRequest {
    #[validate(length(min = 1, max = 64, message = "username must be 1-64 characters"))]
    pub username: String,
    pub operation: Operation,
    pub mode: GameMode,
    #[serde(default)]
    pub allow_negatives: bool,
}

impl StartGameRequest {
    pub fn config(&self) -> GameConfig {
        GameConfig {
            operation: self.operation,
            mode: self.mode,
            allow_negatives: self.allow_negatives,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartGameResponse {
    pub session_id: String,
    pub question: Question,
    pub state: GameState,
    pub time_limit_seconds: u32,
}

/// What the presentation layer needs to redraw a game screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub username: String,
    pub config: GameConfig,
    pub status: SessionStatus,
    pub state: GameState,
    pub medal_tier: MedalTier,
    pub accuracy: u32,
    pub question: Option<Question>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Frozen outcome of a finished session, captured before anything is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalResult {
    pub session_id: String,
    pub username: String,
    pub config: GameConfig,
    pub final_score: i32,
    pub accuracy: u32,
    pub medal_level: u8,
    pub total_questions: u32,
    pub correct_answers: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSummary {
    pub session_id: String,
    pub username: String,
    pub operation: Operation,
    pub mode: GameMode,
    pub final_score: i32,
    pub accuracy: u32,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub medal_level: u8,
    pub medal_tier: MedalTier,
    pub best_score: i32,
    pub is_new_best: bool,
    pub leaderboard: Vec<LeaderboardEntry>,
    /// False when the score store could not be reached and the figures above
    /// are fallbacks.
    pub store_available: bool,
}
