use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::models::{
    game::{GameMode, Operation},
    player::PlayerRecord,
    score::{DedupeReport, LeaderboardEntry, SaveOutcome, SaveReason, ScoreRecord},
};

pub const DEFAULT_LEADERBOARD_LIMIT: usize = 50;

/// Persistence for best scores and known players.
///
/// One record per `(operation, mode, username)` holds the player's best
/// score on that board. Implementations must never lower a stored score.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// Best score on a board, or 0 when the player has none.
    async fn best_score(&self, operation: Operation, mode: GameMode, username: &str)
        -> Result<i32>;

    /// Stores `score` when the player has no record yet or it beats the stored one.
    async fn save_if_higher(
        &self,
        operation: Operation,
        mode: GameMode,
        username: &str,
        score: i32,
    ) -> Result<SaveOutcome>;

    /// Top entries of a board, one per player, highest first.
    async fn leaderboard(
        &self,
        operation: Operation,
        mode: GameMode,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>>;

    /// Records a login, creating the player on first sight.
    async fn ensure_player(&self, username: &str) -> Result<PlayerRecord>;

    /// Collapses duplicate records on a board down to each player's best.
    async fn dedupe(&self, operation: Operation, mode: GameMode) -> Result<DedupeReport>;

    async fn ping(&self) -> Result<()>;
}

pub fn score_key(operation: Operation, mode: GameMode, username: &str) -> String {
    format!("{}_{}_{}", operation.as_str(), mode.as_str(), username)
}

/// Trimmed username, or `None` when nothing is left.
pub fn normalize_username(username: &str) -> Option<&str> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Reduces raw rows to one entry per player, sorted by score descending.
///
/// Ties are broken by username so the order is stable across backends.
pub fn fold_leaderboard<I>(rows: I, limit: usize) -> Vec<LeaderboardEntry>
where
    I: IntoIterator<Item = (String, i32)>,
{
    let mut best: HashMap<String, i32> = HashMap::new();
    for (username, score) in rows {
        best.entry(username)
            .and_modify(|current| *current = (*current).max(score))
            .or_insert(score);
    }

    let mut entries: Vec<LeaderboardEntry> = best
        .into_iter()
        .map(|(username, score)| LeaderboardEntry { username, score })
        .collect();
    entries.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.username.cmp(&b.username)));
    entries.truncate(limit);
    entries
}

/// Process-local store used for single-device play and in tests.
#[derive(Default)]
pub struct MemoryScoreStore {
    scores: RwLock<HashMap<String, ScoreRecord>>,
    players: RwLock<HashMap<String, PlayerRecord>>,
}

impl MemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScoreStore for MemoryScoreStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn best_score(
        &self,
        operation: Operation,
        mode: GameMode,
        username: &str,
    ) -> Result<i32> {
        let Some(username) = normalize_username(username) else {
            return Ok(0);
        };
        let scores = self.scores.read().await;
        Ok(scores
            .get(&score_key(operation, mode, username))
            .map(|record| record.score)
            .unwrap_or(0))
    }

    async fn save_if_higher(
        &self,
        operation: Operation,
        mode: GameMode,
        username: &str,
        score: i32,
    ) -> Result<SaveOutcome> {
        let Some(username) = normalize_username(username) else {
            return Ok(SaveOutcome::skipped(SaveReason::InvalidUsername));
        };

        let key = score_key(operation, mode, username);
        let mut scores = self.scores.write().await;
        if let Some(existing) = scores.get(&key) {
            if score <= existing.score {
                return Ok(SaveOutcome::skipped(SaveReason::NotBetter));
            }
        }

        scores.insert(
            key.clone(),
            ScoreRecord {
                id: key,
                username: username.to_string(),
                operation,
                mode,
                score,
                updated_at: Utc::now(),
            },
        );
        Ok(SaveOutcome::saved())
    }

    async fn leaderboard(
        &self,
        operation: Operation,
        mode: GameMode,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>> {
        let scores = self.scores.read().await;
        let rows = scores
            .values()
            .filter(|record| record.operation == operation && record.mode == mode)
            .map(|record| (record.username.clone(), record.score));
        Ok(fold_leaderboard(rows, limit))
    }

    async fn ensure_player(&self, username: &str) -> Result<PlayerRecord> {
        let username = normalize_username(username)
            .ok_or_else(|| anyhow::anyhow!("username must not be blank"))?;

        let now = Utc::now();
        let mut players = self.players.write().await;
        let record = players
            .entry(username.to_string())
            .and_modify(|player| player.last_login_at = now)
            .or_insert_with(|| PlayerRecord {
                username: username.to_string(),
                created_at: now,
                last_login_at: now,
            });
        Ok(record.clone())
    }

    async fn dedupe(&self, operation: Operation, mode: GameMode) -> Result<DedupeReport> {
        // Records are keyed per player, so there is never more than one.
        let scores = self.scores.read().await;
        let total = scores
            .values()
            .filter(|record| record.operation == operation && record.mode == mode)
            .count() as u64;
        Ok(DedupeReport {
            total,
            kept: total,
            deleted: 0,
        })
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OP: Operation = Operation::Addition;
    const MODE: GameMode = GameMode::Mini;

    #[test]
    fn key_matches_board_layout() {
        assert_eq!(
            score_key(Operation::Multiplication, GameMode::Level, "ada"),
            "multiplication_level_ada"
        );
    }

    #[test]
    fn fold_keeps_best_per_player() {
        let rows = vec![
            ("bob".to_string(), 10),
            ("ada".to_string(), 30),
            ("bob".to_string(), 40),
            ("cy".to_string(), 30),
        ];
        let board = fold_leaderboard(rows, 10);
        let names: Vec<_> = board.iter().map(|e| e.username.as_str()).collect();
        assert_eq!(names, ["bob", "ada", "cy"]);
        assert_eq!(board[0].score, 40);
    }

    #[test]
    fn fold_respects_limit() {
        let rows = (0..20).map(|i| (format!("p{:02}", i), i));
        let board = fold_leaderboard(rows, 5);
        assert_eq!(board.len(), 5);
        assert_eq!(board[0].score, 19);
    }

    #[tokio::test]
    async fn best_score_defaults_to_zero() {
        let store = MemoryScoreStore::new();
        assert_eq!(store.best_score(OP, MODE, "nobody").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn only_higher_scores_replace_the_record() {
        let store = MemoryScoreStore::new();

        let first = store.save_if_higher(OP, MODE, "ada", 12).await.unwrap();
        assert_eq!(first, SaveOutcome::saved());

        let lower = store.save_if_higher(OP, MODE, "ada", 8).await.unwrap();
        assert_eq!(lower, SaveOutcome::skipped(SaveReason::NotBetter));

        let equal = store.save_if_higher(OP, MODE, "ada", 12).await.unwrap();
        assert_eq!(equal, SaveOutcome::skipped(SaveReason::NotBetter));

        let higher = store.save_if_higher(OP, MODE, "ada", 20).await.unwrap();
        assert!(higher.saved);
        assert_eq!(store.best_score(OP, MODE, "ada").await.unwrap(), 20);
    }

    #[tokio::test]
    async fn first_negative_score_is_kept() {
        let store = MemoryScoreStore::new();
        assert!(store.save_if_higher(OP, MODE, "ada", -15).await.unwrap().saved);
        assert_eq!(store.best_score(OP, MODE, "ada").await.unwrap(), -15);
    }

    #[tokio::test]
    async fn blank_usernames_are_rejected() {
        let store = MemoryScoreStore::new();
        let outcome = store.save_if_higher(OP, MODE, "   ", 50).await.unwrap();
        assert_eq!(outcome, SaveOutcome::skipped(SaveReason::InvalidUsername));
        assert!(store.leaderboard(OP, MODE, 10).await.unwrap().is_empty());
        assert!(store.ensure_player("").await.is_err());
    }

    #[tokio::test]
    async fn boards_are_isolated() {
        let store = MemoryScoreStore::new();
        store.save_if_higher(OP, MODE, "ada", 10).await.unwrap();
        store
            .save_if_higher(OP, GameMode::Level, "ada", 99)
            .await
            .unwrap();
        store
            .save_if_higher(Operation::Division, MODE, "bob", 5)
            .await
            .unwrap();

        let board = store.leaderboard(OP, MODE, 10).await.unwrap();
        assert_eq!(
            board,
            vec![LeaderboardEntry {
                username: "ada".to_string(),
                score: 10
            }]
        );
    }

    #[tokio::test]
    async fn ensure_player_tracks_logins() {
        let store = MemoryScoreStore::new();
        let first = store.ensure_player(" ada ").await.unwrap();
        assert_eq!(first.username, "ada");
        let second = store.ensure_player("ada").await.unwrap();
        assert_eq!(second.created_at, first.created_at);
        assert!(second.last_login_at >= first.last_login_at);
    }
}
