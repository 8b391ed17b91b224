use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Bson, Document},
    error::{ErrorKind, WriteFailure},
    options::FindOptions,
    results::UpdateResult,
    Collection, Database,
};

use super::score_store::{fold_leaderboard, normalize_username, score_key, ScoreStore};
use crate::metrics::track_db_operation;
use crate::models::{
    game::{GameMode, Operation},
    player::PlayerRecord,
    score::{DedupeReport, LeaderboardEntry, SaveOutcome, SaveReason},
};
use crate::utils::{
    retry::{retry_async_with_config, RetryConfig},
    time::{bson_to_chrono, chrono_to_bson},
};

const SCORES: &str = "scores";
const USERS: &str = "users";

/// Shared best-score store. Documents in `scores` use the board key
/// (`{operation}_{mode}_{username}`) as `_id`; older rows written under other
/// ids are folded by `dedupe`.
pub struct MongoScoreStore {
    mongo: Database,
}

impl MongoScoreStore {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn scores(&self) -> Collection<Document> {
        self.mongo.collection(SCORES)
    }

    fn users(&self) -> Collection<Document> {
        self.mongo.collection(USERS)
    }
}

fn score_of(document: &Document) -> i32 {
    match document.get("score") {
        Some(Bson::Int32(v)) => *v,
        Some(Bson::Int64(v)) => *v as i32,
        Some(Bson::Double(v)) => *v as i32,
        _ => 0,
    }
}

fn is_duplicate_key(error: &anyhow::Error) -> bool {
    matches!(
        error
            .downcast_ref::<mongodb::error::Error>()
            .map(|e| e.kind.as_ref()),
        Some(ErrorKind::Write(WriteFailure::WriteError(write_error))) if write_error.code == 11000
    )
}

/// Whether a guarded upsert stored the score. A duplicate key means another
/// writer stored a higher score first; any other error is left to the caller.
fn upsert_applied(result: Result<UpdateResult>) -> Result<bool> {
    match result {
        Ok(update) => Ok(update.matched_count > 0 || update.upserted_id.is_some()),
        Err(e) if is_duplicate_key(&e) => Ok(false),
        Err(e) => Err(e),
    }
}

#[async_trait]
impl ScoreStore for MongoScoreStore {
    fn backend_name(&self) -> &'static str {
        "mongo"
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
        let key = score_key(operation, mode, username);

        let found = retry_async_with_config(RetryConfig::default(), || {
            let key = key.clone();
            track_db_operation("find_one", SCORES, async move {
                self.scores()
                    .find_one(doc! { "_id": key })
                    .await
                    .context("Failed to load best score")
            })
        })
        .await?;

        Ok(found.as_ref().map(score_of).unwrap_or(0))
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

        let existing = retry_async_with_config(RetryConfig::default(), || {
            let key = key.clone();
            track_db_operation("find_one", SCORES, async move {
                self.scores()
                    .find_one(doc! { "_id": key })
                    .await
                    .context("Failed to load existing score")
            })
        })
        .await?;

        if let Some(existing) = existing {
            if score <= score_of(&existing) {
                return Ok(SaveOutcome::skipped(SaveReason::NotBetter));
            }
        }

        // The score guard keeps a concurrent higher write from being replaced.
        let filter = doc! {
            "_id": key.as_str(),
            "$or": [
                { "score": { "$lt": score } },
                { "score": { "$exists": false } },
            ],
        };
        let update = doc! {
            "$set": {
                "username": username,
                "operation": operation.as_str(),
                "mode": mode.as_str(),
                "score": score,
                "updatedAt": chrono_to_bson(Utc::now()),
            }
        };

        // The guard never lowers a stored score, so a retried write is harmless.
        let written = retry_async_with_config(RetryConfig::default(), || {
            let filter = filter.clone();
            let update = update.clone();
            track_db_operation("update_one", SCORES, async move {
                upsert_applied(
                    self.scores()
                        .update_one(filter, update)
                        .upsert(true)
                        .await
                        .context("Failed to save score"),
                )
            })
        })
        .await?;

        if !written {
            return Ok(SaveOutcome::skipped(SaveReason::NotBetter));
        }

        tracing::info!(
            "New best score saved: {} on {}/{} = {}",
            username,
            operation,
            mode,
            score
        );
        Ok(SaveOutcome::saved())
    }

    async fn leaderboard(
        &self,
        operation: Operation,
        mode: GameMode,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>> {
        let rows = retry_async_with_config(RetryConfig::default(), || {
            track_db_operation("find", SCORES, async move {
                let options = FindOptions::builder().sort(doc! { "score": -1 }).build();
                let mut cursor = self
                    .scores()
                    .find(doc! { "operation": operation.as_str(), "mode": mode.as_str() })
                    .with_options(options)
                    .await
                    .context("Failed to query leaderboard")?;

                let mut rows = Vec::new();
                while let Some(document) = cursor
                    .try_next()
                    .await
                    .context("Failed to iterate leaderboard")?
                {
                    if let Ok(username) = document.get_str("username") {
                        rows.push((username.to_string(), score_of(&document)));
                    }
                }
                Ok(rows)
            })
        })
        .await?;

        Ok(fold_leaderboard(rows, limit))
    }

    async fn ensure_player(&self, username: &str) -> Result<PlayerRecord> {
        let username = normalize_username(username)
            .ok_or_else(|| anyhow::anyhow!("username must not be blank"))?;
        let now = chrono_to_bson(Utc::now());

        retry_async_with_config(RetryConfig::default(), || {
            track_db_operation("update_one", USERS, async move {
                self.users()
                    .update_one(
                        doc! { "_id": username },
                        doc! {
                            "$set": { "lastLoginAt": now },
                            "$setOnInsert": { "username": username, "createdAt": now },
                        },
                    )
                    .upsert(true)
                    .await
                    .context("Failed to record login")
            })
        })
        .await?;

        let document = retry_async_with_config(RetryConfig::default(), || {
            track_db_operation("find_one", USERS, async move {
                self.users()
                    .find_one(doc! { "_id": username })
                    .await
                    .context("Failed to load player")
            })
        })
        .await?
        .ok_or_else(|| anyhow::anyhow!("Player {} vanished after upsert", username))?;

        let created_at = document
            .get_datetime("createdAt")
            .map(|dt| bson_to_chrono(*dt))
            .unwrap_or_else(|_| Utc::now());
        let last_login_at = document
            .get_datetime("lastLoginAt")
            .map(|dt| bson_to_chrono(*dt))
            .unwrap_or(created_at);

        Ok(PlayerRecord {
            username: username.to_string(),
            created_at,
            last_login_at,
        })
    }

    async fn dedupe(&self, operation: Operation, mode: GameMode) -> Result<DedupeReport> {
        let scores = self.scores();
        let filter = doc! { "operation": operation.as_str(), "mode": mode.as_str() };

        let documents: Vec<Document> = track_db_operation("find", SCORES, async {
            scores
                .find(filter)
                .await
                .context("Failed to query scores for dedupe")?
                .try_collect()
                .await
                .context("Failed to iterate scores for dedupe")
        })
        .await?;

        // Per player: the id of the document to keep and its score.
        let mut keep: HashMap<String, (Bson, i32)> = HashMap::new();
        for document in &documents {
            let (Ok(username), Some(id)) = (document.get_str("username"), document.get("_id"))
            else {
                continue;
            };
            let score = score_of(document);
            let canonical = Bson::String(score_key(operation, mode, username));
            let better = match keep.get(username) {
                None => true,
                Some((kept_id, kept_score)) => {
                    score > *kept_score
                        || (score == *kept_score && *id == canonical && *kept_id != canonical)
                }
            };
            if better {
                keep.insert(username.to_string(), (id.clone(), score));
            }
        }

        let kept_ids: Vec<&Bson> = keep.values().map(|(id, _)| id).collect();
        let doomed: Vec<Bson> = documents
            .iter()
            .filter_map(|document| document.get("_id"))
            .filter(|id| !kept_ids.contains(id))
            .cloned()
            .collect();

        let deleted = if doomed.is_empty() {
            0
        } else {
            track_db_operation("delete_many", SCORES, async {
                scores
                    .delete_many(doc! { "_id": { "$in": doomed } })
                    .await
                    .context("Failed to delete duplicate scores")
            })
            .await?
            .deleted_count
        };

        let report = DedupeReport {
            total: documents.len() as u64,
            kept: keep.len() as u64,
            deleted,
        };
        tracing::info!(
            "Deduped {}/{}: total={} kept={} deleted={}",
            operation,
            mode,
            report.total,
            report.kept,
            report.deleted
        );
        Ok(report)
    }

    async fn ping(&self) -> Result<()> {
        self.mongo
            .run_command(doc! { "ping": 1 })
            .await
            .context("MongoDB ping failed")?;
        Ok(())
    }
}
