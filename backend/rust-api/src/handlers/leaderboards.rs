use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use super::{parse_board, ApiError};
use crate::{models::score::LeaderboardEntry, services::AppState};

pub async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    Path((operation, mode)): Path<(String, String)>,
) -> Result<Json<Vec<LeaderboardEntry>>, ApiError> {
    let (operation, mode) = parse_board(&operation, &mode)?;
    let entries = match state
        .scores
        .leaderboard(operation, mode, state.config.leaderboard_limit)
        .await
    {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Failed to load leaderboard {}/{}: {:#}", operation, mode, e);
            Vec::new()
        }
    };
    Ok(Json(entries))
}
