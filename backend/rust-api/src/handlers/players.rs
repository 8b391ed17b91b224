use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use validator::Validate;

use super::{parse_board, ApiError};
use crate::{
    extractors::AppJson,
    models::{
        player::{LoginRequest, PlayerRecord},
        score::BestScoreResponse,
    },
    services::{score_store::normalize_username, AppState},
};

pub async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<Json<PlayerRecord>, ApiError> {
    req.validate()?;
    if normalize_username(&req.username).is_none() {
        return Err(ApiError::bad_request("username must not be blank"));
    }

    let player = state.scores.ensure_player(&req.username).await?;
    tracing::info!("Player logged in: {}", player.username);
    Ok(Json(player))
}

pub async fn best_score(
    State(state): State<Arc<AppState>>,
    Path((username, operation, mode)): Path<(String, String, String)>,
) -> Result<Json<BestScoreResponse>, ApiError> {
    let (operation, mode) = parse_board(&operation, &mode)?;
    // An unreachable store reads as no record yet.
    let (best_score, store_available) =
        match state.scores.best_score(operation, mode, &username).await {
            Ok(best) => (best, true),
            Err(e) => {
                tracing::warn!("Failed to load best score for {}: {:#}", username, e);
                (0, false)
            }
        };
    Ok(Json(BestScoreResponse {
        username,
        operation,
        mode,
        best_score,
        store_available,
    }))
}
