use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use validator::Validate;

use super::ApiError;
use crate::{
    extractors::AppJson,
    models::{
        answer::{SubmitAnswerRequest, SubmitAnswerResponse},
        GameSummary, SessionSnapshot, StartGameRequest,
    },
    services::{session_service::SessionService, AppState},
};

pub async fn start_game(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<StartGameRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;
    tracing::info!(
        "Starting game for username={}, operation={}, mode={}",
        req.username,
        req.operation,
        req.mode
    );

    let service = SessionService::new(&state);
    let response = service.start_game(req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn get_game(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let service = SessionService::new(&state);
    Ok(Json(service.get_session(&session_id).await?))
}

pub async fn submit_answer(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    AppJson(req): AppJson<SubmitAnswerRequest>,
) -> Result<Json<SubmitAnswerResponse>, ApiError> {
    let service = SessionService::new(&state);
    let response = service.submit_answer(&session_id, &req.answer).await?;
    if response.accepted {
        tracing::debug!(
            "Answer for session {}: correct={}, delta={}",
            session_id,
            response.correct,
            response.points_delta
        );
    }
    Ok(Json(response))
}

pub async fn give_up(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<GameSummary>, ApiError> {
    let service = SessionService::new(&state);
    Ok(Json(service.give_up(&session_id).await?))
}

pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<GameSummary>, ApiError> {
    let service = SessionService::new(&state);
    service
        .summary(&session_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Game has not finished yet"))
}
