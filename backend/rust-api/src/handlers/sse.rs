use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use chrono::Utc;
use futures::stream::{self, Stream};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use super::{parse_board, ApiError};
use crate::{
    metrics::SseConnectionGuard,
    models::{
        timer::{TimeExpired, TimerEvent, TimerTick},
        SessionStatus,
    },
    services::{leaderboard_hub::LeaderboardSubscription, session_service::SessionService, AppState},
};

/// SSE countdown for one game
/// GET /api/v1/games/{id}/stream
pub async fn game_stream(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let service = SessionService::new(&state);
    let snapshot = service.get_session(&session_id).await?;
    let tick_interval = Duration::from_millis(state.config.tick_interval_ms.max(1));

    tracing::info!(
        "Client connected to game stream: session={}, remaining={}s",
        session_id,
        snapshot.state.time_left
    );

    let total_seconds = snapshot.config.mode.time_limit_seconds();
    let stream = create_timer_stream(service, session_id, total_seconds, tick_interval);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Mirrors the session countdown until the game ends or disappears.
fn create_timer_stream(
    service: SessionService,
    session_id: String,
    total_seconds: u32,
    tick_interval: Duration,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let guard = SseConnectionGuard::open();
    stream::unfold(
        (service, session_id, false, guard),
        move |(service, sid, final_sent, guard)| async move {
            if final_sent {
                return None;
            }

            // A replaced session simply ends the stream.
            let snapshot = service.get_session(&sid).await.ok()?;

            if snapshot.status == SessionStatus::Ended {
                let message = if snapshot.state.time_left == 0 {
                    "Time's up!"
                } else {
                    "Game over"
                };
                let expired_event = TimerEvent::TimeExpired(TimeExpired {
                    session_id: sid.clone(),
                    final_score: snapshot.state.score,
                    timestamp: Utc::now(),
                    message: message.to_string(),
                });
                let event = Event::default()
                    .event(expired_event.event_name())
                    .data(expired_event.to_sse_data());

                tracing::info!("Game stream finished: session={}", sid);
                return Some((Ok(event), (service, sid, true, guard)));
            }

            let remaining = snapshot.state.time_left;
            let tick_event = TimerEvent::TimerTick(TimerTick {
                session_id: sid.clone(),
                remaining_seconds: remaining,
                elapsed_seconds: total_seconds.saturating_sub(remaining),
                total_seconds,
                score: snapshot.state.score,
                timestamp: Utc::now(),
            });
            let event = Event::default()
                .event(tick_event.event_name())
                .data(tick_event.to_sse_data());

            sleep(tick_interval).await;

            Some((Ok(event), (service, sid, false, guard)))
        },
    )
}

/// Live leaderboard pushes for one board
/// GET /api/v1/leaderboards/{operation}/{mode}/stream
pub async fn leaderboard_stream(
    State(state): State<Arc<AppState>>,
    Path((operation, mode)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let (operation, mode) = parse_board(&operation, &mode)?;
    let subscription = state.leaderboards.subscribe(operation, mode).await;
    tracing::info!("Client subscribed to leaderboard {}/{}", operation, mode);

    Ok(Sse::new(create_leaderboard_stream(subscription)).keep_alive(KeepAlive::default()))
}

fn create_leaderboard_stream(
    subscription: LeaderboardSubscription,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let guard = SseConnectionGuard::open();
    stream::unfold(
        (subscription, guard),
        |(mut subscription, guard)| async move {
            let entries = subscription.next().await?;
            let data = serde_json::to_string(&entries).unwrap_or_else(|_| "[]".to_string());
            let event = Event::default().event("leaderboard").data(data);
            Some((Ok(event), (subscription, guard)))
        },
    )
}
