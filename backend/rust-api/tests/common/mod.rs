#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use async_trait::async_trait;
use mathpractice_api::{
    config::Config,
    create_router,
    models::{
        game::{GameMode, Operation},
        player::PlayerRecord,
        score::{DedupeReport, LeaderboardEntry, SaveOutcome},
    },
    services::{
        score_store::{MemoryScoreStore, ScoreStore},
        AppState,
    },
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

/// A score store that fails every call, like an unreachable database.
pub struct UnreachableScoreStore;

#[async_trait]
impl ScoreStore for UnreachableScoreStore {
    fn backend_name(&self) -> &'static str {
        "unreachable"
    }

    async fn best_score(&self, _: Operation, _: GameMode, _: &str) -> anyhow::Result<i32> {
        anyhow::bail!("store down")
    }

    async fn save_if_higher(
        &self,
        _: Operation,
        _: GameMode,
        _: &str,
        _: i32,
    ) -> anyhow::Result<SaveOutcome> {
        anyhow::bail!("store down")
    }

    async fn leaderboard(
        &self,
        _: Operation,
        _: GameMode,
        _: usize,
    ) -> anyhow::Result<Vec<LeaderboardEntry>> {
        anyhow::bail!("store down")
    }

    async fn ensure_player(&self, _: &str) -> anyhow::Result<PlayerRecord> {
        anyhow::bail!("store down")
    }

    async fn dedupe(&self, _: Operation, _: GameMode) -> anyhow::Result<DedupeReport> {
        anyhow::bail!("store down")
    }

    async fn ping(&self) -> anyhow::Result<()> {
        anyhow::bail!("store down")
    }
}

/// Router on the in-memory store. The countdown is slowed down so games only
/// end when a test ends them.
pub fn create_test_app() -> (Router, Arc<AppState>) {
    create_test_app_with(Config {
        tick_interval_ms: 60_000,
        ..Config::default()
    })
}

pub fn create_test_app_with(config: Config) -> (Router, Arc<AppState>) {
    create_test_app_with_store(config, Arc::new(MemoryScoreStore::new()))
}

pub fn create_test_app_with_store(
    config: Config,
    scores: Arc<dyn ScoreStore>,
) -> (Router, Arc<AppState>) {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let state = Arc::new(AppState::with_store(config, scores));
    (create_router(state.clone()), state)
}

pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, json)
}

pub async fn start_game(app: &Router, username: &str, operation: &str, mode: &str) -> Value {
    let (status, json) = send(
        app,
        "POST",
        "/api/v1/games",
        Some(json!({
            "username": username,
            "operation": operation,
            "mode": mode,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "start failed: {}", json);
    json
}

pub async fn answer(app: &Router, session_id: &str, answer: &str) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        &format!("/api/v1/games/{}/answers", session_id),
        Some(json!({ "answer": answer })),
    )
    .await
}

/// Answers the current question correctly `count` times; returns the last reply.
pub async fn answer_correctly(app: &Router, session_id: &str, first: &Value, count: usize) -> Value {
    let mut question = first.clone();
    let mut last = Value::Null;
    for _ in 0..count {
        let expected = question["expected_answer"].as_i64().unwrap().to_string();
        let (status, reply) = answer(app, session_id, &expected).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["correct"], true);
        question = reply["question"].clone();
        last = reply;
    }
    last
}

pub async fn give_up(app: &Router, session_id: &str) -> Value {
    let (status, json) = send(
        app,
        "POST",
        &format!("/api/v1/games/{}/give-up", session_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "give up failed: {}", json);
    json
}
