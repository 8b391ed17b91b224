use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    game_session::{GameSession, Submission, TickOutcome},
    leaderboard_hub::LeaderboardHub,
    score_store::{normalize_username, ScoreStore},
    AppState,
};
use crate::metrics::{ANSWERS_SUBMITTED_TOTAL, GAMES_ACTIVE, GAMES_TOTAL};
use crate::models::{
    answer::SubmitAnswerResponse,
    game::{GameError, MedalTier, Question},
    FinalResult, GameSummary, SessionSnapshot, StartGameRequest, StartGameResponse,
};

/// Live sessions by id. Holding the lock serializes every engine call.
pub type SessionRegistry = Arc<Mutex<HashMap<String, GameSession>>>;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Game(#[from] GameError),
    #[error("{0}")]
    Invalid(String),
}

#[derive(Clone)]
pub struct SessionService {
    sessions: SessionRegistry,
    scores: Arc<dyn ScoreStore>,
    leaderboards: LeaderboardHub,
    tick_interval: Duration,
    leaderboard_limit: usize,
    session_retention: Duration,
}

impl SessionService {
    pub fn new(state: &AppState) -> Self {
        Self {
            sessions: state.sessions.clone(),
            scores: state.scores.clone(),
            leaderboards: state.leaderboards.clone(),
            tick_interval: Duration::from_millis(state.config.tick_interval_ms.max(1)),
            leaderboard_limit: state.config.leaderboard_limit,
            session_retention: Duration::from_millis(state.config.session_retention_ms),
        }
    }

    pub async fn start_game(
        &self,
        req: StartGameRequest,
    ) -> Result<StartGameResponse, SessionError> {
        let username = normalize_username(&req.username)
            .ok_or_else(|| SessionError::Invalid("username must not be blank".to_string()))?
            .to_string();
        let config = req.config();
        let session_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let response = {
            let mut sessions = self.sessions.lock().await;

            // A player has one live game at a time.
            let stale: Vec<String> = sessions
                .iter()
                .filter(|(_, session)| session.username == username)
                .map(|(id, _)| id.clone())
                .collect();
            for id in stale {
                if let Some(old) = sessions.remove(&id) {
                    if old.is_active() {
                        GAMES_TOTAL.with_label_values(&["abandoned"]).inc();
                        GAMES_ACTIVE.dec();
                    }
                    tracing::debug!("Discarded previous session {} for {}", id, username);
                }
            }

            let mut session = GameSession::new(session_id.clone(), username.clone(), config, now);
            let question = {
                let mut rng = rand::rng();
                session.start(&mut rng, now)?
            };
            let response = StartGameResponse {
                session_id: session_id.clone(),
                question,
                state: session.state.clone(),
                time_limit_seconds: config.mode.time_limit_seconds(),
            };
            sessions.insert(session_id.clone(), session);
            response
        };

        GAMES_TOTAL.with_label_values(&["started"]).inc();
        GAMES_ACTIVE.inc();
        tracing::info!(
            "Game started: {} for user: {} ({}/{}, negatives={})",
            session_id,
            username,
            config.operation,
            config.mode,
            config.allow_negatives
        );

        self.spawn_countdown(session_id);
        Ok(response)
    }

    pub async fn get_session(&self, session_id: &str) -> Result<SessionSnapshot, SessionError> {
        let sessions = self.sessions.lock().await;
        sessions
            .get(session_id)
            .map(GameSession::snapshot)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    pub async fn submit_answer(
        &self,
        session_id: &str,
        raw_answer: &str,
    ) -> Result<SubmitAnswerResponse, SessionError> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        let answered: Option<Question> = session.question;
        let submission = {
            let mut rng = rand::rng();
            session.submit_answer(raw_answer, &mut rng, Utc::now())?
        };
        let question = session.question.ok_or(GameError::SessionNotActive)?;

        let response = match submission {
            Submission::Ignored => SubmitAnswerResponse {
                accepted: false,
                correct: false,
                points_delta: 0,
                state: session.state.clone(),
                question,
                feedback: None,
            },
            Submission::Scored {
                correct,
                points_delta,
            } => {
                ANSWERS_SUBMITTED_TOTAL
                    .with_label_values(&[if correct { "true" } else { "false" }])
                    .inc();
                let feedback = if correct {
                    "Correct!".to_string()
                } else {
                    match answered {
                        Some(q) => format!("Wrong! The answer was {}", q.expected_answer),
                        None => "Wrong!".to_string(),
                    }
                };
                SubmitAnswerResponse {
                    accepted: true,
                    correct,
                    points_delta,
                    state: session.state.clone(),
                    question,
                    feedback: Some(feedback),
                }
            }
        };

        Ok(response)
    }

    /// Ends the game now and persists the result.
    pub async fn give_up(&self, session_id: &str) -> Result<GameSummary, SessionError> {
        let result = {
            let mut sessions = self.sessions.lock().await;
            let session = sessions
                .get_mut(session_id)
                .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
            match session.finish(Utc::now()) {
                Some(result) => result,
                None => {
                    return session
                        .summary
                        .clone()
                        .ok_or(SessionError::Game(GameError::SessionNotActive));
                }
            }
        };

        tracing::info!("Game given up: {}", session_id);
        Ok(self.finalize(result).await)
    }

    /// The end-of-game summary, or `None` while the game is still running.
    pub async fn summary(&self, session_id: &str) -> Result<Option<GameSummary>, SessionError> {
        let sessions = self.sessions.lock().await;
        sessions
            .get(session_id)
            .map(|session| session.summary.clone())
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    /// Persists a frozen result. Store failures degrade the summary but never
    /// fail the call.
    pub async fn finalize(&self, result: FinalResult) -> GameSummary {
        let operation = result.config.operation;
        let mode = result.config.mode;
        let mut store_available = true;

        let is_new_best = match self
            .scores
            .save_if_higher(operation, mode, &result.username, result.final_score)
            .await
        {
            Ok(outcome) => outcome.saved,
            Err(e) => {
                tracing::warn!("Failed to save score for {}: {:#}", result.session_id, e);
                store_available = false;
                false
            }
        };

        let best_score = match self
            .scores
            .best_score(operation, mode, &result.username)
            .await
        {
            Ok(best) => best,
            Err(e) => {
                tracing::warn!("Failed to load best score for {}: {:#}", result.username, e);
                store_available = false;
                result.final_score
            }
        };

        let leaderboard = match self
            .scores
            .leaderboard(operation, mode, self.leaderboard_limit)
            .await
        {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Failed to load leaderboard {}/{}: {:#}", operation, mode, e);
                store_available = false;
                Vec::new()
            }
        };

        if is_new_best && store_available {
            self.leaderboards
                .publish(operation, mode, leaderboard.clone())
                .await;
        }

        let summary = GameSummary {
            session_id: result.session_id.clone(),
            username: result.username.clone(),
            operation,
            mode,
            final_score: result.final_score,
            accuracy: result.accuracy,
            total_questions: result.total_questions,
            correct_answers: result.correct_answers,
            medal_level: result.medal_level,
            medal_tier: MedalTier::from_level(result.medal_level),
            best_score,
            is_new_best,
            leaderboard,
            store_available,
        };

        let stored = match self.sessions.lock().await.get_mut(&result.session_id) {
            Some(session) => {
                session.summary = Some(summary.clone());
                true
            }
            None => false,
        };
        if stored {
            self.schedule_eviction(result.session_id.clone());
        }

        GAMES_TOTAL.with_label_values(&["finished"]).inc();
        GAMES_ACTIVE.dec();
        tracing::info!(
            "Game finished: {} score={} accuracy={}% new_best={}",
            result.session_id,
            result.final_score,
            result.accuracy,
            is_new_best
        );

        summary
    }

    /// Drops an ended session once its summary has been readable for the
    /// retention period.
    fn schedule_eviction(&self, session_id: String) {
        let sessions = self.sessions.clone();
        let retention = self.session_retention;
        tokio::spawn(async move {
            tokio::time::sleep(retention).await;
            let mut sessions = sessions.lock().await;
            if sessions
                .get(&session_id)
                .is_some_and(|session| session.summary.is_some())
            {
                sessions.remove(&session_id);
                tracing::debug!("Evicted ended session {}", session_id);
            }
        });
    }

    fn spawn_countdown(&self, session_id: String) {
        let service = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(service.tick_interval);
            // The first tick completes immediately.
            interval.tick().await;

            loop {
                interval.tick().await;
                let outcome = {
                    let mut sessions = service.sessions.lock().await;
                    match sessions.get_mut(&session_id) {
                        Some(session) => session.tick(Utc::now()),
                        None => TickOutcome::Stopped,
                    }
                };

                match outcome {
                    TickOutcome::Running { .. } => continue,
                    TickOutcome::Expired(result) => {
                        tracing::info!("Time expired: session={}", session_id);
                        service.finalize(result).await;
                        break;
                    }
                    TickOutcome::Stopped => break,
                }
            }
        });
    }
}
