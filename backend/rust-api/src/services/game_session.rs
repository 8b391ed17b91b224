use chrono::{DateTime, Utc};
use rand::Rng;

use super::{question_generator, scoring};
use crate::models::{
    game::{GameConfig, GameError, GameState, Question},
    FinalResult, GameSummary, SessionSnapshot, SessionStatus,
};

/// Result of feeding raw keypad input into an active session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Empty or non-numeric input; the session was not touched.
    Ignored,
    Scored {
        correct: bool,
        points_delta: i32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Running { time_left: u32 },
    Expired(FinalResult),
    /// The session is idle or already over; the countdown should stop.
    Stopped,
}

/// One play session: `Idle -> Active -> Ended`, with answers looping on Active.
///
/// The session owns its config, state and current question. All mutation goes
/// through `start`, `submit_answer`, `tick` and `finish`; once finished the
/// `finished` flag keeps late ticks or duplicate give-ups from producing a
/// second final result.
#[derive(Debug, Clone)]
pub struct GameSession {
    pub id: String,
    pub username: String,
    pub config: GameConfig,
    pub status: SessionStatus,
    pub state: GameState,
    pub question: Option<Question>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub summary: Option<GameSummary>,
    finished: bool,
}

impl GameSession {
    pub fn new(id: String, username: String, config: GameConfig, now: DateTime<Utc>) -> Self {
        Self {
            id,
            username,
            config,
            status: SessionStatus::Idle,
            state: GameState::new(config.mode, now),
            question: None,
            started_at: now,
            ended_at: None,
            summary: None,
            finished: false,
        }
    }

    /// Resets every counter and serves the first question.
    pub fn start<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Result<Question, GameError> {
        let state = GameState::new(self.config.mode, now);
        let question = question_generator::generate(&self.config, state.level, rng)?;

        self.state = state;
        self.question = Some(question);
        self.status = SessionStatus::Active;
        self.started_at = now;
        self.ended_at = None;
        self.summary = None;
        self.finished = false;

        Ok(question)
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    pub fn submit_answer<R: Rng + ?Sized>(
        &mut self,
        raw_answer: &str,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Result<Submission, GameError> {
        if !self.is_active() {
            return Err(GameError::SessionNotActive);
        }
        let question = self.question.ok_or(GameError::SessionNotActive)?;

        let Some(user_answer) = scoring::parse_answer(raw_answer) else {
            tracing::debug!(session = %self.id, "Ignoring non-numeric answer");
            return Ok(Submission::Ignored);
        };

        let elapsed_seconds =
            (now - self.state.question_started_at).num_milliseconds().max(0) as f64 / 1000.0;
        let (mut next, outcome) = scoring::submit(
            &self.state,
            &self.config,
            &question,
            user_answer,
            elapsed_seconds,
        );

        let next_question = question_generator::generate(&self.config, next.level, rng)?;
        next.question_started_at = now;

        self.state = next;
        self.question = Some(next_question);

        Ok(Submission::Scored {
            correct: outcome.correct,
            points_delta: outcome.points_delta,
        })
    }

    /// One countdown step. Reaching zero ends the session.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        if !self.is_active() {
            return TickOutcome::Stopped;
        }

        self.state.time_left = self.state.time_left.saturating_sub(1);
        if self.state.time_left > 0 {
            return TickOutcome::Running {
                time_left: self.state.time_left,
            };
        }

        match self.finish(now) {
            Some(result) => TickOutcome::Expired(result),
            None => TickOutcome::Stopped,
        }
    }

    /// Freezes the session. Returns the final result only the first time.
    pub fn finish(&mut self, now: DateTime<Utc>) -> Option<FinalResult> {
        if self.finished {
            return None;
        }
        self.finished = true;
        self.status = SessionStatus::Ended;
        self.ended_at = Some(now);

        Some(FinalResult {
            session_id: self.id.clone(),
            username: self.username.clone(),
            config: self.config,
            final_score: self.state.score,
            accuracy: self.state.accuracy(),
            medal_level: self.state.medal_level,
            total_questions: self.state.total_questions,
            correct_answers: self.state.correct_answers,
        })
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id.clone(),
            username: self.username.clone(),
            config: self.config,
            status: self.status,
            state: self.state.clone(),
            medal_tier: self.state.medal_tier(),
            accuracy: self.state.accuracy(),
            question: self.question,
            started_at: self.started_at,
            ended_at: self.ended_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::game::{GameMode, Operation};
    use chrono::Duration;
    use rand::{rngs::StdRng, SeedableRng};

    fn session(mode: GameMode) -> GameSession {
        let config = GameConfig {
            operation: Operation::Multiplication,
            mode,
            allow_negatives: false,
        };
        GameSession::new("s1".to_string(), "ada".to_string(), config, Utc::now())
    }

    fn current_answer(session: &GameSession) -> String {
        session.question.unwrap().expected_answer.to_string()
    }

    #[test]
    fn starts_idle_and_activates_on_start() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut s = session(GameMode::Mini);
        assert_eq!(s.status, SessionStatus::Idle);
        assert!(s.question.is_none());

        let q = s.start(&mut rng, Utc::now()).unwrap();
        assert_eq!(s.status, SessionStatus::Active);
        assert_eq!(s.question, Some(q));
        assert_eq!(s.state.time_left, 60);
    }

    #[test]
    fn rejects_answers_before_start() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut s = session(GameMode::Mini);
        assert_eq!(
            s.submit_answer("4", &mut rng, Utc::now()),
            Err(GameError::SessionNotActive)
        );
    }

    #[test]
    fn invalid_input_is_a_no_op() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut s = session(GameMode::Level);
        s.start(&mut rng, Utc::now()).unwrap();
        let before = s.state.clone();
        let question = s.question;

        for raw in ["", "   ", "abc", "-"] {
            assert_eq!(
                s.submit_answer(raw, &mut rng, Utc::now()),
                Ok(Submission::Ignored)
            );
        }
        assert_eq!(s.state, before);
        assert_eq!(s.question, question);
    }

    #[test]
    fn answers_are_timed_from_question_start() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut s = session(GameMode::Mini);
        let t0 = Utc::now();
        s.start(&mut rng, t0).unwrap();

        let answer = current_answer(&s);
        let result = s.submit_answer(&answer, &mut rng, t0 + Duration::seconds(1));
        assert_eq!(
            result,
            Ok(Submission::Scored {
                correct: true,
                points_delta: 5
            })
        );

        let answer = current_answer(&s);
        let t1 = t0 + Duration::seconds(1);
        let result = s.submit_answer(&answer, &mut rng, t1 + Duration::seconds(10));
        assert_eq!(
            result,
            Ok(Submission::Scored {
                correct: true,
                points_delta: 2
            })
        );
        assert_eq!(s.state.score, 7);
    }

    #[test]
    fn every_answer_serves_a_new_question() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut s = session(GameMode::Level);
        let now = Utc::now();
        s.start(&mut rng, now).unwrap();

        let wrong = (s.question.unwrap().expected_answer + 1).to_string();
        s.submit_answer(&wrong, &mut rng, now).unwrap();
        assert!(s.question.is_some());
        assert_eq!(s.state.score, -5);
        assert_eq!(s.state.total_questions, 1);
    }

    #[test]
    fn level_progression_feeds_the_generator() {
        let mut rng = StdRng::seed_from_u64(6);
        let mut s = session(GameMode::Level);
        let now = Utc::now();
        s.start(&mut rng, now).unwrap();
        for _ in 0..5 {
            let answer = current_answer(&s);
            s.submit_answer(&answer, &mut rng, now).unwrap();
        }
        assert_eq!(s.state.level, 2);
        let q = s.question.unwrap();
        assert!(q.expected_answer > 10 && q.expected_answer <= 50);
    }

    #[test]
    fn countdown_ends_the_game_once() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut s = session(GameMode::Mini);
        s.start(&mut rng, Utc::now()).unwrap();

        for expected in (1..60).rev() {
            assert_eq!(
                s.tick(Utc::now()),
                TickOutcome::Running {
                    time_left: expected
                }
            );
        }
        match s.tick(Utc::now()) {
            TickOutcome::Expired(result) => {
                assert_eq!(result.session_id, "s1");
                assert_eq!(result.final_score, 0);
                assert_eq!(result.accuracy, 0);
            }
            other => panic!("expected expiry, got {:?}", other),
        }
        assert_eq!(s.status, SessionStatus::Ended);
        assert_eq!(s.tick(Utc::now()), TickOutcome::Stopped);
        assert!(s.finish(Utc::now()).is_none());
    }

    #[test]
    fn give_up_freezes_state() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut s = session(GameMode::Mini);
        let now = Utc::now();
        s.start(&mut rng, now).unwrap();
        let answer = current_answer(&s);
        s.submit_answer(&answer, &mut rng, now).unwrap();

        let result = s.finish(now).unwrap();
        assert_eq!(result.final_score, 5);
        assert_eq!(result.accuracy, 100);
        assert_eq!(
            s.submit_answer("1", &mut rng, now),
            Err(GameError::SessionNotActive)
        );
        assert_eq!(s.state.score, 5);
    }

    #[test]
    fn restart_resets_counters() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut s = session(GameMode::Level);
        let now = Utc::now();
        s.start(&mut rng, now).unwrap();
        s.submit_answer("-99999", &mut rng, now).unwrap();
        s.finish(now);

        s.start(&mut rng, now).unwrap();
        assert_eq!(s.status, SessionStatus::Active);
        assert_eq!(s.state.score, 0);
        assert_eq!(s.state.total_questions, 0);
        assert_eq!(s.state.time_left, 180);
        assert!(s.finish(now).is_some());
    }
}
