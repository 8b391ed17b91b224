use crate::models::game::{
    GameConfig, GameMode, GameState, Question, BEST_MEDAL_LEVEL, MAX_LEVEL, MIN_LEVEL,
};

pub const WRONG_ANSWER_PENALTY: i32 = 5;
const BUCKET_SECONDS: f64 = 3.0;
const MINI_BASE_POINTS: i32 = 6;
const LEVEL_BASE_POINTS: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub correct: bool,
    pub points_delta: i32,
}

/// Answers arrive as raw text from the keypad. Anything that is not an
/// optionally signed integer is rejected so the caller can ignore it.
pub fn parse_answer(raw: &str) -> Option<i32> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<i32>().ok()
}

/// 3-second response bucket: (0, 3] → 1, (3, 6] → 2, ... never below 1.
pub fn time_bucket(elapsed_seconds: f64) -> i32 {
    let elapsed = if elapsed_seconds.is_finite() {
        elapsed_seconds.max(0.0)
    } else {
        0.0
    };
    ((elapsed / BUCKET_SECONDS).ceil() as i32).max(1)
}

pub fn points_for(mode: GameMode, level: u8, elapsed_seconds: f64) -> i32 {
    let bucket = time_bucket(elapsed_seconds);
    let points = match mode {
        GameMode::Mini => MINI_BASE_POINTS - bucket,
        // 5 + level for the first bucket, one less per bucket after.
        GameMode::Level => LEVEL_BASE_POINTS + i32::from(level) + 1 - bucket,
    };
    points.max(1)
}

pub fn level_streak_threshold(level: u8) -> u32 {
    match level {
        6 | 7 => 10,
        _ => 5,
    }
}

pub fn accuracy(correct_answers: u32, total_questions: u32) -> u32 {
    if total_questions == 0 {
        return 0;
    }
    (f64::from(correct_answers) / f64::from(total_questions) * 100.0).round() as u32
}

/// Applies one parsed answer to the state and returns the successor state.
///
/// Level streaks only move in level mode; the medal streak counts correct
/// answers in both modes and is left alone by mistakes.
pub fn submit(
    state: &GameState,
    config: &GameConfig,
    question: &Question,
    user_answer: i32,
    elapsed_seconds: f64,
) -> (GameState, AnswerOutcome) {
    let mut next = state.clone();
    next.total_questions += 1;

    let correct = user_answer == question.expected_answer;
    let points_delta = if correct {
        next.correct_answers += 1;
        let points = points_for(config.mode, state.level, elapsed_seconds);
        next.score += points;

        if config.mode == GameMode::Level {
            next.correct_streak += 1;
            if next.correct_streak >= level_streak_threshold(next.level) && next.level < MAX_LEVEL
            {
                next.level += 1;
                next.correct_streak = 0;
            }
        }

        next.medal_streak += 1;
        if next.medal_streak >= config.mode.medal_streak_threshold()
            && next.medal_level > BEST_MEDAL_LEVEL
        {
            next.medal_level -= 1;
            next.medal_streak = 0;
        }

        points
    } else {
        next.score -= WRONG_ANSWER_PENALTY;

        if config.mode == GameMode::Level {
            next.correct_streak = 0;
            if next.level > MIN_LEVEL {
                next.level -= 1;
            }
        }

        -WRONG_ANSWER_PENALTY
    };

    (
        next,
        AnswerOutcome {
            correct,
            points_delta,
        },
    )
}
