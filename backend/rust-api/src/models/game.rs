use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

pub const MIN_LEVEL: u8 = 1;
pub const MAX_LEVEL: u8 = 8;
pub const BEST_MEDAL_LEVEL: u8 = 1;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GameError {
    #[error("invalid level {0}: expected 1..=8")]
    InvalidLevel(u8),
    #[error("unknown operation: {0}")]
    UnknownOperation(String),
    #[error("unknown game mode: {0}")]
    UnknownMode(String),
    #[error("game session is not active")]
    SessionNotActive,
    #[error("invalid answer: {0:?}")]
    InvalidAnswer(String),
}

/// Operation the player picked on the main menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Addition,
    Subtraction,
    Multiplication,
    Division,
    Mixed,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Addition,
        Operation::Subtraction,
        Operation::Multiplication,
        Operation::Division,
        Operation::Mixed,
    ];

    /// Operations a mixed game draws from.
    pub const BASE: [Operation; 4] = [
        Operation::Multiplication,
        Operation::Addition,
        Operation::Subtraction,
        Operation::Division,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Addition => "addition",
            Operation::Subtraction => "subtraction",
            Operation::Multiplication => "multiplication",
            Operation::Division => "division",
            Operation::Mixed => "mixed",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = GameError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "addition" => Ok(Operation::Addition),
            "subtraction" => Ok(Operation::Subtraction),
            "multiplication" => Ok(Operation::Multiplication),
            "division" => Ok(Operation::Division),
            "mixed" => Ok(Operation::Mixed),
            _ => Err(GameError::UnknownOperation(value.to_string())),
        }
    }
}

/// Session flavour: a short fixed-range sprint or the 8-tier progressive game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    Mini,
    Level,
}

impl GameMode {
    pub const ALL: [GameMode; 2] = [GameMode::Mini, GameMode::Level];

    pub fn as_str(&self) -> &'static str {
        match self {
            GameMode::Mini => "mini",
            GameMode::Level => "level",
        }
    }

    pub fn time_limit_seconds(&self) -> u32 {
        match self {
            GameMode::Mini => 60,
            GameMode::Level => 180,
        }
    }

    pub fn initial_medal_level(&self) -> u8 {
        match self {
            GameMode::Mini => 5,
            GameMode::Level => 10,
        }
    }

    /// Consecutive correct answers needed to improve the medal by one step.
    pub fn medal_streak_threshold(&self) -> u32 {
        match self {
            GameMode::Mini => 4,
            GameMode::Level => 5,
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameMode {
    type Err = GameError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "mini" => Ok(GameMode::Mini),
            "level" => Ok(GameMode::Level),
            _ => Err(GameError::UnknownMode(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "−")]
    Subtract,
    #[serde(rename = "×")]
    Multiply,
    #[serde(rename = "÷")]
    Divide,
}

impl Operator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Subtract => "−",
            Operator::Multiply => "×",
            Operator::Divide => "÷",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    pub operation: Operation,
    pub mode: GameMode,
    #[serde(default)]
    pub allow_negatives: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub operand1: i32,
    pub operand2: i32,
    pub operator: Operator,
    pub expected_answer: i32,
}

impl Question {
    /// Builds a question whose answer is computed from the operands as displayed.
    /// Division goes through [`Question::division`] instead.
    pub fn new(operand1: i32, operand2: i32, operator: Operator) -> Self {
        let expected_answer = match operator {
            Operator::Add => operand1 + operand2,
            Operator::Subtract => operand1 - operand2,
            Operator::Multiply => operand1 * operand2,
            Operator::Divide => {
                if operand2 == 0 {
                    0
                } else {
                    operand1 / operand2
                }
            }
        };

        Self {
            operand1,
            operand2,
            operator,
            expected_answer,
        }
    }

    /// Division is built backwards from its answer so the dividend is always
    /// an exact multiple of the divisor.
    pub fn division(answer: i32, divisor: i32) -> Self {
        Self {
            operand1: answer * divisor,
            operand2: divisor,
            operator: Operator::Divide,
            expected_answer: answer,
        }
    }

    pub fn display(&self) -> String {
        format!(
            "{} {} {} = ?",
            self.operand1,
            self.operator.symbol(),
            self.operand2
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MedalTier {
    Gold,
    Silver,
    Bronze,
    Gray,
}

impl MedalTier {
    pub fn from_level(medal_level: u8) -> Self {
        match medal_level {
            0 | 1 => MedalTier::Gold,
            2 => MedalTier::Silver,
            3 => MedalTier::Bronze,
            _ => MedalTier::Gray,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub score: i32,
    pub level: u8,
    pub correct_streak: u32,
    pub medal_streak: u32,
    pub medal_level: u8,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub time_left: u32,
    pub question_started_at: DateTime<Utc>,
}

impl GameState {
    pub fn new(mode: GameMode, now: DateTime<Utc>) -> Self {
        Self {
            score: 0,
            level: MIN_LEVEL,
            correct_streak: 0,
            medal_streak: 0,
            medal_level: mode.initial_medal_level(),
            total_questions: 0,
            correct_answers: 0,
            time_left: mode.time_limit_seconds(),
            question_started_at: now,
        }
    }

    pub fn accuracy(&self) -> u32 {
        crate::services::scoring::accuracy(self.correct_answers, self.total_questions)
    }

    pub fn medal_tier(&self) -> MedalTier {
        MedalTier::from_level(self.medal_level)
    }
}
