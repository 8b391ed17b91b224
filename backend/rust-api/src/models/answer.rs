use serde::{Deserialize, Serialize};

use super::game::{GameState, Question};

#[derive(Debug, Deserialize)]
pub struct SubmitAnswerRequest {
    pub answer: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitAnswerResponse {
    /// False when the input was empty or not a number; nothing changed.
    pub accepted: bool,
    pub correct: bool,
    pub points_delta: i32,
    pub state: GameState,
    pub question: Question,
    pub feedback: Option<String>,
}
