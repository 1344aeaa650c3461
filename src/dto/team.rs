//! Requests sent from team devices.

use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::dto::validation::validate_answer_text;

/// Free text answer to the active question.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SubmitAnswerRequest {
    /// Answer as typed, at most 280 characters.
    #[validate(length(max = 280), custom(function = "validate_answer_text"))]
    pub text: String,
}

/// Round4 star power decision.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ConfirmStarRequest {
    /// Double the stake on the coming question.
    pub use_star: bool,
}

/// Round2 horizontal the team holding the turn wants to play.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SelectHorizontalRequest {
    /// Horizontal position in the puzzle.
    #[validate(range(max = 255))]
    pub index: usize,
}
