//! Requests accepted by the quiz master console.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    dto::snapshot::EventSnapshot,
    state::rounds::{Verdict, round4::Tier},
};

/// Give the turn to a team.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SelectTeamRequest {
    /// Team taking the turn.
    pub team_id: Uuid,
}

/// Pick the package to play, by identifier or by its number in the active round.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[validate(schema(function = "validate_package_reference"))]
pub struct AssignPackageRequest {
    /// Package identifier.
    #[serde(default)]
    pub package_id: Option<Uuid>,
    /// Package number within the active round.
    #[serde(default)]
    #[validate(range(min = 1))]
    pub number: Option<u32>,
}

fn validate_package_reference(request: &AssignPackageRequest) -> Result<(), ValidationError> {
    if request.package_id.is_some() == request.number.is_some() {
        let mut err = ValidationError::new("package_reference");
        err.message = Some("provide exactly one of `package_id` or `number`".into());
        return Err(err);
    }
    Ok(())
}

/// Start the next question. `index` picks a Round2 horizontal or a Round3 question.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct StartQuestionRequest {
    /// Horizontal or question to open. Required in Round2; Round3 defaults
    /// to the first unplayed question.
    #[serde(default)]
    #[validate(range(max = 255))]
    pub index: Option<usize>,
}

/// Operator verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VerdictDto {
    /// Award the question.
    Correct,
    /// Reject the answer.
    Wrong,
}

impl From<VerdictDto> for Verdict {
    fn from(value: VerdictDto) -> Self {
        match value {
            VerdictDto::Correct => Verdict::Correct,
            VerdictDto::Wrong => Verdict::Wrong,
        }
    }
}

/// Judge the pending answer. `team_id` targets one answer among several,
/// `question_id` overrides a Round1 question already timed out.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JudgeRequest {
    /// Outcome to record.
    pub verdict: VerdictDto,
    /// Team whose answer is judged.
    #[serde(default)]
    pub team_id: Option<Uuid>,
    /// Round1 question to re-judge.
    #[serde(default)]
    pub question_id: Option<Uuid>,
}

/// Round4 point tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TierDto {
    /// 10 to 20 points.
    Low,
    /// 10 to 30 points.
    Mid,
    /// 20 to 30 points.
    High,
}

impl From<TierDto> for Tier {
    fn from(value: TierDto) -> Self {
        match value {
            TierDto::Low => Tier::Low,
            TierDto::Mid => Tier::Mid,
            TierDto::High => Tier::High,
        }
    }
}

/// Choose the Round4 tier for the active team.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SelectTierRequest {
    /// Tier to draw from.
    pub tier: TierDto,
}

/// Acknowledgement returned by every mutating endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    /// Short description of what happened.
    pub message: String,
    /// Operator view after the operation.
    pub snapshot: EventSnapshot,
}
