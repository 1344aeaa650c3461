//! Business logic powering the quiz master routes. Each call is a single
//! mutation unit: reload, reconcile timers, run the round engine, commit,
//! broadcast.

use tracing::info;
use uuid::Uuid;

use crate::{
    dto::{
        operator::{
            ActionResponse, AssignPackageRequest, JudgeRequest, SelectTeamRequest,
            SelectTierRequest, StartQuestionRequest,
        },
        snapshot::{Audience, EventSnapshot},
    },
    error::ServiceError,
    state::{
        Mutation, MutationMode, SharedState,
        draft::EventDraft,
        error::{GameError, GameResult},
        event::RoundKind,
        rounds::{self, Verdict, round4::Tier},
        transitions::mutate_with_broadcast,
    },
};

fn respond<T>(state: &SharedState, message: String, mutation: Mutation<T>) -> ActionResponse {
    ActionResponse {
        message,
        snapshot: EventSnapshot::render(&mutation.snapshot, Audience::Operator, state.now_ms()),
    }
}

fn parse_round(round: u8) -> Result<RoundKind, ServiceError> {
    Ok(RoundKind::try_from(round)?)
}

/// Resolve a package number inside the active round.
fn package_by_number(draft: &EventDraft, number: u32) -> GameResult<Uuid> {
    let round = draft
        .event
        .round
        .kind()
        .ok_or_else(|| GameError::precondition("no round is active"))?;
    draft
        .content
        .packages_of(round)
        .into_iter()
        .find(|package| package.number == number)
        .map(|package| package.id)
        .ok_or_else(|| {
            GameError::not_found(format!(
                "package {number} of round {} not found",
                round.number()
            ))
        })
}

/// Activate a round with fresh sub-state.
pub async fn start_round(state: &SharedState, round: u8) -> Result<ActionResponse, ServiceError> {
    let round = parse_round(round)?;
    let mutation = mutate_with_broadcast(state, MutationMode::CreateIfMissing, |draft, _| {
        rounds::start_round(draft, round)
    })
    .await?;
    info!(
        round = round.number(),
        revision = mutation.snapshot.revision,
        "round started"
    );
    Ok(respond(
        state,
        format!("round {} started", round.number()),
        mutation,
    ))
}

/// Close the active round.
pub async fn end_round(state: &SharedState, round: u8) -> Result<ActionResponse, ServiceError> {
    let round = parse_round(round)?;
    let mutation = mutate_with_broadcast(state, MutationMode::RequireExisting, |draft, rules| {
        rounds::end_round(draft, rules, round)
    })
    .await?;
    info!(
        round = round.number(),
        revision = mutation.snapshot.revision,
        "round ended"
    );
    Ok(respond(
        state,
        format!("round {} ended", round.number()),
        mutation,
    ))
}

/// Forget the play progress of a round. Scores are kept.
pub async fn reset_round(state: &SharedState, round: u8) -> Result<ActionResponse, ServiceError> {
    let round = parse_round(round)?;
    let mutation = mutate_with_broadcast(state, MutationMode::CreateIfMissing, |draft, _| {
        rounds::reset_round(draft, round)
    })
    .await?;
    info!(round = round.number(), "round reset");
    Ok(respond(
        state,
        format!("round {} reset", round.number()),
        mutation,
    ))
}

/// Recreate the event from the roster and reset every package.
pub async fn reset_game(state: &SharedState) -> Result<ActionResponse, ServiceError> {
    let mutation = mutate_with_broadcast(state, MutationMode::CreateIfMissing, |draft, _| {
        rounds::reset_game(draft)
    })
    .await?;
    info!(revision = mutation.snapshot.revision, "game reset");
    Ok(respond(state, "game reset".into(), mutation))
}

/// Give the turn to a team.
pub async fn select_team(
    state: &SharedState,
    request: SelectTeamRequest,
) -> Result<ActionResponse, ServiceError> {
    let team_id = request.team_id;
    let mutation = mutate_with_broadcast(state, MutationMode::RequireExisting, |draft, rules| {
        rounds::select_team(draft, rules, team_id)
    })
    .await?;
    info!(%team_id, "team selected");
    Ok(respond(state, "team selected".into(), mutation))
}

/// Assign the package to play.
pub async fn assign_package(
    state: &SharedState,
    request: AssignPackageRequest,
) -> Result<ActionResponse, ServiceError> {
    let mutation = mutate_with_broadcast(state, MutationMode::RequireExisting, |draft, rules| {
        let package_id = match (request.package_id, request.number) {
            (Some(id), _) => id,
            (None, Some(number)) => package_by_number(draft, number)?,
            (None, None) => {
                return Err(GameError::validation("a package id or number is required"));
            }
        };
        rounds::assign_package(draft, rules, package_id)?;
        Ok(package_id)
    })
    .await?;
    info!(package_id = %mutation.value, "package assigned");
    Ok(respond(state, "package assigned".into(), mutation))
}

/// Start the next question of the active round.
pub async fn start_question(
    state: &SharedState,
    request: StartQuestionRequest,
) -> Result<ActionResponse, ServiceError> {
    let index = request.index;
    let mutation = mutate_with_broadcast(state, MutationMode::RequireExisting, |draft, rules| {
        rounds::start_question(draft, rules, index)
    })
    .await?;
    Ok(respond(state, "question started".into(), mutation))
}

/// Record a verdict.
pub async fn judge(
    state: &SharedState,
    request: JudgeRequest,
) -> Result<ActionResponse, ServiceError> {
    let verdict = Verdict::from(request.verdict);
    let mutation = mutate_with_broadcast(state, MutationMode::RequireExisting, |draft, rules| {
        rounds::judge(draft, rules, request.team_id, request.question_id, verdict)
    })
    .await?;
    info!(verdict = ?verdict, team_id = ?request.team_id, "answer judged");
    Ok(respond(state, "answer judged".into(), mutation))
}

/// Move the active round to its next phase.
pub async fn advance(state: &SharedState) -> Result<ActionResponse, ServiceError> {
    let mutation = mutate_with_broadcast(state, MutationMode::RequireExisting, |draft, rules| {
        rounds::advance(draft, rules)
    })
    .await?;
    Ok(respond(
        state,
        format!("advanced to {}", mutation.snapshot.event.round.phase_name()),
        mutation,
    ))
}

/// Pick the Round4 tier and draw its questions.
pub async fn select_tier(
    state: &SharedState,
    request: SelectTierRequest,
) -> Result<ActionResponse, ServiceError> {
    let tier = Tier::from(request.tier);
    let mutation = mutate_with_broadcast(state, MutationMode::RequireExisting, |draft, rules| {
        let mut rng = rand::rng();
        rounds::select_tier(draft, rules, tier, &mut rng)
    })
    .await?;
    info!(tier = ?tier, "tier selected");
    Ok(respond(state, "tier selected".into(), mutation))
}
