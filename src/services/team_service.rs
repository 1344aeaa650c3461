//! Actions sent from team devices.

use tracing::info;
use uuid::Uuid;

use crate::{
    dto::{
        operator::ActionResponse,
        snapshot::{Audience, EventSnapshot},
        team::{ConfirmStarRequest, SelectHorizontalRequest, SubmitAnswerRequest},
    },
    error::ServiceError,
    state::{
        Mutation, MutationMode, SharedState, rounds, transitions::mutate_with_broadcast,
    },
};

fn respond<T>(state: &SharedState, message: &str, mutation: Mutation<T>) -> ActionResponse {
    ActionResponse {
        message: message.to_owned(),
        snapshot: EventSnapshot::render(&mutation.snapshot, Audience::Public, state.now_ms()),
    }
}

/// Submit a free text answer to the active Round2 or Round3 question.
pub async fn submit_answer(
    state: &SharedState,
    team_id: Uuid,
    request: SubmitAnswerRequest,
) -> Result<ActionResponse, ServiceError> {
    let text = request.text;
    let mutation = mutate_with_broadcast(state, MutationMode::RequireExisting, |draft, rules| {
        rounds::submit_answer(draft, rules, team_id, text.clone())
    })
    .await?;
    info!(%team_id, "answer submitted");
    Ok(respond(state, "answer received", mutation))
}

/// Claim the Round2 vault buzzer.
pub async fn buzz_vault(state: &SharedState, team_id: Uuid) -> Result<ActionResponse, ServiceError> {
    let mutation = mutate_with_broadcast(state, MutationMode::RequireExisting, |draft, rules| {
        rounds::buzz_vault(draft, rules, team_id)
    })
    .await?;
    info!(%team_id, "vault buzz");
    Ok(respond(state, "vault buzz accepted", mutation))
}

/// Join the Round2 keyword queue.
pub async fn buzz_keyword(
    state: &SharedState,
    team_id: Uuid,
) -> Result<ActionResponse, ServiceError> {
    let mutation = mutate_with_broadcast(state, MutationMode::RequireExisting, |draft, rules| {
        rounds::buzz_keyword(draft, rules, team_id)
    })
    .await?;
    info!(%team_id, "keyword buzz");
    Ok(respond(state, "keyword buzz queued", mutation))
}

/// Claim the open Round4 steal window.
pub async fn buzz_steal(state: &SharedState, team_id: Uuid) -> Result<ActionResponse, ServiceError> {
    let mutation = mutate_with_broadcast(state, MutationMode::RequireExisting, |draft, rules| {
        rounds::buzz_steal(draft, rules, team_id)
    })
    .await?;
    info!(%team_id, "steal claimed");
    Ok(respond(state, "steal claimed", mutation))
}

/// Decide whether to spend the Round4 star on the next question.
pub async fn confirm_star(
    state: &SharedState,
    team_id: Uuid,
    request: ConfirmStarRequest,
) -> Result<ActionResponse, ServiceError> {
    let use_star = request.use_star;
    let mutation = mutate_with_broadcast(state, MutationMode::RequireExisting, |draft, rules| {
        rounds::confirm_star(draft, rules, team_id, use_star)
    })
    .await?;
    info!(%team_id, use_star, "star decision");
    Ok(respond(state, "star decision recorded", mutation))
}

/// Pick the Round2 horizontal question to play.
pub async fn select_horizontal(
    state: &SharedState,
    team_id: Uuid,
    request: SelectHorizontalRequest,
) -> Result<ActionResponse, ServiceError> {
    let index = request.index;
    let mutation = mutate_with_broadcast(state, MutationMode::RequireExisting, |draft, rules| {
        rounds::select_horizontal(draft, rules, team_id, index)
    })
    .await?;
    info!(%team_id, index, "horizontal selected");
    Ok(respond(state, "horizontal opened", mutation))
}
