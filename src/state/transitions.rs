use crate::{
    config::GameRules,
    error::ServiceError,
    services::sse_events::broadcast_snapshot,
    state::{Mutation, MutationMode, SharedState, draft::EventDraft, error::GameResult},
};

/// Run a mutation, then publish the resulting snapshot when something was written.
pub async fn mutate_with_broadcast<T, F>(
    state: &SharedState,
    mode: MutationMode,
    work: F,
) -> Result<Mutation<T>, ServiceError>
where
    F: FnMut(&mut EventDraft, &GameRules) -> GameResult<T>,
{
    let mutation = state.run_mutation(mode, work).await?;
    if mutation.changed {
        broadcast_snapshot(state, &mutation.snapshot);
    }
    Ok(mutation)
}
