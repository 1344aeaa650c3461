use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::snapshot::{Audience, EventSnapshot},
    error::{AppError, ErrorBody},
    services::public_service,
    state::SharedState,
};

/// Read-only routes for scoreboards and team devices.
pub fn router() -> Router<SharedState> {
    Router::new().route("/event", get(public_event))
}

/// Current event without answers.
#[utoipa::path(
    get,
    path = "/event",
    tag = "public",
    responses(
        (status = 200, description = "Public snapshot", body = EventSnapshot),
        (status = 503, description = "Storage unavailable", body = ErrorBody)
    )
)]
pub async fn public_event(
    State(state): State<SharedState>,
) -> Result<Json<EventSnapshot>, AppError> {
    let snapshot = public_service::event_snapshot(&state, Audience::Public).await?;
    Ok(Json(snapshot))
}
