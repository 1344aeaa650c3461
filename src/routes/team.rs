use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use uuid::Uuid;

use crate::{
    dto::{
        operator::ActionResponse,
        team::{ConfirmStarRequest, SelectHorizontalRequest, SubmitAnswerRequest},
    },
    error::{AppError, ErrorBody},
    routes::extract::ValidJson,
    services::team_service,
    state::SharedState,
};

/// Routes used by team devices.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/teams/{team_id}/answer", post(submit_answer))
        .route("/teams/{team_id}/buzz/vault", post(buzz_vault))
        .route("/teams/{team_id}/buzz/keyword", post(buzz_keyword))
        .route("/teams/{team_id}/buzz/steal", post(buzz_steal))
        .route("/teams/{team_id}/star", post(confirm_star))
        .route("/teams/{team_id}/horizontal", post(select_horizontal))
}

/// Submit an answer to the active question.
#[utoipa::path(
    post,
    path = "/teams/{team_id}/answer",
    tag = "team",
    params(("team_id" = Uuid, Path, description = "Submitting team")),
    request_body = SubmitAnswerRequest,
    responses(
        (status = 200, description = "Answer recorded", body = ActionResponse),
        (status = 400, description = "Submissions are closed", body = ErrorBody)
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    Path(team_id): Path<Uuid>,
    ValidJson(payload): ValidJson<SubmitAnswerRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(
        team_service::submit_answer(&state, team_id, payload).await?,
    ))
}

/// Lock the Round2 vault buzzer.
#[utoipa::path(
    post,
    path = "/teams/{team_id}/buzz/vault",
    tag = "team",
    params(("team_id" = Uuid, Path, description = "Buzzing team")),
    responses((status = 200, description = "Vault locked", body = ActionResponse))
)]
pub async fn buzz_vault(
    State(state): State<SharedState>,
    Path(team_id): Path<Uuid>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(team_service::buzz_vault(&state, team_id).await?))
}

/// Join the Round2 keyword queue.
#[utoipa::path(
    post,
    path = "/teams/{team_id}/buzz/keyword",
    tag = "team",
    params(("team_id" = Uuid, Path, description = "Buzzing team")),
    responses((status = 200, description = "Buzz queued", body = ActionResponse))
)]
pub async fn buzz_keyword(
    State(state): State<SharedState>,
    Path(team_id): Path<Uuid>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(team_service::buzz_keyword(&state, team_id).await?))
}

/// Claim the Round4 steal window.
#[utoipa::path(
    post,
    path = "/teams/{team_id}/buzz/steal",
    tag = "team",
    params(("team_id" = Uuid, Path, description = "Buzzing team")),
    responses(
        (status = 200, description = "Steal claimed", body = ActionResponse),
        (status = 400, description = "Window closed or already claimed", body = ErrorBody)
    )
)]
pub async fn buzz_steal(
    State(state): State<SharedState>,
    Path(team_id): Path<Uuid>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(team_service::buzz_steal(&state, team_id).await?))
}

/// Decide on the Round4 star power.
#[utoipa::path(
    post,
    path = "/teams/{team_id}/star",
    tag = "team",
    params(("team_id" = Uuid, Path, description = "Active team")),
    request_body = ConfirmStarRequest,
    responses((status = 200, description = "Decision recorded", body = ActionResponse))
)]
pub async fn confirm_star(
    State(state): State<SharedState>,
    Path(team_id): Path<Uuid>,
    ValidJson(payload): ValidJson<ConfirmStarRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(
        team_service::confirm_star(&state, team_id, payload).await?,
    ))
}

/// Pick the Round2 horizontal to play.
#[utoipa::path(
    post,
    path = "/teams/{team_id}/horizontal",
    tag = "team",
    params(("team_id" = Uuid, Path, description = "Team holding the turn")),
    request_body = SelectHorizontalRequest,
    responses((status = 200, description = "Horizontal opened", body = ActionResponse))
)]
pub async fn select_horizontal(
    State(state): State<SharedState>,
    Path(team_id): Path<Uuid>,
    ValidJson(payload): ValidJson<SelectHorizontalRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(
        team_service::select_horizontal(&state, team_id, payload).await?,
    ))
}
