use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};

use crate::{
    dto::{
        operator::{
            ActionResponse, AssignPackageRequest, JudgeRequest, SelectTeamRequest,
            SelectTierRequest, StartQuestionRequest,
        },
        snapshot::{Audience, EventSnapshot},
    },
    error::{AppError, ErrorBody},
    routes::extract::ValidJson,
    services::{operator_service, public_service},
    state::SharedState,
};

/// Routes used by the quiz master console.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/operator/event", get(operator_event))
        .route("/operator/rounds/{round}/start", post(start_round))
        .route("/operator/rounds/{round}/end", post(end_round))
        .route("/operator/rounds/{round}/reset", post(reset_round))
        .route("/operator/reset", post(reset_game))
        .route("/operator/team", post(select_team))
        .route("/operator/package", post(assign_package))
        .route("/operator/question/start", post(start_question))
        .route("/operator/judge", post(judge))
        .route("/operator/advance", post(advance))
        .route("/operator/tier", post(select_tier))
}

/// Current event including expected answers.
#[utoipa::path(
    get,
    path = "/operator/event",
    tag = "operator",
    responses(
        (status = 200, description = "Operator snapshot", body = EventSnapshot),
        (status = 503, description = "Storage unavailable", body = ErrorBody)
    )
)]
pub async fn operator_event(
    State(state): State<SharedState>,
) -> Result<Json<EventSnapshot>, AppError> {
    let snapshot = public_service::event_snapshot(&state, Audience::Operator).await?;
    Ok(Json(snapshot))
}

/// Activate a round.
#[utoipa::path(
    post,
    path = "/operator/rounds/{round}/start",
    tag = "operator",
    params(("round" = u8, Path, description = "Round number, 1 to 4")),
    responses(
        (status = 200, description = "Round started", body = ActionResponse),
        (status = 400, description = "Round already active or a timer is running", body = ErrorBody)
    )
)]
pub async fn start_round(
    State(state): State<SharedState>,
    Path(round): Path<u8>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(operator_service::start_round(&state, round).await?))
}

/// Close the active round.
#[utoipa::path(
    post,
    path = "/operator/rounds/{round}/end",
    tag = "operator",
    params(("round" = u8, Path, description = "Round number, 1 to 4")),
    responses(
        (status = 200, description = "Round ended", body = ActionResponse),
        (status = 400, description = "Round is not active", body = ErrorBody)
    )
)]
pub async fn end_round(
    State(state): State<SharedState>,
    Path(round): Path<u8>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(operator_service::end_round(&state, round).await?))
}

/// Reset the play progress of a round.
#[utoipa::path(
    post,
    path = "/operator/rounds/{round}/reset",
    tag = "operator",
    params(("round" = u8, Path, description = "Round number, 1 to 4")),
    responses((status = 200, description = "Round reset", body = ActionResponse))
)]
pub async fn reset_round(
    State(state): State<SharedState>,
    Path(round): Path<u8>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(operator_service::reset_round(&state, round).await?))
}

/// Recreate the event from the roster.
#[utoipa::path(
    post,
    path = "/operator/reset",
    tag = "operator",
    responses((status = 200, description = "Game reset", body = ActionResponse))
)]
pub async fn reset_game(State(state): State<SharedState>) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(operator_service::reset_game(&state).await?))
}

/// Give the turn to a team.
#[utoipa::path(
    post,
    path = "/operator/team",
    tag = "operator",
    request_body = SelectTeamRequest,
    responses(
        (status = 200, description = "Team selected", body = ActionResponse),
        (status = 404, description = "Unknown team", body = ErrorBody)
    )
)]
pub async fn select_team(
    State(state): State<SharedState>,
    ValidJson(payload): ValidJson<SelectTeamRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(operator_service::select_team(&state, payload).await?))
}

/// Assign the package to play.
#[utoipa::path(
    post,
    path = "/operator/package",
    tag = "operator",
    request_body = AssignPackageRequest,
    responses(
        (status = 200, description = "Package assigned", body = ActionResponse),
        (status = 404, description = "Unknown package", body = ErrorBody)
    )
)]
pub async fn assign_package(
    State(state): State<SharedState>,
    ValidJson(payload): ValidJson<AssignPackageRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(operator_service::assign_package(&state, payload).await?))
}

/// Start the next question.
#[utoipa::path(
    post,
    path = "/operator/question/start",
    tag = "operator",
    request_body = StartQuestionRequest,
    responses((status = 200, description = "Question started", body = ActionResponse))
)]
pub async fn start_question(
    State(state): State<SharedState>,
    ValidJson(payload): ValidJson<StartQuestionRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(operator_service::start_question(&state, payload).await?))
}

/// Judge the pending answer.
#[utoipa::path(
    post,
    path = "/operator/judge",
    tag = "operator",
    request_body = JudgeRequest,
    responses(
        (status = 200, description = "Verdict recorded", body = ActionResponse),
        (status = 400, description = "Nothing to judge", body = ErrorBody)
    )
)]
pub async fn judge(
    State(state): State<SharedState>,
    ValidJson(payload): ValidJson<JudgeRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(operator_service::judge(&state, payload).await?))
}

/// Move the active round to its next phase.
#[utoipa::path(
    post,
    path = "/operator/advance",
    tag = "operator",
    responses((status = 200, description = "Phase advanced", body = ActionResponse))
)]
pub async fn advance(State(state): State<SharedState>) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(operator_service::advance(&state).await?))
}

/// Pick the Round4 tier.
#[utoipa::path(
    post,
    path = "/operator/tier",
    tag = "operator",
    request_body = SelectTierRequest,
    responses((status = 200, description = "Questions drawn", body = ActionResponse))
)]
pub async fn select_tier(
    State(state): State<SharedState>,
    ValidJson(payload): ValidJson<SelectTierRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(operator_service::select_tier(&state, payload).await?))
}
