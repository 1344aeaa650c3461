use axum::{
    Json, Router,
    extract::State,
    http::header::CACHE_CONTROL,
    response::IntoResponse,
    routing::get,
};

use crate::{dto::health::HealthResponse, services::health_service, state::SharedState};

/// Answers 200 in degraded mode too.
#[utoipa::path(
    get,
    path = "/healthcheck",
    tag = "health",
    responses(
        (status = 200, description = "Liveness plus the result of a storage ping; \
            `status` is `degraded` while no backend is installed", body = HealthResponse)
    )
)]
pub async fn healthcheck(State(state): State<SharedState>) -> impl IntoResponse {
    let report = health_service::health_status(&state).await;
    ([(CACHE_CONTROL, "no-store")], Json(report))
}

/// Liveness route.
pub fn router() -> Router<SharedState> {
    Router::new().route("/healthcheck", get(healthcheck))
}
