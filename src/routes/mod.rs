use axum::Router;

use crate::state::SharedState;

/// Swagger UI and the OpenAPI document.
pub mod docs;
mod extract;
/// Liveness route.
pub mod health;
/// Quiz master console routes.
pub mod operator;
/// Read-only views.
pub mod public;
/// Event stream.
pub mod sse;
/// Team device routes.
pub mod team;

/// Compose every route tree and bind the shared state.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(public::router())
        .merge(operator::router())
        .merge(team::router())
        .merge(docs::router());

    api_router.with_state(state)
}
