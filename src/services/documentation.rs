use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI document for the quiz backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::event_stream,
        crate::routes::public::public_event,
        crate::routes::operator::operator_event,
        crate::routes::operator::start_round,
        crate::routes::operator::end_round,
        crate::routes::operator::reset_round,
        crate::routes::operator::reset_game,
        crate::routes::operator::select_team,
        crate::routes::operator::assign_package,
        crate::routes::operator::start_question,
        crate::routes::operator::judge,
        crate::routes::operator::advance,
        crate::routes::operator::select_tier,
        crate::routes::team::submit_answer,
        crate::routes::team::buzz_vault,
        crate::routes::team::buzz_keyword,
        crate::routes::team::buzz_steal,
        crate::routes::team::confirm_star,
        crate::routes::team::select_horizontal,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::StorageProbe,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::snapshot::EventSnapshot,
            crate::dto::operator::ActionResponse,
            crate::error::ErrorBody,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "public", description = "Read-only event views"),
        (name = "operator", description = "Quiz master console"),
        (name = "team", description = "Team devices"),
    )
)]
/// OpenAPI description of every route.
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_operator_and_team_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/operator/judge"));
        assert!(doc.paths.paths.contains_key("/teams/{team_id}/buzz/steal"));
        assert!(doc.paths.paths.contains_key("/sse/events"));
    }
}
