use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Trivia Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::commands::start_trivia,
        crate::routes::commands::stop,
        crate::routes::commands::force_stop,
        crate::routes::commands::session_status,
        crate::routes::commands::leaderboard,
        crate::routes::commands::list_categories,
        crate::routes::sse::cards_stream,
        crate::routes::gateway::gateway_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::commands::StartTriviaRequest,
            crate::dto::commands::StartTriviaResponse,
            crate::dto::commands::StopResponse,
            crate::dto::commands::ForceStopRequest,
            crate::dto::commands::ForceStopResponse,
            crate::dto::commands::SessionStatusResponse,
            crate::dto::commands::CategoryResponse,
            crate::dto::card::Card,
            crate::dto::card::CardKind,
            crate::dto::card::CardAuthor,
            crate::dto::card::CardField,
            crate::dto::gateway::GatewayInbound,
            crate::dto::gateway::GatewayAck,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::state::state_machine::FinishReason,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "commands", description = "Trivia commands issued by the chat adapter"),
        (name = "sse", description = "Server-sent card stream"),
        (name = "gateway", description = "WebSocket gateway for reactions and member updates"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_the_command_surface() {
        let doc = ApiDoc::openapi();
        for path in [
            "/channels/{channel_id}/trivia",
            "/channels/{channel_id}/force-stop",
            "/leaderboard",
            "/sse/cards",
            "/gateway",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
