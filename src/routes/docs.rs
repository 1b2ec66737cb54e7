use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{services::documentation::ApiDoc, state::SharedState};

const SWAGGER_UI_PATH: &str = "/docs";
const OPENAPI_DOCUMENT_PATH: &str = "/api-doc/openapi.json";

/// Swagger UI for the command surface, plus the raw OpenAPI document it reads.
pub fn router() -> Router<SharedState> {
    SwaggerUi::new(SWAGGER_UI_PATH)
        .url(OPENAPI_DOCUMENT_PATH, ApiDoc::openapi())
        .into()
}
