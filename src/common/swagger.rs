use axum::Router;
use utoipa::openapi::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::app_state::AppState;

/// Serves the generated document at `/api-docs/openapi.json` and the UI at `/swagger-ui`.
pub fn create_swagger_ui(openapi: OpenApi) -> Router<AppState> {
    Router::new().merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
}
