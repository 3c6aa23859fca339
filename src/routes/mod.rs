pub mod menu;
pub mod orders;
pub mod statistics;
pub mod tables;

use utoipa_axum::router::OpenApiRouter;

use crate::common::app_state::AppState;

/// Every documented route of the service.
pub fn routes_with_openapi(state: AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .merge(tables::routes_with_openapi(state.clone()))
        .merge(orders::routes_with_openapi(state.clone()))
        .merge(menu::routes_with_openapi(state.clone()))
        .merge(statistics::routes_with_openapi(state))
}
