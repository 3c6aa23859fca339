use anyhow::Result;
use axum::Router;
use restobook_orderservice::{
    common::{
        app_state::AppState,
        bootstrap::{self, bootstrap},
        config, db, swagger,
    },
    printing, routes,
    services::statistics::Aggregator,
};

#[tokio::main]
async fn main() -> Result<()> {
    bootstrap::init_env();
    bootstrap::init_tracing();

    let config = config::load()?;

    tracing::info!("Running migrations...");
    let migrations_count =
        db::run_migrations_blocking(db::MIGRATIONS, &config.database.url).await?;
    tracing::info!("Run {} new migrations successfully", migrations_count);

    let state = AppState {
        db_pool: db::create_pool(&config.database.url, config.database.pool_size).await?,
        printer: printing::printer_from_config(&config.printer)?,
        aggregator: Aggregator::new(config.business.timezone),
    };
    tracing::info!(
        printer = %state.printer.name(),
        timezone = %config.business.timezone,
        "Services configured"
    );

    let routes = routes::routes_with_openapi(state.clone());

    let mut openapi = routes.get_openapi().clone();
    openapi.info = utoipa::openapi::InfoBuilder::new()
        .title("RestoBook OrderService API")
        .version("1.0.0")
        .build();
    let swagger_ui = swagger::create_swagger_ui(openapi);

    let app = Router::new().merge(routes).merge(swagger_ui);

    tracing::info!("Bootstrapping...");
    bootstrap("OrderService", app, state, &config.server).await?;
    Ok(())
}
