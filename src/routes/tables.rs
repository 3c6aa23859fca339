use anyhow::Context;
use axum::{
    Extension,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use utoipa::IntoParams;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    common::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
        middleware,
    },
    models::{OrderEntity, RoomEntity},
    permissions::{Action, Actor},
    services::{
        orders, receipts,
        tables::{self, TableOverview},
    },
};

pub fn routes_with_openapi(state: AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest(
            "/rooms",
            OpenApiRouter::new()
                .routes(utoipa_axum::routes!(get_rooms))
                .routes(utoipa_axum::routes!(get_room_tables)),
        )
        .nest(
            "/tables/{table_id}/receipt",
            OpenApiRouter::new().routes(utoipa_axum::routes!(print_receipt, reset_receipt)),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::staff_authentication,
        ))
}

/// List every room of the restaurant.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Tables"],
    responses(
        (status = 200, description = "Get rooms successfully", body = StdResponse<Vec<RoomEntity>, String>)
    )
)]
async fn get_rooms(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    actor.authorize(Action::ViewFloor)?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let rooms = tables::list_rooms(conn).await?;

    Ok(StdResponse {
        data: Some(rooms),
        message: Some("Get rooms successfully"),
    })
}

/// List the tables of a room with the order each one is serving.
#[utoipa::path(
    get,
    path = "/{room_id}/tables",
    tags = ["Tables"],
    params(
        ("room_id" = i32, Path, description = "Room to list")
    ),
    responses(
        (status = 200, description = "Get tables successfully", body = StdResponse<Vec<TableOverview>, String>)
    )
)]
async fn get_room_tables(
    Path(room_id): Path<i32>,
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    actor.authorize(Action::ViewFloor)?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let tables = tables::list_tables(conn, room_id).await?;

    Ok(StdResponse {
        data: Some(tables),
        message: Some("Get tables successfully"),
    })
}

#[derive(Deserialize, IntoParams)]
struct PrintParams {
    /// Reprint a check that was already printed
    pub force: Option<bool>,
}

/// Print the check of the table's open order.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Tables"],
    params(
        ("table_id" = i32, Path, description = "Table to print the check for"),
        PrintParams
    ),
    responses(
        (status = 200, description = "Check printed successfully", body = StdResponse<OrderEntity, String>),
        (status = 409, description = "Check was already printed"),
        (status = 503, description = "Printer is unreachable")
    )
)]
async fn print_receipt(
    Path(table_id): Path<i32>,
    Query(params): Query<PrintParams>,
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    actor.authorize(Action::PrintCheck)?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order = orders::open_order_for_table(conn, table_id, &actor).await?;
    let order = receipts::print_check(
        conn,
        state.printer.as_ref(),
        state.aggregator.timezone(),
        &order,
        params.force.unwrap_or(false),
    )
    .await?;

    Ok(StdResponse {
        data: Some(order),
        message: Some("Check printed successfully"),
    })
}

/// Allow the table's check to be printed again.
#[utoipa::path(
    delete,
    path = "/",
    tags = ["Tables"],
    params(
        ("table_id" = i32, Path, description = "Table to reset")
    ),
    responses(
        (status = 200, description = "Check print reset successfully", body = StdResponse<OrderEntity, String>),
        (status = 409, description = "Check can already be printed")
    )
)]
async fn reset_receipt(
    Path(table_id): Path<i32>,
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    actor.authorize(Action::ResetCheckPrinted)?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order = receipts::reset_check_printed(conn, table_id).await?;

    Ok(StdResponse {
        data: Some(order),
        message: Some("Check print reset successfully"),
    })
}
