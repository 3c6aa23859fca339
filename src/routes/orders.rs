use anyhow::Context;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;

use crate::{
    common::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
        middleware,
    },
    models::OrderEntity,
    permissions::{Action, Actor},
    services::{
        orders::{self, CheckoutResult, ItemRequest, OrderDetails, RemovalOutcome},
        tables,
    },
};

/// Order routes, addressed by the table the order is served at.
pub fn routes_with_openapi(state: AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/tables/{table_id}/order",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_order, create_order))
            .routes(utoipa_axum::routes!(add_item, remove_item))
            .routes(utoipa_axum::routes!(add_items))
            .routes(utoipa_axum::routes!(close_order))
            .routes(utoipa_axum::routes!(reassign_table))
            .routes(utoipa_axum::routes!(reassign_waitress))
            .route_layer(axum::middleware::from_fn_with_state(
                state,
                middleware::staff_authentication,
            )),
    )
}

#[derive(Serialize, ToSchema)]
struct GetOrderRes {
    #[serde(flatten)]
    pub details: OrderDetails,
    pub can_print_receipt: bool,
}

/// Fetch the open order of a table with its items.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Orders"],
    params(
        ("table_id" = i32, Path, description = "Table serving the order")
    ),
    responses(
        (status = 200, description = "Get order successfully", body = StdResponse<GetOrderRes, String>),
        (status = 404, description = "Table has no open order")
    )
)]
async fn get_order(
    Path(table_id): Path<i32>,
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    actor.authorize(Action::ViewOrder)?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order = orders::open_order_for_table(conn, table_id, &actor).await?;
    let can_print_receipt = tables::receipt_printable(Some(&order));
    let details = orders::load_details(conn, order).await?;

    Ok(StdResponse {
        data: Some(GetOrderRes {
            details,
            can_print_receipt,
        }),
        message: Some("Get order successfully"),
    })
}

/// Open a new order on an empty table.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Orders"],
    params(
        ("table_id" = i32, Path, description = "Table to open the order on")
    ),
    responses(
        (status = 200, description = "Order created successfully", body = StdResponse<OrderEntity, String>),
        (status = 409, description = "Table already has an open order")
    )
)]
async fn create_order(
    Path(table_id): Path<i32>,
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    actor.authorize(Action::CreateOrder)?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order = orders::create_order(conn, table_id, &actor).await?;

    Ok(StdResponse {
        data: Some(order),
        message: Some("Order created successfully"),
    })
}

/// Add a meal to the open order. Adding a meal that is already on the order raises its quantity.
#[utoipa::path(
    post,
    path = "/items",
    tags = ["Orders"],
    params(
        ("table_id" = i32, Path, description = "Table serving the order")
    ),
    request_body = ItemRequest,
    responses(
        (status = 200, description = "Item added successfully", body = StdResponse<OrderDetails, String>)
    )
)]
async fn add_item(
    Path(table_id): Path<i32>,
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<ItemRequest>,
) -> Result<impl IntoResponse, AppError> {
    actor.authorize(Action::AddItem)?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order = orders::open_order_for_table(conn, table_id, &actor).await?;
    let details = orders::add_item(conn, order.id, body).await?;

    Ok(StdResponse {
        data: Some(details),
        message: Some("Item added successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct AddItemsReq {
    pub items: Vec<ItemRequest>,
}

/// Add several meals at once. Either every item is added or none is.
#[utoipa::path(
    post,
    path = "/items/batch",
    tags = ["Orders"],
    params(
        ("table_id" = i32, Path, description = "Table serving the order")
    ),
    request_body = AddItemsReq,
    responses(
        (status = 200, description = "Items added successfully", body = StdResponse<OrderDetails, String>)
    )
)]
async fn add_items(
    Path(table_id): Path<i32>,
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<AddItemsReq>,
) -> Result<impl IntoResponse, AppError> {
    actor.authorize(Action::AddItem)?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order = orders::open_order_for_table(conn, table_id, &actor).await?;
    let details = orders::add_items(conn, order.id, body.items).await?;

    Ok(StdResponse {
        data: Some(details),
        message: Some("Items added successfully"),
    })
}

/// Take units of a meal off the open order. The order is deleted with its last item.
#[utoipa::path(
    delete,
    path = "/items",
    tags = ["Orders"],
    params(
        ("table_id" = i32, Path, description = "Table serving the order")
    ),
    request_body = ItemRequest,
    responses(
        (status = 200, description = "Item removed successfully", body = StdResponse<RemovalOutcome, String>)
    )
)]
async fn remove_item(
    Path(table_id): Path<i32>,
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<ItemRequest>,
) -> Result<impl IntoResponse, AppError> {
    actor.authorize(Action::RemoveItem)?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order = orders::open_order_for_table(conn, table_id, &actor).await?;
    let outcome = orders::remove_item(conn, order.id, body.meal_id, body.quantity).await?;

    Ok(StdResponse {
        data: Some(outcome),
        message: Some("Item removed successfully"),
    })
}

#[derive(Deserialize, IntoParams)]
struct CloseParams {
    /// Print the receipt once the order is paid
    pub print: Option<bool>,
}

/// Mark the open order paid. A failed receipt print is reported but keeps the payment.
#[utoipa::path(
    post,
    path = "/close",
    tags = ["Orders"],
    params(
        ("table_id" = i32, Path, description = "Table serving the order"),
        CloseParams
    ),
    responses(
        (status = 200, description = "Order closed successfully", body = StdResponse<CheckoutResult, String>)
    )
)]
async fn close_order(
    Path(table_id): Path<i32>,
    Query(params): Query<CloseParams>,
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    actor.authorize(Action::Checkout)?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order = orders::open_order_for_table(conn, table_id, &actor).await?;
    let result = orders::checkout(
        conn,
        state.printer.as_ref(),
        state.aggregator.timezone(),
        order.id,
        params.print.unwrap_or(false),
    )
    .await?;

    Ok(StdResponse {
        data: Some(result),
        message: Some("Order closed successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct ReassignTableReq {
    pub table_id: i32,
}

/// Move the open order to another, empty table.
#[utoipa::path(
    post,
    path = "/table",
    tags = ["Orders"],
    params(
        ("table_id" = i32, Path, description = "Table currently serving the order")
    ),
    request_body = ReassignTableReq,
    responses(
        (status = 200, description = "Order moved successfully", body = StdResponse<OrderEntity, String>),
        (status = 409, description = "Target table is not assignable")
    )
)]
async fn reassign_table(
    Path(table_id): Path<i32>,
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<ReassignTableReq>,
) -> Result<impl IntoResponse, AppError> {
    actor.authorize(Action::ReassignTable)?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order = orders::open_order_for_table(conn, table_id, &actor).await?;
    let order = orders::reassign_table(conn, order.id, body.table_id).await?;

    Ok(StdResponse {
        data: Some(order),
        message: Some("Order moved successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct ReassignWaitressReq {
    pub waitress_id: i32,
}

/// Hand the open order to another waitress.
#[utoipa::path(
    post,
    path = "/waitress",
    tags = ["Orders"],
    params(
        ("table_id" = i32, Path, description = "Table serving the order")
    ),
    request_body = ReassignWaitressReq,
    responses(
        (status = 200, description = "Waitress changed successfully", body = StdResponse<OrderEntity, String>)
    )
)]
async fn reassign_waitress(
    Path(table_id): Path<i32>,
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<ReassignWaitressReq>,
) -> Result<impl IntoResponse, AppError> {
    actor.authorize(Action::ReassignWaitress)?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order = orders::open_order_for_table(conn, table_id, &actor).await?;
    let order = orders::reassign_waitress(conn, order.id, body.waitress_id).await?;

    Ok(StdResponse {
        data: Some(order),
        message: Some("Waitress changed successfully"),
    })
}
