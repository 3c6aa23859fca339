use anyhow::Context;
use axum::{
    Extension,
    extract::{Query, State},
    response::IntoResponse,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;

use crate::{
    common::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
        middleware,
    },
    models::StatisticsEntity,
    permissions::{Action, Actor},
    services::{
        orders::PrintOutcome,
        receipts,
        statistics::{self, ActiveOrdersSummary, StatisticsFilter, ZReport},
    },
};

pub fn routes_with_openapi(state: AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/statistics",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_statistics))
            .routes(utoipa_axum::routes!(get_active_orders))
            .routes(utoipa_axum::routes!(calculate_per_waitress))
            .routes(utoipa_axum::routes!(calculate_daily))
            .routes(utoipa_axum::routes!(calculate_monthly))
            .routes(utoipa_axum::routes!(calculate_yearly))
            .routes(utoipa_axum::routes!(calculate_till_now))
            .routes(utoipa_axum::routes!(z_report))
            .route_layer(axum::middleware::from_fn_with_state(
                state,
                middleware::staff_authentication,
            )),
    )
}

#[derive(Deserialize, IntoParams)]
struct DateParams {
    /// Day inside the period to calculate. Defaults to yesterday.
    pub date: Option<NaiveDate>,
}

/// List stored statistics.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Statistics"],
    params(StatisticsFilter),
    responses(
        (status = 200, description = "Get statistics successfully", body = StdResponse<Vec<StatisticsEntity>, String>)
    )
)]
async fn get_statistics(
    Query(filter): Query<StatisticsFilter>,
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    actor.authorize(Action::ViewStatistics)?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let rows = statistics::list_statistics(conn, &filter).await?;

    Ok(StdResponse {
        data: Some(rows),
        message: Some("Get statistics successfully"),
    })
}

/// Totals of the paid and unpaid orders still on record.
#[utoipa::path(
    get,
    path = "/active-orders",
    tags = ["Statistics"],
    responses(
        (status = 200, description = "Get active orders successfully", body = StdResponse<ActiveOrdersSummary, String>)
    )
)]
async fn get_active_orders(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    actor.authorize(Action::ViewStatistics)?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let summary = state.aggregator.active_orders(conn).await?;

    Ok(StdResponse {
        data: Some(summary),
        message: Some("Get active orders successfully"),
    })
}

#[utoipa::path(
    post,
    path = "/per-waitress",
    tags = ["Statistics"],
    params(DateParams),
    responses(
        (status = 200, description = "Per-waitress statistics calculated", body = StdResponse<Vec<StatisticsEntity>, String>)
    )
)]
async fn calculate_per_waitress(
    Query(params): Query<DateParams>,
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    actor.authorize(Action::CalculateStatistics)?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let date = state.aggregator.resolve(params.date);
    let rows = state.aggregator.calculate_per_waitress(conn, date).await?;

    Ok(StdResponse {
        data: Some(rows),
        message: Some("Per-waitress statistics calculated"),
    })
}

/// Calculate the daily total. `data` is empty when the day had no paid orders.
#[utoipa::path(
    post,
    path = "/daily",
    tags = ["Statistics"],
    params(DateParams),
    responses(
        (status = 200, description = "Daily statistic calculated", body = StdResponse<StatisticsEntity, String>)
    )
)]
async fn calculate_daily(
    Query(params): Query<DateParams>,
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    actor.authorize(Action::CalculateStatistics)?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let date = state.aggregator.resolve(params.date);
    let row = state.aggregator.calculate_daily(conn, date).await?;

    Ok(StdResponse {
        data: row,
        message: Some("Daily statistic calculated"),
    })
}

#[utoipa::path(
    post,
    path = "/monthly",
    tags = ["Statistics"],
    params(DateParams),
    responses(
        (status = 200, description = "Monthly statistic calculated", body = StdResponse<StatisticsEntity, String>)
    )
)]
async fn calculate_monthly(
    Query(params): Query<DateParams>,
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    actor.authorize(Action::CalculateStatistics)?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let date = state.aggregator.resolve(params.date);
    let row = state.aggregator.calculate_monthly(conn, date).await?;

    Ok(StdResponse {
        data: row,
        message: Some("Monthly statistic calculated"),
    })
}

#[utoipa::path(
    post,
    path = "/yearly",
    tags = ["Statistics"],
    params(DateParams),
    responses(
        (status = 200, description = "Yearly statistic calculated", body = StdResponse<StatisticsEntity, String>)
    )
)]
async fn calculate_yearly(
    Query(params): Query<DateParams>,
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    actor.authorize(Action::CalculateStatistics)?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let date = state.aggregator.resolve(params.date);
    let row = state.aggregator.calculate_yearly(conn, date).await?;

    Ok(StdResponse {
        data: row,
        message: Some("Yearly statistic calculated"),
    })
}

/// Backfill every year from the first paid order through yesterday.
#[utoipa::path(
    post,
    path = "/till-now",
    tags = ["Statistics"],
    responses(
        (status = 200, description = "Statistics calculated till now", body = StdResponse<Vec<StatisticsEntity>, String>)
    )
)]
async fn calculate_till_now(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    actor.authorize(Action::CalculateStatistics)?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let rows = state.aggregator.calculate_till_now(conn).await?;

    Ok(StdResponse {
        data: Some(rows),
        message: Some("Statistics calculated till now"),
    })
}

#[derive(Deserialize, IntoParams)]
struct ZReportParams {
    /// Day to close. Defaults to yesterday.
    pub date: Option<NaiveDate>,
    /// Print the Z-report slip, on by default
    pub print: Option<bool>,
}

#[derive(Serialize, ToSchema)]
struct ZReportRes {
    pub report: ZReport,
    pub print: PrintOutcome,
}

/// Close a day: store its statistics and delete its paid orders.
#[utoipa::path(
    post,
    path = "/z-report",
    tags = ["Statistics"],
    params(ZReportParams),
    responses(
        (status = 200, description = "Z-report completed", body = StdResponse<ZReportRes, String>)
    )
)]
async fn z_report(
    Query(params): Query<ZReportParams>,
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    actor.authorize(Action::ZReport)?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let date = state.aggregator.resolve(params.date);
    let report = state.aggregator.delete_orders_for_day(conn, date).await?;

    let print = if params.print.unwrap_or(true) {
        let slip = state.aggregator.z_report_receipt(&report);
        match receipts::send(state.printer.as_ref(), &slip).await {
            Ok(()) => PrintOutcome::Printed,
            Err(err) => PrintOutcome::Failed {
                reason: err.to_string(),
            },
        }
    } else {
        PrintOutcome::Skipped
    };

    Ok(StdResponse {
        data: Some(ZReportRes { report, print }),
        message: Some("Z-report completed"),
    })
}
