use anyhow::Context;
use axum::{
    Extension,
    extract::{Query, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use utoipa::IntoParams;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    common::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
        middleware,
    },
    models::{MealCategoryEntity, MealEntity, StaffEntity},
    permissions::{Action, Actor, Role},
    schema::{meal_categories, meals, staff},
};

/// Read-only lookups the terminals need to take orders.
pub fn routes_with_openapi(state: AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest(
            "/meals",
            OpenApiRouter::new().routes(utoipa_axum::routes!(get_meals)),
        )
        .nest(
            "/meal-categories",
            OpenApiRouter::new().routes(utoipa_axum::routes!(get_meal_categories)),
        )
        .nest(
            "/waitresses",
            OpenApiRouter::new().routes(utoipa_axum::routes!(get_waitresses)),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::staff_authentication,
        ))
}

#[derive(Deserialize, IntoParams)]
struct MealsParams {
    /// Only meals of this category
    pub category_id: Option<i32>,
}

/// List the menu.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Menu"],
    params(MealsParams),
    responses(
        (status = 200, description = "Get meals successfully", body = StdResponse<Vec<MealEntity>, String>)
    )
)]
async fn get_meals(
    Query(params): Query<MealsParams>,
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    actor.authorize(Action::ViewMenu)?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut query = meals::table.select(MealEntity::as_select()).into_boxed();
    if let Some(category_id) = params.category_id {
        query = query.filter(meals::category_id.eq(category_id));
    }
    let meals: Vec<MealEntity> = query
        .order_by(meals::name.asc())
        .load(conn)
        .await
        .context("Failed to get meals")?;

    Ok(StdResponse {
        data: Some(meals),
        message: Some("Get meals successfully"),
    })
}

#[utoipa::path(
    get,
    path = "/",
    tags = ["Menu"],
    responses(
        (status = 200, description = "Get meal categories successfully", body = StdResponse<Vec<MealCategoryEntity>, String>)
    )
)]
async fn get_meal_categories(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    actor.authorize(Action::ViewMenu)?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let categories: Vec<MealCategoryEntity> = meal_categories::table
        .order_by(meal_categories::name.asc())
        .select(MealCategoryEntity::as_select())
        .load(conn)
        .await
        .context("Failed to get meal categories")?;

    Ok(StdResponse {
        data: Some(categories),
        message: Some("Get meal categories successfully"),
    })
}

/// Active staff who can be put in charge of an order.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Menu"],
    responses(
        (status = 200, description = "Get waitresses successfully", body = StdResponse<Vec<StaffEntity>, String>)
    )
)]
async fn get_waitresses(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    actor.authorize(Action::ViewFloor)?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let roles = vec![Role::Waitress.as_str(), Role::CaptainWaitress.as_str()];
    let waitresses: Vec<StaffEntity> = staff::table
        .filter(staff::is_active.eq(true))
        .filter(staff::role.eq_any(roles))
        .order_by(staff::username.asc())
        .select(StaffEntity::as_select())
        .load(conn)
        .await
        .context("Failed to get waitresses")?;

    Ok(StdResponse {
        data: Some(waitresses),
        message: Some("Get waitresses successfully"),
    })
}
