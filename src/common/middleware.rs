use anyhow::Context;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;

use crate::{models::StaffEntity, permissions::Actor, schema::staff};

use super::{app_error::AppError, app_state::AppState};

pub const STAFF_ID_HEADER: &str = "x-staff-id";

/// Resolves the `x-staff-id` header to an active staff member and exposes it to handlers
/// as `Extension<Actor>`.
pub async fn staff_authentication(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let staff_id: i32 = req
        .headers()
        .get(STAFF_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
        .ok_or_else(|| AppError::Unauthorized(format!("Missing or invalid {STAFF_ID_HEADER}")))?;

    // The connection goes back to the pool before the handler runs.
    let member: StaffEntity = {
        let conn = &mut state
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        staff::table
            .find(staff_id)
            .filter(staff::is_active.eq(true))
            .select(StaffEntity::as_select())
            .first(conn)
            .await
            .optional()?
            .ok_or_else(|| AppError::Unauthorized(format!("Unknown staff member #{staff_id}")))?
    };

    let actor = Actor::from_staff(&member)?;
    req.extensions_mut().insert(actor);

    Ok(next.run(req).await)
}
