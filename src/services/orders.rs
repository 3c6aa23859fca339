//! Order lifecycle: open, add and remove items, pay, move between tables and waitresses.
//!
//! Every mutation runs in a transaction that first locks the order row, so concurrent
//! terminals working on the same table are serialized.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper, dsl::now};
use diesel_async::{AsyncConnection, RunQueryDsl};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::{
    common::{aliases::DbConnection, app_error::AppError},
    models::{CreateOrderEntity, CreateOrderItemEntity, MealEntity, OrderEntity, OrderItemEntity},
    permissions::{Actor, Role},
    pricing::{self, Removal},
    printing::ReceiptPrinter,
    schema::{meals, order_items, orders, staff},
    services::{receipts, tables},
};

#[derive(Serialize, Debug, ToSchema)]
pub struct OrderItemView {
    pub id: i32,
    pub meal_id: i32,
    pub meal_name: String,
    pub quantity: i32,
    pub price: Decimal,
    pub item_added_at: DateTime<Utc>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct OrderDetails {
    pub order: OrderEntity,
    pub items: Vec<OrderItemView>,
}

#[derive(Deserialize, Debug, Clone, Copy, ToSchema)]
pub struct ItemRequest {
    pub meal_id: i32,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RemovalOutcome {
    Updated(OrderDetails),
    /// The last item went away and the order with it.
    OrderDeleted { order_id: i32 },
}

#[derive(Serialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PrintOutcome {
    Skipped,
    Printed,
    Failed { reason: String },
}

#[derive(Serialize, Debug, ToSchema)]
pub struct CheckoutResult {
    pub order: OrderEntity,
    pub print: PrintOutcome,
}

pub async fn load_details(
    conn: &mut DbConnection,
    order: OrderEntity,
) -> Result<OrderDetails, AppError> {
    let rows: Vec<(OrderItemEntity, String)> = order_items::table
        .inner_join(meals::table)
        .filter(order_items::order_id.eq(order.id))
        .order_by((order_items::item_added_at.asc(), order_items::id.asc()))
        .select((OrderItemEntity::as_select(), meals::name))
        .load(conn)
        .await?;

    let items = rows
        .into_iter()
        .map(|(item, meal_name)| OrderItemView {
            id: item.id,
            meal_id: item.meal_id,
            meal_name,
            quantity: item.quantity,
            price: item.price,
            item_added_at: item.item_added_at,
        })
        .collect();

    Ok(OrderDetails { order, items })
}

/// The table's open order, provided `actor` is allowed to see it.
pub async fn open_order_for_table(
    conn: &mut DbConnection,
    table_id: i32,
    actor: &Actor,
) -> Result<OrderEntity, AppError> {
    tables::find_table(conn, table_id).await?;
    let order = tables::current_order(conn, table_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Open order for table #{table_id}")))?;
    actor.ensure_order_access(&order)?;
    Ok(order)
}

/// Locks an unpaid order for the rest of the transaction.
async fn lock_open_order(conn: &mut DbConnection, order_id: i32) -> Result<OrderEntity, AppError> {
    orders::table
        .find(order_id)
        .filter(orders::is_paid.eq(false))
        .select(OrderEntity::as_select())
        .for_update()
        .get_result(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::NotFound(format!("Open order #{order_id}")))
}

/// Stores the sum of the item snapshots as the order total.
async fn recompute_total(conn: &mut DbConnection, order_id: i32) -> Result<OrderEntity, AppError> {
    let prices: Vec<Decimal> = order_items::table
        .filter(order_items::order_id.eq(order_id))
        .select(order_items::price)
        .load(conn)
        .await?;

    let order = diesel::update(orders::table.find(order_id))
        .set((
            orders::total_price.eq(pricing::order_total(&prices)),
            orders::updated_at.eq(now),
        ))
        .returning(OrderEntity::as_returning())
        .get_result(conn)
        .await?;

    Ok(order)
}

pub async fn create_order(
    conn: &mut DbConnection,
    table_id: i32,
    actor: &Actor,
) -> Result<OrderEntity, AppError> {
    let waitress_id = actor.id;

    let order = conn
        .transaction(move |conn| {
            Box::pin(async move {
                tables::find_table(conn, table_id).await?;
                if tables::current_order(conn, table_id).await?.is_some() {
                    return Err(AppError::Conflict(format!(
                        "Table #{table_id} already has an open order"
                    )));
                }

                // The partial unique index rejects a racing insert for the same table.
                let order = diesel::insert_into(orders::table)
                    .values(CreateOrderEntity {
                        table_id,
                        waitress_id: Some(waitress_id),
                    })
                    .returning(OrderEntity::as_returning())
                    .get_result(conn)
                    .await
                    .map_err(|err| match AppError::from(err) {
                        AppError::Conflict(_) => AppError::Conflict(format!(
                            "Table #{table_id} already has an open order"
                        )),
                        other => other,
                    })?;

                Ok::<OrderEntity, AppError>(order)
            })
        })
        .await?;

    info!(order_id = order.id, table_id, waitress_id, "Order opened");
    Ok(order)
}

pub async fn add_item(
    conn: &mut DbConnection,
    order_id: i32,
    item: ItemRequest,
) -> Result<OrderDetails, AppError> {
    add_items(conn, order_id, vec![item]).await
}

/// Adds every requested meal in one transaction. Any failure leaves the order untouched.
pub async fn add_items(
    conn: &mut DbConnection,
    order_id: i32,
    items: Vec<ItemRequest>,
) -> Result<OrderDetails, AppError> {
    if items.is_empty() {
        return Err(AppError::BadRequest("No items to add".into()));
    }
    for item in &items {
        pricing::validate_quantity(item.quantity)
            .map_err(|err| AppError::BadRequest(format!("Meal #{}: {err}", item.meal_id)))?;
    }

    let item_count = items.len();
    let order = conn
        .transaction(move |conn| {
            Box::pin(async move {
                lock_open_order(conn, order_id).await?;

                let meal_ids: Vec<i32> = items.iter().map(|item| item.meal_id).collect();
                let menu: HashMap<i32, MealEntity> = meals::table
                    .filter(meals::id.eq_any(&meal_ids))
                    .select(MealEntity::as_select())
                    .load::<MealEntity>(conn)
                    .await?
                    .into_iter()
                    .map(|meal| (meal.id, meal))
                    .collect();

                let mut lines: HashMap<i32, (i64, Decimal)> = order_items::table
                    .filter(order_items::order_id.eq(order_id))
                    .select((order_items::meal_id, order_items::quantity, order_items::price))
                    .load::<(i32, i32, Decimal)>(conn)
                    .await?
                    .into_iter()
                    .map(|(meal_id, quantity, price)| (meal_id, (i64::from(quantity), price)))
                    .collect();

                for item in &items {
                    let meal = menu
                        .get(&item.meal_id)
                        .ok_or_else(|| AppError::NotFound(format!("Meal #{}", item.meal_id)))?;
                    let line = lines.entry(meal.id).or_insert((0, Decimal::ZERO));
                    line.0 += i64::from(item.quantity);
                    line.1 += pricing::line_total(meal.price, item.quantity);
                    pricing::validate_item(line.0, line.1).map_err(|err| {
                        AppError::BadRequest(format!("Meal #{}: {err}", meal.id))
                    })?;
                }
                pricing::validate_amount(pricing::order_total(lines.values().map(|line| &line.1)))?;

                for item in &items {
                    let Some(meal) = menu.get(&item.meal_id) else {
                        continue;
                    };
                    let added = pricing::line_total(meal.price, item.quantity);

                    diesel::insert_into(order_items::table)
                        .values(CreateOrderItemEntity {
                            order_id,
                            meal_id: meal.id,
                            quantity: item.quantity,
                            price: added,
                        })
                        .on_conflict((order_items::order_id, order_items::meal_id))
                        .do_update()
                        .set((
                            order_items::quantity.eq(order_items::quantity + item.quantity),
                            order_items::price.eq(order_items::price + added),
                            order_items::updated_at.eq(now),
                        ))
                        .execute(conn)
                        .await?;
                }

                recompute_total(conn, order_id).await
            })
        })
        .await?;

    info!(
        order_id,
        items = item_count,
        total = %order.total_price,
        "Items added"
    );
    load_details(conn, order).await
}

/// Takes `quantity` units of a meal off the order. Removing the last item deletes the order.
pub async fn remove_item(
    conn: &mut DbConnection,
    order_id: i32,
    meal_id: i32,
    quantity: i32,
) -> Result<RemovalOutcome, AppError> {
    pricing::validate_quantity(quantity)?;

    let remaining = conn
        .transaction(move |conn| {
            Box::pin(async move {
                lock_open_order(conn, order_id).await?;

                let item: OrderItemEntity = order_items::table
                    .filter(order_items::order_id.eq(order_id))
                    .filter(order_items::meal_id.eq(meal_id))
                    .select(OrderItemEntity::as_select())
                    .first(conn)
                    .await
                    .optional()?
                    .ok_or_else(|| {
                        AppError::NotFound(format!("Meal #{meal_id} on order #{order_id}"))
                    })?;

                match pricing::plan_removal(item.quantity, item.price, quantity) {
                    Removal::Decrease { quantity, price } => {
                        diesel::update(order_items::table.find(item.id))
                            .set((
                                order_items::quantity.eq(quantity),
                                order_items::price.eq(price),
                                order_items::updated_at.eq(now),
                            ))
                            .execute(conn)
                            .await?;
                    }
                    Removal::Delete => {
                        diesel::delete(order_items::table.find(item.id))
                            .execute(conn)
                            .await?;
                    }
                }

                let left: i64 = order_items::table
                    .filter(order_items::order_id.eq(order_id))
                    .count()
                    .get_result(conn)
                    .await?;

                if left == 0 {
                    diesel::delete(orders::table.find(order_id))
                        .execute(conn)
                        .await?;
                    return Ok::<Option<OrderEntity>, AppError>(None);
                }

                Ok(Some(recompute_total(conn, order_id).await?))
            })
        })
        .await?;

    match remaining {
        Some(order) => {
            info!(order_id, meal_id, quantity, total = %order.total_price, "Item removed");
            Ok(RemovalOutcome::Updated(load_details(conn, order).await?))
        }
        None => {
            info!(order_id, "Order deleted after its last item was removed");
            Ok(RemovalOutcome::OrderDeleted { order_id })
        }
    }
}

/// Marks the order paid.
pub async fn close_order(conn: &mut DbConnection, order_id: i32) -> Result<OrderEntity, AppError> {
    let order = conn
        .transaction(move |conn| {
            Box::pin(async move {
                lock_open_order(conn, order_id).await?;

                let order = diesel::update(orders::table.find(order_id))
                    .set((orders::is_paid.eq(true), orders::updated_at.eq(now)))
                    .returning(OrderEntity::as_returning())
                    .get_result(conn)
                    .await?;

                Ok::<OrderEntity, AppError>(order)
            })
        })
        .await?;

    info!(order_id, total = %order.total_price, "Order paid");
    Ok(order)
}

/// Pays the order and, when asked, prints its receipt once the payment is committed.
/// A failed print is reported in the result and never undoes the payment.
pub async fn checkout(
    conn: &mut DbConnection,
    printer: &dyn ReceiptPrinter,
    tz: Tz,
    order_id: i32,
    print: bool,
) -> Result<CheckoutResult, AppError> {
    let order = close_order(conn, order_id).await?;

    if !print {
        return Ok(CheckoutResult {
            order,
            print: PrintOutcome::Skipped,
        });
    }

    match receipts::print_order(conn, printer, tz, &order).await {
        Ok(printed) => Ok(CheckoutResult {
            order: printed,
            print: PrintOutcome::Printed,
        }),
        Err(err) => {
            warn!(order_id, error = %err, "Receipt was not printed after checkout");
            Ok(CheckoutResult {
                order,
                print: PrintOutcome::Failed {
                    reason: err.to_string(),
                },
            })
        }
    }
}

/// Moves an open order to another table, which must not be serving an order of its own.
pub async fn reassign_table(
    conn: &mut DbConnection,
    order_id: i32,
    new_table_id: i32,
) -> Result<OrderEntity, AppError> {
    let order = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let order = lock_open_order(conn, order_id).await?;
                if order.table_id == new_table_id {
                    return Ok(order);
                }

                tables::find_table(conn, new_table_id).await?;
                if let Some(other) = tables::current_order(conn, new_table_id).await? {
                    if other.id != order_id {
                        return Err(AppError::Conflict(format!(
                            "Table #{new_table_id} is not assignable"
                        )));
                    }
                }

                let order = diesel::update(orders::table.find(order_id))
                    .set((
                        orders::table_id.eq(new_table_id),
                        orders::updated_at.eq(now),
                    ))
                    .returning(OrderEntity::as_returning())
                    .get_result(conn)
                    .await?;

                Ok::<OrderEntity, AppError>(order)
            })
        })
        .await?;

    info!(order_id, table_id = new_table_id, "Order moved to another table");
    Ok(order)
}

/// Hands an open order to another active waitress.
pub async fn reassign_waitress(
    conn: &mut DbConnection,
    order_id: i32,
    waitress_id: i32,
) -> Result<OrderEntity, AppError> {
    let order = conn
        .transaction(move |conn| {
            Box::pin(async move {
                lock_open_order(conn, order_id).await?;

                let role: Option<String> = staff::table
                    .find(waitress_id)
                    .filter(staff::is_active.eq(true))
                    .select(staff::role)
                    .get_result(conn)
                    .await
                    .optional()?;

                let serves_tables = role
                    .and_then(|role| role.parse::<Role>().ok())
                    .is_some_and(|role| role.serves_tables());
                if !serves_tables {
                    return Err(AppError::NotFound(format!("Waitress #{waitress_id}")));
                }

                let order = diesel::update(orders::table.find(order_id))
                    .set((
                        orders::waitress_id.eq(Some(waitress_id)),
                        orders::updated_at.eq(now),
                    ))
                    .returning(OrderEntity::as_returning())
                    .get_result(conn)
                    .await?;

                Ok::<OrderEntity, AppError>(order)
            })
        })
        .await?;

    info!(order_id, waitress_id, "Order handed to another waitress");
    Ok(order)
}
