//! Table occupancy: which order a table is serving and whether its check can be printed.

use std::collections::HashMap;

use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    common::{aliases::DbConnection, app_error::AppError},
    models::{OrderEntity, RoomEntity, TableEntity},
    schema::{dining_tables, orders, rooms},
};

pub async fn find_table(conn: &mut DbConnection, table_id: i32) -> Result<TableEntity, AppError> {
    dining_tables::table
        .find(table_id)
        .select(TableEntity::as_select())
        .get_result(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::NotFound(format!("Table #{table_id}")))
}

/// The unpaid order a table is currently serving, if any.
pub async fn current_order(
    conn: &mut DbConnection,
    table_id: i32,
) -> Result<Option<OrderEntity>, AppError> {
    let order = orders::table
        .filter(orders::table_id.eq(table_id))
        .filter(orders::is_paid.eq(false))
        .order_by((orders::created_at.desc(), orders::id.desc()))
        .select(OrderEntity::as_select())
        .first(conn)
        .await
        .optional()?;

    Ok(order)
}

/// A check may be printed once per order until someone resets it.
pub fn receipt_printable(order: Option<&OrderEntity>) -> bool {
    order.is_some_and(|order| !order.is_check_printed)
}

pub async fn can_print_receipt(conn: &mut DbConnection, table_id: i32) -> Result<bool, AppError> {
    let order = current_order(conn, table_id).await?;
    Ok(receipt_printable(order.as_ref()))
}

/// A table can receive an order when it is not serving one already.
pub async fn is_assignable(conn: &mut DbConnection, table_id: i32) -> Result<bool, AppError> {
    Ok(current_order(conn, table_id).await?.is_none())
}

pub async fn list_rooms(conn: &mut DbConnection) -> Result<Vec<RoomEntity>, AppError> {
    let rooms = rooms::table
        .order_by(rooms::id.asc())
        .select(RoomEntity::as_select())
        .load(conn)
        .await?;
    Ok(rooms)
}

#[derive(Serialize, Debug, ToSchema)]
pub struct OrderSummary {
    pub id: i32,
    pub waitress_id: Option<i32>,
    pub total_price: Decimal,
    pub is_check_printed: bool,
}

impl From<&OrderEntity> for OrderSummary {
    fn from(order: &OrderEntity) -> Self {
        Self {
            id: order.id,
            waitress_id: order.waitress_id,
            total_price: order.total_price,
            is_check_printed: order.is_check_printed,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct TableOverview {
    pub table: TableEntity,
    pub current_order: Option<OrderSummary>,
    pub can_print_receipt: bool,
}

/// Tables of a room with the order each one is serving.
pub async fn list_tables(
    conn: &mut DbConnection,
    room_id: i32,
) -> Result<Vec<TableOverview>, AppError> {
    let tables: Vec<TableEntity> = dining_tables::table
        .filter(dining_tables::room_id.eq(room_id))
        .order_by(dining_tables::id.asc())
        .select(TableEntity::as_select())
        .load(conn)
        .await?;

    let table_ids: Vec<i32> = tables.iter().map(|table| table.id).collect();
    let open_orders: Vec<OrderEntity> = orders::table
        .filter(orders::table_id.eq_any(&table_ids))
        .filter(orders::is_paid.eq(false))
        .select(OrderEntity::as_select())
        .load(conn)
        .await?;

    let mut by_table: HashMap<i32, OrderEntity> = HashMap::new();
    for order in open_orders {
        by_table.insert(order.table_id, order);
    }

    let overview = tables
        .into_iter()
        .map(|table| {
            let order = by_table.remove(&table.id);
            TableOverview {
                can_print_receipt: receipt_printable(order.as_ref()),
                current_order: order.as_ref().map(OrderSummary::from),
                table,
            }
        })
        .collect();

    Ok(overview)
}
