use chrono::Utc;
use chrono_tz::Tz;
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper, dsl::now};
use diesel_async::RunQueryDsl;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::{
    common::{aliases::DbConnection, app_error::AppError},
    models::{OrderEntity, StaffEntity},
    pricing,
    printing::{Receipt, ReceiptLine, ReceiptPrinter},
    schema::{orders, rooms, staff},
    services::{orders::load_details, tables},
};

pub const DATE_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

pub fn local_timestamp(tz: Tz) -> String {
    Utc::now().with_timezone(&tz).format(DATE_FORMAT).to_string()
}

/// Customer check for `order`: where it was served, by whom, and every item.
pub async fn build_receipt(
    conn: &mut DbConnection,
    order: &OrderEntity,
    tz: Tz,
) -> Result<Receipt, AppError> {
    let table = tables::find_table(conn, order.table_id).await?;

    let room: Option<String> = match table.room_id {
        Some(room_id) => rooms::table
            .find(room_id)
            .select(rooms::name)
            .get_result(conn)
            .await
            .optional()?,
        None => None,
    };

    let waitress: Option<StaffEntity> = match order.waitress_id {
        Some(waitress_id) => staff::table
            .find(waitress_id)
            .select(StaffEntity::as_select())
            .get_result(conn)
            .await
            .optional()?,
        None => None,
    };

    let details = load_details(conn, order.clone()).await?;

    let mut receipt = Receipt::new(format!("CHECK #{}", order.id), local_timestamp(tz))
        .field("Room", room.unwrap_or_else(|| "N/A".to_string()))
        .field("Table", table.number);
    if let Some(waitress) = waitress {
        receipt = receipt.field("Waitress", waitress.full_name());
    }

    for item in details.items {
        let unit_price = pricing::round_money(item.price / Decimal::from(item.quantity));
        receipt = receipt.line(ReceiptLine {
            name: item.meal_name,
            quantity: Some(item.quantity),
            unit_price: Some(unit_price),
            amount: item.price,
        });
    }

    Ok(receipt.total(order.total_price))
}

/// Hands a slip to the printer, mapping transport failures to [`AppError::ServiceUnreachable`].
pub async fn send(printer: &dyn ReceiptPrinter, receipt: &Receipt) -> Result<(), AppError> {
    printer.send_receipt(receipt).await.map_err(|err| {
        warn!(printer = %printer.name(), error = %err, title = %receipt.title, "Print failed");
        AppError::ServiceUnreachable(format!("Printer {} ({err})", printer.name()))
    })
}

/// Prints the order's check and records that it was printed.
pub async fn print_order(
    conn: &mut DbConnection,
    printer: &dyn ReceiptPrinter,
    tz: Tz,
    order: &OrderEntity,
) -> Result<OrderEntity, AppError> {
    let receipt = build_receipt(conn, order, tz).await?;
    send(printer, &receipt).await?;

    let order = diesel::update(orders::table.find(order.id))
        .set((orders::is_check_printed.eq(true), orders::updated_at.eq(now)))
        .returning(OrderEntity::as_returning())
        .get_result(conn)
        .await?;

    info!(order_id = order.id, printer = %printer.name(), "Check printed");
    Ok(order)
}

/// Prints the check of an open order once; `force` reprints an already printed check.
pub async fn print_check(
    conn: &mut DbConnection,
    printer: &dyn ReceiptPrinter,
    tz: Tz,
    order: &OrderEntity,
    force: bool,
) -> Result<OrderEntity, AppError> {
    if !force && !tables::receipt_printable(Some(order)) {
        return Err(AppError::Conflict(format!(
            "Check for table #{} was already printed",
            order.table_id
        )));
    }

    print_order(conn, printer, tz, order).await
}

/// Re-enables printing for a table whose check was already printed.
pub async fn reset_check_printed(
    conn: &mut DbConnection,
    table_id: i32,
) -> Result<OrderEntity, AppError> {
    tables::find_table(conn, table_id).await?;
    let order = tables::current_order(conn, table_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Open order for table #{table_id}")))?;

    if tables::receipt_printable(Some(&order)) {
        return Err(AppError::Conflict(format!(
            "Table #{table_id} can already print its check"
        )));
    }

    let order = diesel::update(orders::table.find(order.id))
        .set((orders::is_check_printed.eq(false), orders::updated_at.eq(now)))
        .returning(OrderEntity::as_returning())
        .get_result(conn)
        .await?;

    info!(order_id = order.id, table_id, "Check print reset");
    Ok(order)
}
