mod common;

use common::RecordingPrinter;
use diesel::{ExpressionMethods, QueryDsl};
use diesel_async::RunQueryDsl;
use restobook_orderservice::{
    common::app_error::AppError,
    permissions::Role,
    pricing,
    printing::DisabledPrinter,
    schema::{order_items, orders},
    services::{
        orders::{self as order_service, ItemRequest, PrintOutcome, RemovalOutcome},
        receipts, tables,
    },
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn item(meal_id: i32, quantity: i32) -> ItemRequest {
    ItemRequest { meal_id, quantity }
}

#[tokio::test]
async fn latte_scenario_ends_with_the_order_removed() {
    let Some(pool) = common::pool().await else {
        return;
    };
    let conn = &mut pool.get().await.unwrap();

    let table_id = common::create_table(conn).await;
    let latte = common::create_meal(conn, "Latte", dec!(4.00)).await;
    let waitress = common::create_staff(conn, Role::Waitress).await;

    let order = order_service::create_order(conn, table_id, &waitress)
        .await
        .unwrap();
    assert!(!order.is_paid);
    assert_eq!(order.total_price, Decimal::ZERO);
    assert_eq!(order.waitress_id, Some(waitress.id));

    let details = order_service::add_item(conn, order.id, item(latte, 2))
        .await
        .unwrap();
    assert_eq!(details.items.len(), 1);
    assert_eq!(details.items[0].quantity, 2);
    assert_eq!(details.items[0].price, dec!(8.00));
    assert_eq!(details.order.total_price, dec!(8.00));

    let details = order_service::add_item(conn, order.id, item(latte, 1))
        .await
        .unwrap();
    assert_eq!(details.items.len(), 1);
    assert_eq!(details.items[0].quantity, 3);
    assert_eq!(details.items[0].price, dec!(12.00));
    assert_eq!(details.order.total_price, dec!(12.00));

    let outcome = order_service::remove_item(conn, order.id, latte, 3)
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        RemovalOutcome::OrderDeleted { order_id } if order_id == order.id
    ));

    assert!(tables::current_order(conn, table_id).await.unwrap().is_none());
    let left: i64 = orders::table
        .filter(orders::id.eq(order.id))
        .count()
        .get_result(conn)
        .await
        .unwrap();
    assert_eq!(left, 0);
}

#[tokio::test]
async fn second_open_order_on_a_table_conflicts() {
    let Some(pool) = common::pool().await else {
        return;
    };
    let conn = &mut pool.get().await.unwrap();

    let table_id = common::create_table(conn).await;
    let waitress = common::create_staff(conn, Role::Waitress).await;
    let captain = common::create_staff(conn, Role::CaptainWaitress).await;

    order_service::create_order(conn, table_id, &waitress)
        .await
        .unwrap();
    let err = order_service::create_order(conn, table_id, &captain)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let open: i64 = orders::table
        .filter(orders::table_id.eq(table_id))
        .filter(orders::is_paid.eq(false))
        .count()
        .get_result(conn)
        .await
        .unwrap();
    assert_eq!(open, 1);
}

#[tokio::test]
async fn unknown_table_is_not_found() {
    let Some(pool) = common::pool().await else {
        return;
    };
    let conn = &mut pool.get().await.unwrap();
    let waitress = common::create_staff(conn, Role::Waitress).await;

    let err = order_service::create_order(conn, i32::MAX, &waitress)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn paid_orders_reject_items_and_free_the_table() {
    let Some(pool) = common::pool().await else {
        return;
    };
    let conn = &mut pool.get().await.unwrap();

    let table_id = common::create_table(conn).await;
    let tea = common::create_meal(conn, "Tea", dec!(1.50)).await;
    let waitress = common::create_staff(conn, Role::Waitress).await;

    let order = order_service::create_order(conn, table_id, &waitress)
        .await
        .unwrap();
    order_service::add_item(conn, order.id, item(tea, 2))
        .await
        .unwrap();

    let result = order_service::checkout(conn, &DisabledPrinter, chrono_tz::Tz::UTC, order.id, false)
        .await
        .unwrap();
    assert!(result.order.is_paid);
    assert_eq!(result.order.total_price, dec!(3.00));
    assert_eq!(result.print, PrintOutcome::Skipped);

    let err = order_service::add_item(conn, order.id, item(tea, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = order_service::close_order(conn, order.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    assert!(tables::is_assignable(conn, table_id).await.unwrap());
    let next = order_service::create_order(conn, table_id, &waitress)
        .await
        .unwrap();
    assert_ne!(next.id, order.id);
}

#[tokio::test]
async fn batch_is_all_or_nothing() {
    let Some(pool) = common::pool().await else {
        return;
    };
    let conn = &mut pool.get().await.unwrap();

    let table_id = common::create_table(conn).await;
    let soup = common::create_meal(conn, "Soup", dec!(5.25)).await;
    let bread = common::create_meal(conn, "Bread", dec!(0.75)).await;
    let waitress = common::create_staff(conn, Role::Waitress).await;
    let order = order_service::create_order(conn, table_id, &waitress)
        .await
        .unwrap();

    let missing = i32::MAX;
    let err = order_service::add_items(conn, order.id, vec![item(soup, 2), item(missing, 1)])
        .await
        .unwrap_err();
    match err {
        AppError::NotFound(what) => assert!(what.contains(&missing.to_string())),
        other => panic!("unexpected error {other:?}"),
    }

    let err = order_service::add_items(conn, order.id, vec![item(soup, 1), item(bread, 0)])
        .await
        .unwrap_err();
    match err {
        AppError::BadRequest(what) => assert!(what.contains(&format!("Meal #{bread}"))),
        other => panic!("unexpected error {other:?}"),
    }

    let err = order_service::add_items(conn, order.id, vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let items: i64 = order_items::table
        .filter(order_items::order_id.eq(order.id))
        .count()
        .get_result(conn)
        .await
        .unwrap();
    assert_eq!(items, 0);

    let details = order_service::add_items(
        conn,
        order.id,
        vec![item(soup, 2), item(bread, 4), item(soup, 1)],
    )
    .await
    .unwrap();
    assert_eq!(details.items.len(), 2);
    let soup_line = details.items.iter().find(|i| i.meal_id == soup).unwrap();
    assert_eq!(soup_line.quantity, 3);
    assert_eq!(soup_line.price, dec!(15.75));
    assert_eq!(details.order.total_price, dec!(18.75));
}

#[tokio::test]
async fn partial_removal_keeps_snapshot_proportional() {
    let Some(pool) = common::pool().await else {
        return;
    };
    let conn = &mut pool.get().await.unwrap();

    let table_id = common::create_table(conn).await;
    let cake = common::create_meal(conn, "Cake", dec!(4.00)).await;
    let juice = common::create_meal(conn, "Juice", dec!(2.00)).await;
    let waitress = common::create_staff(conn, Role::Waitress).await;
    let order = order_service::create_order(conn, table_id, &waitress)
        .await
        .unwrap();
    order_service::add_items(conn, order.id, vec![item(cake, 3), item(juice, 1)])
        .await
        .unwrap();

    let outcome = order_service::remove_item(conn, order.id, cake, 1)
        .await
        .unwrap();
    let RemovalOutcome::Updated(details) = outcome else {
        panic!("order should survive a partial removal");
    };
    let cake_line = details.items.iter().find(|i| i.meal_id == cake).unwrap();
    assert_eq!(cake_line.quantity, 2);
    assert_eq!(cake_line.price, dec!(8.00));
    assert_eq!(details.order.total_price, dec!(10.00));

    let outcome = order_service::remove_item(conn, order.id, cake, 5)
        .await
        .unwrap();
    let RemovalOutcome::Updated(details) = outcome else {
        panic!("juice is still on the order");
    };
    assert_eq!(details.items.len(), 1);
    assert_eq!(details.order.total_price, dec!(2.00));

    let err = order_service::remove_item(conn, order.id, cake, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_additions_are_not_lost() {
    let Some(pool) = common::pool().await else {
        return;
    };
    let (order_id, espresso) = {
        let conn = &mut pool.get().await.unwrap();
        let table_id = common::create_table(conn).await;
        let espresso = common::create_meal(conn, "Espresso", dec!(2.50)).await;
        let waitress = common::create_staff(conn, Role::Waitress).await;
        let order = order_service::create_order(conn, table_id, &waitress)
            .await
            .unwrap();
        (order.id, espresso)
    };

    let mut handles = Vec::new();
    for _ in 0..8 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            let conn = &mut pool.get().await.unwrap();
            order_service::add_item(conn, order_id, item(espresso, 1))
                .await
                .map(|_| ())
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let conn = &mut pool.get().await.unwrap();
    let (quantity, price): (i32, Decimal) = order_items::table
        .filter(order_items::order_id.eq(order_id))
        .filter(order_items::meal_id.eq(espresso))
        .select((order_items::quantity, order_items::price))
        .get_result(conn)
        .await
        .unwrap();
    assert_eq!(quantity, 8);
    assert_eq!(price, dec!(20.00));

    let total: Decimal = orders::table
        .find(order_id)
        .select(orders::total_price)
        .get_result(conn)
        .await
        .unwrap();
    assert_eq!(total, dec!(20.00));
}

#[tokio::test]
async fn reassigning_respects_occupancy_and_roles() {
    let Some(pool) = common::pool().await else {
        return;
    };
    let conn = &mut pool.get().await.unwrap();

    let first = common::create_table(conn).await;
    let second = common::create_table(conn).await;
    let free = common::create_table(conn).await;
    let waitress = common::create_staff(conn, Role::Waitress).await;
    let colleague = common::create_staff(conn, Role::Waitress).await;
    let admin = common::create_staff(conn, Role::Admin).await;

    let order = order_service::create_order(conn, first, &waitress)
        .await
        .unwrap();
    order_service::create_order(conn, second, &colleague)
        .await
        .unwrap();

    let err = order_service::reassign_table(conn, order.id, second)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let err = order_service::reassign_table(conn, order.id, i32::MAX)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let moved = order_service::reassign_table(conn, order.id, free)
        .await
        .unwrap();
    assert_eq!(moved.table_id, free);
    assert!(tables::is_assignable(conn, first).await.unwrap());
    assert!(!tables::is_assignable(conn, free).await.unwrap());

    let err = order_service::reassign_waitress(conn, order.id, admin.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let handed = order_service::reassign_waitress(conn, order.id, colleague.id)
        .await
        .unwrap();
    assert_eq!(handed.waitress_id, Some(colleague.id));

    // The previous waitress no longer sees the order.
    let err = order_service::open_order_for_table(conn, free, &waitress)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert!(order_service::open_order_for_table(conn, free, &admin)
        .await
        .is_ok());
}

#[tokio::test]
async fn failed_print_keeps_the_payment() {
    let Some(pool) = common::pool().await else {
        return;
    };
    let conn = &mut pool.get().await.unwrap();

    let table_id = common::create_table(conn).await;
    let water = common::create_meal(conn, "Water", dec!(1.00)).await;
    let waitress = common::create_staff(conn, Role::Waitress).await;
    let order = order_service::create_order(conn, table_id, &waitress)
        .await
        .unwrap();
    order_service::add_item(conn, order.id, item(water, 1))
        .await
        .unwrap();

    let result = order_service::checkout(conn, &DisabledPrinter, chrono_tz::Tz::UTC, order.id, true)
        .await
        .unwrap();
    assert!(result.order.is_paid);
    assert!(!result.order.is_check_printed);
    assert!(matches!(result.print, PrintOutcome::Failed { .. }));

    let paid: bool = orders::table
        .find(order.id)
        .select(orders::is_paid)
        .get_result(conn)
        .await
        .unwrap();
    assert!(paid);
}

#[tokio::test]
async fn checkout_prints_an_itemized_receipt() {
    let Some(pool) = common::pool().await else {
        return;
    };
    let conn = &mut pool.get().await.unwrap();
    let printer = RecordingPrinter::default();

    let table_id = common::create_table(conn).await;
    let latte = common::create_meal(conn, "Latte", dec!(4.00)).await;
    let cookie = common::create_meal(conn, "Cookie", dec!(1.20)).await;
    let waitress = common::create_staff(conn, Role::Waitress).await;
    let order = order_service::create_order(conn, table_id, &waitress)
        .await
        .unwrap();
    order_service::add_items(conn, order.id, vec![item(latte, 2), item(cookie, 3)])
        .await
        .unwrap();

    let result = order_service::checkout(conn, &printer, chrono_tz::Tz::UTC, order.id, true)
        .await
        .unwrap();
    assert_eq!(result.print, PrintOutcome::Printed);
    assert!(result.order.is_check_printed);

    let printed = printer.receipts.lock().unwrap();
    assert_eq!(printed.len(), 1);
    let receipt = &printed[0];
    assert_eq!(receipt.title, format!("CHECK #{}", order.id));
    assert_eq!(receipt.total, dec!(11.60));
    assert_eq!(receipt.lines.len(), 2);
    assert_eq!(receipt.lines[1].unit_price, Some(dec!(1.20)));
    assert!(receipt
        .header
        .iter()
        .any(|field| field.label == "Waitress" && field.value == waitress.name));
}

#[tokio::test]
async fn check_prints_once_until_reset() {
    let Some(pool) = common::pool().await else {
        return;
    };
    let conn = &mut pool.get().await.unwrap();
    let printer = RecordingPrinter::default();
    let tz = chrono_tz::Tz::UTC;

    let table_id = common::create_table(conn).await;
    let pasta = common::create_meal(conn, "Pasta", dec!(9.90)).await;
    let waitress = common::create_staff(conn, Role::Waitress).await;
    let order = order_service::create_order(conn, table_id, &waitress)
        .await
        .unwrap();
    order_service::add_item(conn, order.id, item(pasta, 1))
        .await
        .unwrap();

    let err = receipts::reset_check_printed(conn, table_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    assert!(tables::can_print_receipt(conn, table_id).await.unwrap());
    let printed = receipts::print_check(conn, &printer, tz, &order, false)
        .await
        .unwrap();
    assert!(printed.is_check_printed);
    assert!(!tables::can_print_receipt(conn, table_id).await.unwrap());

    let err = receipts::print_check(conn, &printer, tz, &printed, false)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    receipts::print_check(conn, &printer, tz, &printed, true)
        .await
        .unwrap();
    assert_eq!(printer.receipts.lock().unwrap().len(), 2);

    let reset = receipts::reset_check_printed(conn, table_id).await.unwrap();
    assert!(!reset.is_check_printed);
    assert!(tables::can_print_receipt(conn, table_id).await.unwrap());

    let err = receipts::print_check(conn, &DisabledPrinter, tz, &reset, false)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ServiceUnreachable(_)));
    assert!(tables::can_print_receipt(conn, table_id).await.unwrap());
}

#[tokio::test]
async fn oversized_quantities_are_rejected() {
    let Some(pool) = common::pool().await else {
        return;
    };
    let conn = &mut pool.get().await.unwrap();

    let table_id = common::create_table(conn).await;
    let latte = common::create_meal(conn, "Latte", dec!(4.00)).await;
    let caviar = common::create_meal(conn, "Caviar", dec!(999999.99)).await;
    let waitress = common::create_staff(conn, Role::Waitress).await;
    let order = order_service::create_order(conn, table_id, &waitress)
        .await
        .unwrap();

    let err = order_service::add_item(conn, order.id, item(latte, i32::MAX))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    order_service::add_item(conn, order.id, item(latte, 1))
        .await
        .unwrap();
    let err = order_service::add_item(conn, order.id, item(latte, i32::MAX))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    // Each request is in range but the stored quantity would not be.
    let err = order_service::add_item(conn, order.id, item(latte, pricing::MAX_QUANTITY))
        .await
        .unwrap_err();
    match err {
        AppError::BadRequest(what) => assert!(what.contains(&format!("Meal #{latte}"))),
        other => panic!("unexpected error {other:?}"),
    }

    let err = order_service::add_item(conn, order.id, item(caviar, pricing::MAX_QUANTITY))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    order_service::add_item(conn, order.id, item(caviar, 99))
        .await
        .unwrap();
    // The line still fits, the order total would not.
    let err = order_service::add_item(conn, order.id, item(caviar, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let current = tables::current_order(conn, table_id).await.unwrap().unwrap();
    let details = order_service::load_details(conn, current)
        .await
        .unwrap();
    let latte_line = details.items.iter().find(|i| i.meal_id == latte).unwrap();
    assert_eq!(latte_line.quantity, 1);
    assert_eq!(details.order.total_price, dec!(99000003.01));
}
