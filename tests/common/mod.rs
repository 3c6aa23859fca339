#![allow(dead_code)]

use std::sync::{
    Mutex, Once,
    atomic::{AtomicUsize, Ordering},
};

use chrono::{DateTime, NaiveDate, Utc};
use diesel::{Connection, ExpressionMethods, PgConnection};
use diesel_async::RunQueryDsl;
use diesel_migrations::MigrationHarness;
use futures::future::BoxFuture;
use restobook_orderservice::{
    common::{
        aliases::{DbConnection, DbPool},
        db,
    },
    permissions::{Actor, Role},
    printing::{PrintResult, Receipt, ReceiptPrinter},
    schema::{dining_tables, meals, orders, rooms, staff, statistics},
};
use rust_decimal::Decimal;

static MIGRATE: Once = Once::new();
static COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Pool against `DATABASE_URL`, or `None` when the tests should be skipped.
pub async fn pool() -> Option<DbPool> {
    let _ = dotenvy::dotenv();
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping database test");
        return None;
    };

    MIGRATE.call_once(|| {
        let mut conn = PgConnection::establish(&url).expect("connect for migrations");
        conn.run_pending_migrations(db::MIGRATIONS)
            .expect("run migrations");
    });

    Some(db::create_pool(&url, 8).await.expect("create pool"))
}

pub fn unique(prefix: &str) -> String {
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{prefix}-{}-{nanos}-{n}", std::process::id())
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn noon(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(12, 0, 0).unwrap().and_utc()
}

pub async fn create_table(conn: &mut DbConnection) -> i32 {
    let room_id: i32 = diesel::insert_into(rooms::table)
        .values(rooms::name.eq(unique("room")))
        .returning(rooms::id)
        .get_result(conn)
        .await
        .unwrap();

    diesel::insert_into(dining_tables::table)
        .values((
            dining_tables::number.eq(unique("T")),
            dining_tables::capacity.eq(Some(4)),
            dining_tables::room_id.eq(Some(room_id)),
        ))
        .returning(dining_tables::id)
        .get_result(conn)
        .await
        .unwrap()
}

pub async fn create_meal(conn: &mut DbConnection, name: &str, price: Decimal) -> i32 {
    diesel::insert_into(meals::table)
        .values((meals::name.eq(name), meals::price.eq(price)))
        .returning(meals::id)
        .get_result(conn)
        .await
        .unwrap()
}

pub async fn create_staff(conn: &mut DbConnection, role: Role) -> Actor {
    let username = unique(role.as_str());
    let id: i32 = diesel::insert_into(staff::table)
        .values((
            staff::username.eq(&username),
            staff::first_name.eq("Test"),
            staff::last_name.eq(role.as_str()),
            staff::role.eq(role.as_str()),
        ))
        .returning(staff::id)
        .get_result(conn)
        .await
        .unwrap();

    Actor {
        id,
        role,
        name: format!("Test {}", role.as_str()),
    }
}

pub async fn insert_order(
    conn: &mut DbConnection,
    table_id: i32,
    waitress_id: i32,
    total: Decimal,
    paid: bool,
    at: DateTime<Utc>,
) -> i32 {
    diesel::insert_into(orders::table)
        .values((
            orders::table_id.eq(table_id),
            orders::waitress_id.eq(Some(waitress_id)),
            orders::is_paid.eq(paid),
            orders::total_price.eq(total),
            orders::created_at.eq(at),
        ))
        .returning(orders::id)
        .get_result(conn)
        .await
        .unwrap()
}

/// Removes orders and statistics of `year` left behind by earlier runs.
pub async fn clear_year(conn: &mut DbConnection, year: i32) {
    let (from, to) = (day(year, 1, 1), day(year, 12, 31));
    diesel::delete(statistics::table)
        .filter(statistics::date.between(from, to))
        .execute(conn)
        .await
        .unwrap();
    diesel::delete(orders::table)
        .filter(orders::created_at.ge(noon(from) - chrono::Duration::days(1)))
        .filter(orders::created_at.le(noon(to) + chrono::Duration::days(1)))
        .execute(conn)
        .await
        .unwrap();
}

/// Keeps every receipt it is asked to print.
#[derive(Default)]
pub struct RecordingPrinter {
    pub receipts: Mutex<Vec<Receipt>>,
}

impl ReceiptPrinter for RecordingPrinter {
    fn name(&self) -> String {
        "recording".to_string()
    }

    fn send_receipt<'a>(&'a self, receipt: &'a Receipt) -> BoxFuture<'a, PrintResult<()>> {
        Box::pin(async move {
            self.receipts.lock().unwrap().push(receipt.clone());
            Ok(())
        })
    }
}
