//! Revenue roll-ups.
//!
//! Paid orders are summed per waitress and per day, days into months and months into years.
//! Each level writes one `statistics` row per `(title, date, waitress_id)`, so re-running a
//! calculation replaces the previous figure instead of adding to it. The Z-report closes a
//! day: its figures are stored and the day's paid orders are deleted in one transaction.

use std::collections::HashMap;

use chrono::{DateTime, Days, NaiveDate, Utc};
use chrono_tz::Tz;
use diesel::{
    ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper,
    dsl::{self, count_star, now},
};
use diesel_async::{AsyncConnection, RunQueryDsl};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

use crate::{
    calendar,
    common::{aliases::DbConnection, app_error::AppError},
    models::{CreateStatisticsEntity, StaffEntity, StatisticsEntity, StatisticsTitle},
    printing::{Receipt, ReceiptLine},
    schema::{orders, staff, statistics},
    services::receipts,
};

/// `waitress_id` stored on every row that is not a per-waitress row.
pub const NO_WAITRESS: i32 = 0;

/// An overwrite that changes an already recorded, non-zero figure.
pub fn is_inconsistent_overwrite(previous: Decimal, next: Decimal) -> bool {
    !previous.is_zero() && previous != next
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ZReport {
    pub date: NaiveDate,
    pub daily: Option<StatisticsEntity>,
    pub per_waitress: Vec<StatisticsEntity>,
    pub deleted_orders: usize,
}

#[derive(Serialize, Debug, PartialEq, ToSchema)]
pub struct ActiveOrdersSummary {
    pub total_paid: Decimal,
    pub total_unpaid: Decimal,
    pub paid_orders: i64,
    pub unpaid_orders: i64,
}

#[derive(Deserialize, Debug, Default, IntoParams)]
pub struct StatisticsFilter {
    pub title: Option<StatisticsTitle>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub waitress_id: Option<i32>,
}

/// Runs the roll-ups in the business timezone, which decides the calendar day of an order.
#[derive(Debug, Clone, Copy)]
pub struct Aggregator {
    tz: Tz,
}

impl Aggregator {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn today(&self) -> NaiveDate {
        calendar::today(self.tz)
    }

    /// Statistics are normally run the morning after, so the default day is yesterday.
    pub fn resolve(&self, date: Option<NaiveDate>) -> NaiveDate {
        date.unwrap_or_else(|| calendar::yesterday(self.today()))
    }

    pub async fn calculate_per_waitress(
        &self,
        conn: &mut DbConnection,
        date: NaiveDate,
    ) -> Result<Vec<StatisticsEntity>, AppError> {
        if is_archived(conn, date).await? {
            info!(%date, "Day already archived, keeping per-waitress figures");
            return per_waitress_rows(conn, date).await;
        }

        let order_ids = self.paid_order_ids(conn, date).await?;
        write_per_waitress(conn, date, &order_ids).await
    }

    /// Per-waitress rows are written first; an existing daily row is returned unchanged.
    pub async fn calculate_daily(
        &self,
        conn: &mut DbConnection,
        date: NaiveDate,
    ) -> Result<Option<StatisticsEntity>, AppError> {
        self.calculate_per_waitress(conn, date).await?;

        if let Some(existing) = find_statistic(conn, StatisticsTitle::Daily, date).await? {
            return Ok(Some(existing));
        }

        let total = self.paid_total(conn, date).await?;
        if total.is_zero() {
            return Ok(None);
        }

        let row = upsert_statistic(conn, period_row(StatisticsTitle::Daily, date, total)).await?;
        info!(%date, total = %row.total, "Daily statistic stored");
        Ok(Some(row))
    }

    pub async fn calculate_monthly(
        &self,
        conn: &mut DbConnection,
        date: NaiveDate,
    ) -> Result<Option<StatisticsEntity>, AppError> {
        for day in calendar::backfill_days(date, self.today()) {
            self.calculate_daily(conn, day).await?;
        }

        let first = calendar::first_of_month(date);
        let total = sum_rows(
            conn,
            StatisticsTitle::Daily,
            first,
            calendar::last_of_month(date),
        )
        .await?;
        if total.is_zero() {
            return Ok(None);
        }

        let row = upsert_statistic(conn, period_row(StatisticsTitle::Monthly, first, total)).await?;
        info!(month = %first, total = %row.total, "Monthly statistic stored");
        Ok(Some(row))
    }

    pub async fn calculate_yearly(
        &self,
        conn: &mut DbConnection,
        date: NaiveDate,
    ) -> Result<Option<StatisticsEntity>, AppError> {
        for month in calendar::months_through(date) {
            self.calculate_monthly(conn, month).await?;
        }

        let first = calendar::first_of_year(date);
        let total = sum_rows(
            conn,
            StatisticsTitle::Monthly,
            first,
            calendar::last_of_year(date),
        )
        .await?;
        if total.is_zero() {
            return Ok(None);
        }

        let row = upsert_statistic(conn, period_row(StatisticsTitle::Yearly, first, total)).await?;
        info!(year = %first, total = %row.total, "Yearly statistic stored");
        Ok(Some(row))
    }

    /// Yearly roll-ups from the first recorded business day through yesterday.
    pub async fn calculate_till_now(
        &self,
        conn: &mut DbConnection,
    ) -> Result<Vec<StatisticsEntity>, AppError> {
        let yesterday = calendar::yesterday(self.today());
        let Some(start) = self.first_recorded_day(conn).await? else {
            return Ok(Vec::new());
        };
        if start > yesterday {
            return Ok(Vec::new());
        }

        let mut anchors = Vec::new();
        let mut anchor = yesterday;
        loop {
            anchors.push(anchor);
            let first = calendar::first_of_year(anchor);
            if first <= start {
                break;
            }
            anchor = first - Days::new(1);
        }

        let mut rows = Vec::new();
        for anchor in anchors.into_iter().rev() {
            if let Some(row) = self.calculate_yearly(conn, anchor).await? {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    /// Z-report: stores the day's figures, then deletes its paid orders.
    ///
    /// A day that was already archived gets the newly paid orders added on top of the
    /// stored figures. Otherwise the stored daily figure is reconciled with the paid orders.
    /// Every figure is taken from the orders locked up front, which are exactly the ones deleted.
    pub async fn delete_orders_for_day(
        &self,
        conn: &mut DbConnection,
        date: NaiveDate,
    ) -> Result<ZReport, AppError> {
        let (start, end) = calendar::day_bounds(date, self.tz);

        let report = conn
            .transaction(move |conn| {
                Box::pin(async move {
                    let order_ids: Vec<i32> = orders::table
                        .filter(orders::is_paid.eq(true))
                        .filter(orders::created_at.ge(start))
                        .filter(orders::created_at.lt(end))
                        .select(orders::id)
                        .for_update()
                        .load(conn)
                        .await?;
                    // Only the locked orders count: anything paid after the lock is left
                    // for the next Z-report.
                    let live = total_of_orders(conn, &order_ids).await?;

                    let existing: Option<StatisticsEntity> = statistics::table
                        .filter(statistics::title.eq(StatisticsTitle::Daily.as_str()))
                        .filter(statistics::date.eq(date))
                        .filter(statistics::waitress_id.eq(NO_WAITRESS))
                        .select(StatisticsEntity::as_select())
                        .for_update()
                        .get_result(conn)
                        .await
                        .optional()?;

                    let daily = match existing {
                        Some(row) if row.is_z_checked => {
                            if live.is_zero() {
                                Some(row)
                            } else {
                                accumulate_per_waitress(conn, date, &order_ids).await?;
                                Some(
                                    accumulate_statistic(
                                        conn,
                                        period_row(StatisticsTitle::Daily, date, live),
                                    )
                                    .await?,
                                )
                            }
                        }
                        Some(row) => {
                            write_per_waitress(conn, date, &order_ids).await?;
                            if live.is_zero() || row.total == live {
                                Some(row)
                            } else {
                                warn!(
                                    %date,
                                    stored = %row.total,
                                    orders = %live,
                                    "Daily statistic differs from paid orders, using the orders"
                                );
                                Some(
                                    upsert_statistic(
                                        conn,
                                        period_row(StatisticsTitle::Daily, date, live),
                                    )
                                    .await?,
                                )
                            }
                        }
                        None => {
                            write_per_waitress(conn, date, &order_ids).await?;
                            if live.is_zero() {
                                None
                            } else {
                                Some(
                                    upsert_statistic(
                                        conn,
                                        period_row(StatisticsTitle::Daily, date, live),
                                    )
                                    .await?,
                                )
                            }
                        }
                    };

                    let deleted_orders = diesel::delete(orders::table)
                        .filter(orders::id.eq_any(&order_ids))
                        .execute(conn)
                        .await?;

                    let daily = match daily {
                        Some(row) => Some(
                            diesel::update(statistics::table.find(row.id))
                                .set((
                                    statistics::is_z_checked.eq(true),
                                    statistics::updated_at.eq(now),
                                ))
                                .returning(StatisticsEntity::as_returning())
                                .get_result(conn)
                                .await?,
                        ),
                        None => None,
                    };

                    let per_waitress = per_waitress_rows(conn, date).await?;

                    Ok::<ZReport, AppError>(ZReport {
                        date,
                        daily,
                        per_waitress,
                        deleted_orders,
                    })
                })
            })
            .await?;

        info!(
            %date,
            deleted = report.deleted_orders,
            total = %report.daily.as_ref().map(|row| row.total).unwrap_or_default(),
            "Z-report completed"
        );
        Ok(report)
    }

    /// Totals of all paid and all unpaid orders still on record.
    pub async fn active_orders(
        &self,
        conn: &mut DbConnection,
    ) -> Result<ActiveOrdersSummary, AppError> {
        let groups: Vec<(bool, i64, Option<Decimal>)> = orders::table
            .group_by(orders::is_paid)
            .select((orders::is_paid, count_star(), dsl::sum(orders::total_price)))
            .load(conn)
            .await?;

        Ok(summarize_active_orders(&groups))
    }

    /// Slip printed after a Z-report.
    pub fn z_report_receipt(&self, report: &ZReport) -> Receipt {
        let mut receipt = Receipt::new("Z-REPORT", receipts::local_timestamp(self.tz))
            .field("Day", report.date.format("%d.%m.%Y").to_string())
            .field("Orders archived", report.deleted_orders.to_string());

        for row in &report.per_waitress {
            receipt = receipt.line(ReceiptLine {
                name: row
                    .waitress_info
                    .clone()
                    .unwrap_or_else(|| format!("#{}", row.waitress_id)),
                quantity: None,
                unit_price: None,
                amount: row.total,
            });
        }

        receipt.total(report.daily.as_ref().map(|row| row.total).unwrap_or_default())
    }

    async fn paid_total(&self, conn: &mut DbConnection, date: NaiveDate) -> Result<Decimal, AppError> {
        let (start, end) = calendar::day_bounds(date, self.tz);
        paid_total_between(conn, start, end).await
    }

    async fn paid_order_ids(
        &self,
        conn: &mut DbConnection,
        date: NaiveDate,
    ) -> Result<Vec<i32>, AppError> {
        let (start, end) = calendar::day_bounds(date, self.tz);
        let ids = orders::table
            .filter(orders::is_paid.eq(true))
            .filter(orders::created_at.ge(start))
            .filter(orders::created_at.lt(end))
            .select(orders::id)
            .load(conn)
            .await?;
        Ok(ids)
    }

    /// Earliest local day with a paid order or a stored daily figure.
    async fn first_recorded_day(
        &self,
        conn: &mut DbConnection,
    ) -> Result<Option<NaiveDate>, AppError> {
        let first_order: Option<DateTime<Utc>> = orders::table
            .filter(orders::is_paid.eq(true))
            .select(dsl::min(orders::created_at))
            .get_result(conn)
            .await?;
        let first_daily: Option<NaiveDate> = statistics::table
            .filter(statistics::title.eq(StatisticsTitle::Daily.as_str()))
            .select(dsl::min(statistics::date))
            .get_result(conn)
            .await?;

        let first_order = first_order.map(|at| at.with_timezone(&self.tz).date_naive());
        Ok(match (first_order, first_daily) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        })
    }
}

pub async fn list_statistics(
    conn: &mut DbConnection,
    filter: &StatisticsFilter,
) -> Result<Vec<StatisticsEntity>, AppError> {
    let mut query = statistics::table
        .select(StatisticsEntity::as_select())
        .into_boxed();

    if let Some(title) = filter.title {
        query = query.filter(statistics::title.eq(title.as_str()));
    }
    if let Some(from) = filter.from {
        query = query.filter(statistics::date.ge(from));
    }
    if let Some(to) = filter.to {
        query = query.filter(statistics::date.le(to));
    }
    if let Some(waitress_id) = filter.waitress_id {
        query = query.filter(statistics::waitress_id.eq(waitress_id));
    }

    let rows = query
        .order_by((
            statistics::date.desc(),
            statistics::title.asc(),
            statistics::waitress_id.asc(),
        ))
        .load(conn)
        .await?;
    Ok(rows)
}

fn summarize_active_orders(groups: &[(bool, i64, Option<Decimal>)]) -> ActiveOrdersSummary {
    let mut summary = ActiveOrdersSummary {
        total_paid: Decimal::ZERO,
        total_unpaid: Decimal::ZERO,
        paid_orders: 0,
        unpaid_orders: 0,
    };
    for (is_paid, count, total) in groups {
        let total = total.unwrap_or_default();
        if *is_paid {
            summary.total_paid += total;
            summary.paid_orders += count;
        } else {
            summary.total_unpaid += total;
            summary.unpaid_orders += count;
        }
    }
    summary
}

fn period_row(title: StatisticsTitle, date: NaiveDate, total: Decimal) -> CreateStatisticsEntity {
    CreateStatisticsEntity {
        title: title.to_string(),
        date,
        total,
        waitress_id: NO_WAITRESS,
        waitress_info: None,
    }
}

async fn paid_total_between(
    conn: &mut DbConnection,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Decimal, AppError> {
    let total: Option<Decimal> = orders::table
        .filter(orders::is_paid.eq(true))
        .filter(orders::created_at.ge(start))
        .filter(orders::created_at.lt(end))
        .select(dsl::sum(orders::total_price))
        .get_result(conn)
        .await?;
    Ok(total.unwrap_or_default())
}

async fn total_of_orders(conn: &mut DbConnection, order_ids: &[i32]) -> Result<Decimal, AppError> {
    let total: Option<Decimal> = orders::table
        .filter(orders::id.eq_any(order_ids))
        .select(dsl::sum(orders::total_price))
        .get_result(conn)
        .await?;
    Ok(total.unwrap_or_default())
}

async fn paid_totals_by_waitress(
    conn: &mut DbConnection,
    order_ids: &[i32],
) -> Result<Vec<(i32, Decimal)>, AppError> {
    let rows: Vec<(Option<i32>, Option<Decimal>)> = orders::table
        .filter(orders::id.eq_any(order_ids))
        .filter(orders::waitress_id.is_not_null())
        .group_by(orders::waitress_id)
        .select((orders::waitress_id, dsl::sum(orders::total_price)))
        .load(conn)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(waitress_id, total)| Some((waitress_id?, total.unwrap_or_default())))
        .collect())
}

fn per_waitress_row(
    date: NaiveDate,
    waitress_id: i32,
    total: Decimal,
    labels: &HashMap<i32, String>,
) -> CreateStatisticsEntity {
    CreateStatisticsEntity {
        title: StatisticsTitle::PerWaitress.to_string(),
        date,
        total,
        waitress_id,
        waitress_info: labels.get(&waitress_id).cloned(),
    }
}

/// Stores the per-waitress figures of `order_ids`, replacing earlier ones.
async fn write_per_waitress(
    conn: &mut DbConnection,
    date: NaiveDate,
    order_ids: &[i32],
) -> Result<Vec<StatisticsEntity>, AppError> {
    let totals = paid_totals_by_waitress(conn, order_ids).await?;
    let labels = waitress_labels(conn, &totals).await?;

    let mut rows = Vec::with_capacity(totals.len());
    for (waitress_id, total) in totals {
        let row = per_waitress_row(date, waitress_id, total, &labels);
        rows.push(upsert_statistic(conn, row).await?);
    }
    Ok(rows)
}

/// Adds the per-waitress figures of `order_ids` on top of the stored ones.
async fn accumulate_per_waitress(
    conn: &mut DbConnection,
    date: NaiveDate,
    order_ids: &[i32],
) -> Result<(), AppError> {
    let totals = paid_totals_by_waitress(conn, order_ids).await?;
    let labels = waitress_labels(conn, &totals).await?;

    for (waitress_id, total) in totals {
        accumulate_statistic(conn, per_waitress_row(date, waitress_id, total, &labels)).await?;
    }
    Ok(())
}

async fn sum_rows(
    conn: &mut DbConnection,
    title: StatisticsTitle,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Decimal, AppError> {
    let total: Option<Decimal> = statistics::table
        .filter(statistics::title.eq(title.as_str()))
        .filter(statistics::waitress_id.eq(NO_WAITRESS))
        .filter(statistics::date.between(from, to))
        .select(dsl::sum(statistics::total))
        .get_result(conn)
        .await?;
    Ok(total.unwrap_or_default())
}

async fn find_statistic(
    conn: &mut DbConnection,
    title: StatisticsTitle,
    date: NaiveDate,
) -> Result<Option<StatisticsEntity>, AppError> {
    let row = statistics::table
        .filter(statistics::title.eq(title.as_str()))
        .filter(statistics::date.eq(date))
        .filter(statistics::waitress_id.eq(NO_WAITRESS))
        .select(StatisticsEntity::as_select())
        .get_result(conn)
        .await
        .optional()?;
    Ok(row)
}

async fn is_archived(conn: &mut DbConnection, date: NaiveDate) -> Result<bool, AppError> {
    Ok(find_statistic(conn, StatisticsTitle::Daily, date)
        .await?
        .is_some_and(|row| row.is_z_checked))
}

async fn per_waitress_rows(
    conn: &mut DbConnection,
    date: NaiveDate,
) -> Result<Vec<StatisticsEntity>, AppError> {
    let rows = statistics::table
        .filter(statistics::title.eq(StatisticsTitle::PerWaitress.as_str()))
        .filter(statistics::date.eq(date))
        .order_by(statistics::waitress_id.asc())
        .select(StatisticsEntity::as_select())
        .load(conn)
        .await?;
    Ok(rows)
}

async fn waitress_labels(
    conn: &mut DbConnection,
    totals: &[(i32, Decimal)],
) -> Result<HashMap<i32, String>, AppError> {
    let ids: Vec<i32> = totals.iter().map(|(id, _)| *id).collect();
    let members: Vec<StaffEntity> = staff::table
        .filter(staff::id.eq_any(&ids))
        .select(StaffEntity::as_select())
        .load(conn)
        .await?;

    Ok(members
        .into_iter()
        .map(|member| (member.id, member.statistics_label()))
        .collect())
}

/// Writes `row`, replacing the figure stored under the same key.
async fn upsert_statistic(
    conn: &mut DbConnection,
    row: CreateStatisticsEntity,
) -> Result<StatisticsEntity, AppError> {
    conn.transaction(move |conn| {
        Box::pin(async move {
            let previous: Option<Decimal> = statistics::table
                .filter(statistics::title.eq(&row.title))
                .filter(statistics::date.eq(row.date))
                .filter(statistics::waitress_id.eq(row.waitress_id))
                .select(statistics::total)
                .for_update()
                .get_result(conn)
                .await
                .optional()?;

            if let Some(previous) = previous {
                if is_inconsistent_overwrite(previous, row.total) {
                    warn!(
                        title = %row.title,
                        date = %row.date,
                        waitress_id = row.waitress_id,
                        previous = %previous,
                        next = %row.total,
                        "Overwriting a recorded statistic with a different total"
                    );
                }
            }

            let saved = diesel::insert_into(statistics::table)
                .values(&row)
                .on_conflict((statistics::title, statistics::date, statistics::waitress_id))
                .do_update()
                .set((
                    statistics::total.eq(row.total),
                    statistics::waitress_info.eq(row.waitress_info.clone()),
                    statistics::updated_at.eq(now),
                ))
                .returning(StatisticsEntity::as_returning())
                .get_result(conn)
                .await?;

            Ok::<StatisticsEntity, AppError>(saved)
        })
    })
    .await
}

/// Adds `row.total` onto the figure stored under the same key.
async fn accumulate_statistic(
    conn: &mut DbConnection,
    row: CreateStatisticsEntity,
) -> Result<StatisticsEntity, AppError> {
    let saved = diesel::insert_into(statistics::table)
        .values(&row)
        .on_conflict((statistics::title, statistics::date, statistics::waitress_id))
        .do_update()
        .set((
            statistics::total.eq(statistics::total + row.total),
            statistics::updated_at.eq(now),
        ))
        .returning(StatisticsEntity::as_returning())
        .get_result(conn)
        .await?;
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn row(waitress_id: i32, info: Option<&str>, total: Decimal) -> StatisticsEntity {
        StatisticsEntity {
            id: waitress_id,
            title: StatisticsTitle::PerWaitress.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            total,
            waitress_id,
            waitress_info: info.map(str::to_string),
            is_z_checked: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_overwrite_of_zero_is_not_inconsistent() {
        assert!(!is_inconsistent_overwrite(Decimal::ZERO, dec!(10)));
        assert!(!is_inconsistent_overwrite(dec!(10.00), dec!(10)));
        assert!(is_inconsistent_overwrite(dec!(10), dec!(12.5)));
    }

    #[test]
    fn test_resolve_defaults_to_yesterday() {
        let aggregator = Aggregator::new(Tz::UTC);
        let given = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(aggregator.resolve(Some(given)), given);
        assert_eq!(
            aggregator.resolve(None),
            calendar::yesterday(calendar::today(Tz::UTC))
        );
    }

    #[test]
    fn test_summarize_active_orders() {
        let summary = summarize_active_orders(&[
            (true, 2, Some(dec!(75.00))),
            (false, 1, Some(dec!(12.00))),
        ]);
        assert_eq!(
            summary,
            ActiveOrdersSummary {
                total_paid: dec!(75.00),
                total_unpaid: dec!(12.00),
                paid_orders: 2,
                unpaid_orders: 1,
            }
        );

        let empty = summarize_active_orders(&[]);
        assert_eq!(empty.total_paid, Decimal::ZERO);
        assert_eq!(empty.unpaid_orders, 0);
    }

    #[test]
    fn test_z_report_receipt_lists_waitresses() {
        let aggregator = Aggregator::new(Tz::UTC);
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let mut daily = row(NO_WAITRESS, None, dec!(75.00));
        daily.title = StatisticsTitle::Daily.to_string();

        let report = ZReport {
            date,
            daily: Some(daily),
            per_waitress: vec![
                row(3, Some("aysel - Aysel Mammadova"), dec!(30.00)),
                row(4, None, dec!(45.00)),
            ],
            deleted_orders: 2,
        };

        let receipt = aggregator.z_report_receipt(&report);
        assert_eq!(receipt.title, "Z-REPORT");
        assert_eq!(receipt.header[0].value, "01.05.2024");
        assert_eq!(receipt.header[1].value, "2");
        assert_eq!(receipt.lines[0].name, "aysel - Aysel Mammadova");
        assert_eq!(receipt.lines[1].name, "#4");
        assert_eq!(receipt.total, dec!(75.00));
    }
}
