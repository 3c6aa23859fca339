//! Business calendar: which days, months and years a statistics run covers, and the UTC
//! range a local business day spans.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

pub fn today(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}

pub fn yesterday(today: NaiveDate) -> NaiveDate {
    today - Days::new(1)
}

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.day0()))
}

pub fn last_of_month(date: NaiveDate) -> NaiveDate {
    first_of_month(date) + Months::new(1) - Days::new(1)
}

pub fn first_of_year(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.ordinal0()))
}

pub fn last_of_year(date: NaiveDate) -> NaiveDate {
    first_of_year(date) + Months::new(12) - Days::new(1)
}

/// Every day of the month containing `date`.
pub fn month_days(date: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    let last = last_of_month(date);
    first_of_month(date)
        .iter_days()
        .take_while(move |day| *day <= last)
}

/// Days of `date`'s month that are already over on `today`.
pub fn backfill_days(date: NaiveDate, today: NaiveDate) -> Vec<NaiveDate> {
    month_days(date).filter(|day| *day < today).collect()
}

/// First-of-month anchors from January through `date`'s month.
pub fn months_through(date: NaiveDate) -> Vec<NaiveDate> {
    let last = first_of_month(date);
    let mut months = Vec::with_capacity(date.month() as usize);
    let mut month = first_of_year(date);
    while month <= last {
        months.push(month);
        month = month + Months::new(1);
    }
    months
}

/// Half-open UTC range `[start, end)` covering the local day `date` in `tz`.
pub fn day_bounds(date: NaiveDate, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    (local_midnight(date, tz), local_midnight(date + Days::new(1), tz))
}

fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    // Skipped midnights (DST gaps) fall back to the UTC reading of the same wall clock.
    tz.from_local_datetime(&midnight)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| midnight.and_utc())
}
