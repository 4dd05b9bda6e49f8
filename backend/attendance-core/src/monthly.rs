// src/monthly.rs
use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, TimeZone, Weekday};
use chrono_tz::Tz;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::attendance::DayRecord;
use crate::config::{NOT_AVAILABLE, TARGET_TIMEZONE};

/// One row of a user's month grid.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthDay {
    pub day_name: &'static str,
    pub record: DayRecord,
}

/// Display name -> one entry per calendar day of the month, ascending.
pub type MonthlyReport = BTreeMap<String, Vec<MonthDay>>;

pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Sat => "السبت",
        Weekday::Sun => "الأحد",
        Weekday::Mon => "الاثنين",
        Weekday::Tue => "الثلاثاء",
        Weekday::Wed => "الأربعاء",
        Weekday::Thu => "الخميس",
        Weekday::Fri => "الجمعة",
    }
}

pub fn first_day_of_month(now: &DateTime<Tz>) -> NaiveDate {
    now.date_naive() - Days::new(u64::from(now.day0()))
}

/// First instant of `now`'s month in the target zone.
pub fn month_start(now: &DateTime<Tz>) -> DateTime<Tz> {
    let midnight = first_day_of_month(now).and_time(NaiveTime::MIN);
    TARGET_TIMEZONE
        .from_local_datetime(&midnight)
        .earliest()
        // midnight skipped by a DST jump
        .unwrap_or_else(|| TARGET_TIMEZONE.from_utc_datetime(&midnight))
}

/// Every calendar date of `now`'s month, ascending.
pub fn month_dates(now: &DateTime<Tz>) -> Vec<NaiveDate> {
    let first = first_day_of_month(now);
    let next_month = first + Months::new(1);
    first.iter_days().take_while(|d| *d < next_month).collect()
}

/// Expands each user's sparse records into the full month, synthesizing
/// `absent` rows for days without messages.
pub fn fill_month(
    report_by_user: BTreeMap<String, Vec<DayRecord>>,
    now: &DateTime<Tz>,
) -> MonthlyReport {
    let dates = month_dates(now);

    report_by_user
        .into_iter()
        .map(|(user_name, records)| {
            let user_id = records
                .first()
                .map(|r| r.user_id.clone())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string());

            let mut by_date: HashMap<NaiveDate, DayRecord> =
                records.into_iter().map(|r| (r.date, r)).collect();

            let days: Vec<MonthDay> = dates
                .iter()
                .map(|date| MonthDay {
                    day_name: weekday_name(date.weekday()),
                    record: by_date
                        .remove(date)
                        .unwrap_or_else(|| DayRecord::absent(&user_id, *date)),
                })
                .collect();

            if !by_date.is_empty() {
                debug!(
                    user = %user_name,
                    dropped = by_date.len(),
                    "Dropped records dated outside the report month"
                );
            }

            (user_name, days)
        })
        .collect()
}
