// src/attendance.rs
use chrono::{DateTime, NaiveDate, Timelike};
use chrono_tz::Tz;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::config::{
    CHECK_OUT_HOUR_THRESHOLD, NOT_AVAILABLE, STANDARD_WORK_SECONDS, TARGET_TIMEZONE,
};
use crate::slack_client::{HistoryMessage, SlackError};

const PERMISSION_KEYWORDS: [&str; 2] = ["pr", "permission"];

// --- Attendance Structures ---

/// A genuine user-authored channel message.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    pub user_id: String,
    pub timestamp: f64,
    pub text: String,
}

impl RawMessage {
    /// Keeps only messages that carry a user id and no subtype (joins, edits,
    /// bot notices). Returns `Ok(None)` for anything filtered out.
    pub fn from_history(message: HistoryMessage) -> Result<Option<Self>, SlackError> {
        if message.subtype.is_some() {
            return Ok(None);
        }
        let Some(user_id) = message.user else {
            return Ok(None);
        };
        let timestamp = message
            .ts
            .trim()
            .parse::<f64>()
            .map_err(|_| SlackError::InvalidTimestamp(message.ts.clone()))?;

        Ok(Some(Self {
            user_id,
            timestamp,
            text: message.text.unwrap_or_default(),
        }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageEntry {
    /// Local wall-clock time, e.g. `09:00:00 AM`.
    pub time: String,
    pub timestamp: f64,
    pub text: String,
}

/// One user's messages for one local calendar day.
#[derive(Debug, Clone, PartialEq)]
pub struct DayBucket {
    pub date: NaiveDate,
    pub check_ins: Vec<MessageEntry>,
    pub check_outs: Vec<MessageEntry>,
    pub messages: Vec<MessageEntry>,
}

impl DayBucket {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            check_ins: Vec::new(),
            check_outs: Vec::new(),
            messages: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceStatus {
    Complete,
    Missing,
    Absent,
    OnPermission,
}

impl AttendanceStatus {
    /// Label shown in the workbook's status column.
    pub fn label(&self) -> &'static str {
        match self {
            AttendanceStatus::Complete => "كامل",
            AttendanceStatus::Missing => "تسجيل ناقص",
            AttendanceStatus::Absent => "غائب",
            AttendanceStatus::OnPermission => "تصريح",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayRecord {
    pub user_id: String,
    pub date: NaiveDate,
    pub first_check_in: String,
    pub last_check_out: String,
    pub total_seconds: i64,
    pub total_formatted: String,
    pub diff_seconds: i64,
    pub diff_formatted: String,
    pub status: AttendanceStatus,
    pub has_check_in: bool,
    pub has_check_out: bool,
    pub all_messages: Vec<MessageEntry>,
}

impl DayRecord {
    /// A day without any message.
    pub fn absent(user_id: &str, date: NaiveDate) -> Self {
        let diff_seconds = -STANDARD_WORK_SECONDS;
        Self {
            user_id: user_id.to_string(),
            date,
            first_check_in: NOT_AVAILABLE.to_string(),
            last_check_out: NOT_AVAILABLE.to_string(),
            total_seconds: 0,
            total_formatted: format_hms(0),
            diff_seconds,
            diff_formatted: format_signed_hms(diff_seconds),
            status: AttendanceStatus::Absent,
            has_check_in: false,
            has_check_out: false,
            all_messages: Vec::new(),
        }
    }
}

pub type DailyBuckets = BTreeMap<String, BTreeMap<NaiveDate, DayBucket>>;

// --- Time helpers ---

/// Local time of a Slack timestamp in the target zone. Fractional seconds
/// are truncated.
pub fn local_datetime(timestamp: f64) -> Option<DateTime<Tz>> {
    DateTime::from_timestamp(timestamp as i64, 0).map(|utc| utc.with_timezone(&TARGET_TIMEZONE))
}

/// `HH:MM:SS` of the magnitude of `seconds`.
pub fn format_hms(seconds: i64) -> String {
    let secs = seconds.unsigned_abs();
    format!(
        "{:02}:{:02}:{:02}",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}

/// Like [`format_hms`] but prefixed with `-` for negative values.
pub fn format_signed_hms(seconds: i64) -> String {
    let sign = if seconds < 0 { "-" } else { "" };
    format!("{}{}", sign, format_hms(seconds))
}

// --- DailyGrouper ---

/// Buckets messages per user and local calendar day, splitting each day at
/// the check-out threshold hour.
///
/// Messages are stably sorted by timestamp first; everything downstream picks
/// check-in/check-out by position, so equal timestamps keep their submission
/// order.
pub fn group_by_user_and_day(mut messages: Vec<RawMessage>) -> DailyBuckets {
    messages.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

    let mut report: DailyBuckets = BTreeMap::new();
    for message in messages {
        let Some(local) = local_datetime(message.timestamp) else {
            warn!(
                user_id = %message.user_id,
                timestamp = message.timestamp,
                "Skipping message with out-of-range timestamp"
            );
            continue;
        };
        let date = local.date_naive();

        let entry = MessageEntry {
            time: local.format("%I:%M:%S %p").to_string(),
            timestamp: message.timestamp,
            text: message.text,
        };

        let bucket = report
            .entry(message.user_id)
            .or_default()
            .entry(date)
            .or_insert_with(|| DayBucket::new(date));

        if local.hour() < CHECK_OUT_HOUR_THRESHOLD {
            bucket.check_ins.push(entry.clone());
        } else {
            bucket.check_outs.push(entry.clone());
        }
        bucket.messages.push(entry);
    }

    debug!(users = report.len(), "Grouped messages by user and day");
    report
}

// --- AttendanceClassifier ---

/// Case-insensitive scan of all message texts of a day for a permission note.
/// The bare "pr" match is deliberately broad.
pub fn mentions_permission(messages: &[MessageEntry]) -> bool {
    let joined = messages
        .iter()
        .map(|m| m.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    PERMISSION_KEYWORDS.iter().any(|keyword| joined.contains(keyword))
}

pub fn classify_day(user_id: &str, bucket: DayBucket) -> DayRecord {
    let first_check_in = bucket.check_ins.first();
    let last_check_out = bucket.check_outs.last();
    let has_check_in = first_check_in.is_some();
    let has_check_out = last_check_out.is_some();

    // Presence spans all activity of the day, not just the two boundary messages
    let total_seconds = match (bucket.messages.first(), bucket.messages.last()) {
        (Some(first), Some(last)) => (last.timestamp - first.timestamp) as i64,
        _ => 0,
    };
    let diff_seconds = total_seconds - STANDARD_WORK_SECONDS;

    let mut status = match (has_check_in, has_check_out) {
        (false, false) => AttendanceStatus::Absent,
        (true, true) => AttendanceStatus::Complete,
        _ => AttendanceStatus::Missing,
    };

    if status != AttendanceStatus::Absent
        && (status == AttendanceStatus::Missing || diff_seconds < 0)
        && mentions_permission(&bucket.messages)
    {
        status = AttendanceStatus::OnPermission;
    }

    DayRecord {
        user_id: user_id.to_string(),
        date: bucket.date,
        first_check_in: first_check_in
            .map(|e| e.time.clone())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        last_check_out: last_check_out
            .map(|e| e.time.clone())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        total_seconds,
        total_formatted: format_hms(total_seconds),
        diff_seconds,
        diff_formatted: format_signed_hms(diff_seconds),
        status,
        has_check_in,
        has_check_out,
        all_messages: bucket.messages,
    }
}

/// Classifies every bucket; records per user come out in ascending date order.
pub fn classify_all(buckets: DailyBuckets) -> BTreeMap<String, Vec<DayRecord>> {
    buckets
        .into_iter()
        .map(|(user_id, days)| {
            let records = days
                .into_values()
                .map(|bucket| classify_day(&user_id, bucket))
                .collect();
            (user_id, records)
        })
        .collect()
}
