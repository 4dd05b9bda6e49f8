// src/xlsx_report.rs
use chrono::{DateTime, Datelike, Weekday};
use chrono_tz::Tz;
use rust_xlsxwriter::{Color, Format, FormatBorder, FormatPattern, Workbook, Worksheet, XlsxError};
use std::collections::HashSet;
use tracing::info;

use crate::attendance::AttendanceStatus;
use crate::config::NOT_AVAILABLE;
use crate::monthly::{MonthDay, MonthlyReport};

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub const REPORT_HEADERS: [&str; 7] = [
    "Date",
    "Day",
    "Check-in",
    "Check-out",
    "Total Hours",
    "Time Difference",
    "Message Status",
];

const CHECK_IN_COL: u16 = 2;
const CHECK_OUT_COL: u16 = 3;

const HEADER_FILL: u32 = 0xE0E0E0;
const WEEKEND_FILL: u32 = 0xFFFF00;
const MISSING_ROW_FILL: u32 = 0xFFC7CE;
const MISSING_CELL_FILL: u32 = 0xFF9999;
const PERMISSION_FILL: u32 = 0xFFA500;

const MAX_SHEET_NAME_CHARS: usize = 31;
const INVALID_SHEET_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

pub fn report_file_name(now: &DateTime<Tz>) -> String {
    format!("Slack_Monthly_Report_{:04}_{:02}.xlsx", now.year(), now.month())
}

/// Background fills for one row. Cell overrides win over the row fill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowFill {
    pub row: Option<u32>,
    pub check_in: Option<u32>,
    pub check_out: Option<u32>,
}

impl RowFill {
    pub fn for_column(&self, col: u16) -> Option<u32> {
        let cell = match col {
            CHECK_IN_COL => self.check_in,
            CHECK_OUT_COL => self.check_out,
            _ => None,
        };
        cell.or(self.row)
    }
}

pub fn is_weekend(day: &MonthDay) -> bool {
    matches!(day.record.date.weekday(), Weekday::Fri | Weekday::Sat)
}

/// Weekend, then half-registered day, then permission; later rules paint over
/// earlier ones.
pub fn row_fill(day: &MonthDay) -> RowFill {
    let mut fill = RowFill::default();
    if is_weekend(day) {
        fill.row = Some(WEEKEND_FILL);
    }

    let check_in_missing = day.record.first_check_in == NOT_AVAILABLE;
    let check_out_missing = day.record.last_check_out == NOT_AVAILABLE;
    if check_in_missing != check_out_missing {
        fill.row = Some(MISSING_ROW_FILL);
        if check_in_missing {
            fill.check_in = Some(MISSING_CELL_FILL);
        } else {
            fill.check_out = Some(MISSING_CELL_FILL);
        }
    }

    if day.record.status == AttendanceStatus::OnPermission {
        fill = RowFill {
            row: Some(PERMISSION_FILL),
            ..RowFill::default()
        };
    }
    fill
}

/// Cell texts in `REPORT_HEADERS` order.
pub fn row_values(day: &MonthDay) -> [String; 7] {
    let record = &day.record;
    [
        record.date.format("%Y-%m-%d").to_string(),
        day.day_name.to_string(),
        record.first_check_in.clone(),
        record.last_check_out.clone(),
        record.total_formatted.clone(),
        record.diff_formatted.clone(),
        record.status.label().to_string(),
    ]
}

// Excel rejects titles that start or end with an apostrophe
fn trim_title(title: &str) -> &str {
    title.trim_matches(|c: char| c.is_whitespace() || c == '\'')
}

fn title_prefix(base: &str, max_chars: usize) -> String {
    let truncated: String = base.chars().take(max_chars).collect();
    trim_title(&truncated).to_string()
}

/// Makes `name` a legal, unique worksheet title.
pub fn sheet_title(name: &str, used: &mut HashSet<String>) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if INVALID_SHEET_CHARS.contains(&c) { '_' } else { c })
        .collect();
    let cleaned = trim_title(&cleaned);
    let base = if cleaned.is_empty() { "Sheet" } else { cleaned };

    let mut candidate = title_prefix(base, MAX_SHEET_NAME_CHARS);
    let mut n = 2;
    // Excel compares sheet names case-insensitively
    while used.contains(&candidate.to_lowercase()) {
        let suffix = format!(" ({})", n);
        let keep = MAX_SHEET_NAME_CHARS - suffix.chars().count();
        candidate = title_prefix(base, keep) + &suffix;
        n += 1;
    }
    used.insert(candidate.to_lowercase());
    candidate
}

fn fill_format(color: Option<u32>) -> Format {
    let format = Format::new().set_border(FormatBorder::Thin);
    match color {
        Some(rgb) => format
            .set_background_color(Color::RGB(rgb))
            .set_pattern(FormatPattern::Solid),
        None => format,
    }
}

fn write_user_sheet(worksheet: &mut Worksheet, days: &[MonthDay]) -> Result<(), XlsxError> {
    let header_format = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(HEADER_FILL))
        .set_pattern(FormatPattern::Solid)
        .set_border(FormatBorder::Thin);

    for (col, header) in REPORT_HEADERS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &header_format)?;
    }

    for (index, day) in days.iter().enumerate() {
        let row = (index + 1) as u32;
        let fill = row_fill(day);
        for (col, value) in row_values(day).iter().enumerate() {
            let col = col as u16;
            let format = fill_format(fill.for_column(col));
            worksheet.write_string_with_format(row, col, value, &format)?;
        }
    }

    worksheet.set_freeze_panes(1, 0)?;
    worksheet.autofit();
    Ok(())
}

/// Lays out one worksheet per user, or a single placeholder sheet.
pub fn build_workbook(report: &MonthlyReport) -> Result<Workbook, XlsxError> {
    let mut workbook = Workbook::new();

    if report.is_empty() {
        let worksheet = workbook.add_worksheet();
        worksheet.write_string(0, 0, "No data available")?;
        return Ok(workbook);
    }

    let mut used_titles = HashSet::new();
    for (user_name, days) in report {
        let title = sheet_title(user_name, &mut used_titles);
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&title)?;
        write_user_sheet(worksheet, days)?;
    }
    Ok(workbook)
}

/// Renders the report into an in-memory XLSX file.
pub fn render_workbook(report: &MonthlyReport) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = build_workbook(report)?;
    let buffer = workbook.save_to_buffer()?;
    info!(sheets = report.len(), bytes = buffer.len(), "Rendered attendance workbook");
    Ok(buffer)
}
