use chrono::{DateTime, Datelike, Duration, Utc, Weekday};

use crate::domain::leave::{DateRange, LeaveCategory};

/// Spans longer than this many calendar days need a second (HR) approval.
pub const DUAL_APPROVAL_THRESHOLD_DAYS: u32 = 3;
/// Sick leave spanning at least this many calendar days needs a medical document.
pub const DOCUMENT_REQUIRED_MIN_DAYS: u32 = 3;
pub const DOCUMENT_DEADLINE_DAYS: i64 = 3;

/// Inclusive calendar-day span; drives the dual-approval and document rules.
pub fn calendar_day_span(range: &DateRange) -> u32 {
    let days = (range.end - range.start).num_days() + 1;
    u32::try_from(days).unwrap_or(u32::MAX)
}

/// Weekdays inside the range; drives balance bookkeeping only.
pub fn business_day_count(range: &DateRange) -> u32 {
    let count = range.days().filter(|day| !is_weekend(day.weekday())).count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// Weekdays grouped by the leave year they fall in, in year order. A request
/// that crosses New Year draws on both allowances.
pub fn business_days_by_year(range: &DateRange) -> Vec<(i32, u32)> {
    let mut years: Vec<(i32, u32)> = Vec::new();
    for day in range.days().filter(|day| !is_weekend(day.weekday())) {
        match years.last_mut() {
            Some((year, count)) if *year == day.year() => *count += 1,
            _ => years.push((day.year(), 1)),
        }
    }
    years
}

pub fn requires_dual_approval(range: &DateRange) -> bool {
    calendar_day_span(range) > DUAL_APPROVAL_THRESHOLD_DAYS
}

pub fn requires_document(category: LeaveCategory, range: &DateRange) -> bool {
    category == LeaveCategory::Sick && calendar_day_span(range) >= DOCUMENT_REQUIRED_MIN_DAYS
}

pub fn document_deadline(created_at: DateTime<Utc>) -> DateTime<Utc> {
    created_at + Duration::days(DOCUMENT_DEADLINE_DAYS)
}

fn is_weekend(weekday: Weekday) -> bool {
    matches!(weekday, Weekday::Sat | Weekday::Sun)
}
