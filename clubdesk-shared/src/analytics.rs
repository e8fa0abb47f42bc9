/// Month windows and attendance statistics helpers

use chrono::NaiveDate;
use serde::Serialize;

use crate::billing::YearMonth;

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Short English month name, `"?"` outside 1..=12
pub fn month_name(month: u32) -> &'static str {
    month
        .checked_sub(1)
        .and_then(|i| MONTH_NAMES.get(i as usize))
        .copied()
        .unwrap_or("?")
}

/// `"Jan 2025"`
pub fn month_label(year: i32, month: u32) -> String {
    format!("{} {}", month_name(month), year)
}

/// The last `count` months ending with the month of `today`, oldest first
pub fn trailing_months(today: NaiveDate, count: usize) -> Vec<YearMonth> {
    let mut months = Vec::with_capacity(count);
    let mut current = YearMonth::of(today);
    for _ in 0..count {
        months.push(current);
        current = current.pred();
    }
    months.reverse();
    months
}

/// Lateness summary for a year
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LateStats {
    pub total_late: i64,
    pub late_percentage: f64,
    pub avg_late_minutes: f64,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Builds [`LateStats`] from raw counts, rounding to one decimal
pub fn late_stats(total_attendance: i64, total_late: i64, avg_late_minutes: Option<f64>) -> LateStats {
    let late_percentage = if total_attendance > 0 {
        round1(total_late as f64 / total_attendance as f64 * 100.0)
    } else {
        0.0
    };

    LateStats {
        total_late,
        late_percentage,
        avg_late_minutes: avg_late_minutes.map(round1).unwrap_or(0.0),
    }
}

/// Rounds a per-lesson price to two decimals for display
pub fn round_price(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
