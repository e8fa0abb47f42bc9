/// Reward windows and student ranking
///
/// Reward points accumulate over a window of `N` months and then reset.
/// Windows are aligned to January: with `N = 3` the windows are Jan-Mar,
/// Apr-Jun, Jul-Sep and Oct-Dec. `N = 1` means "the current month".

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use uuid::Uuid;

/// Places shown per month in the winners history
pub const PODIUM_SIZE: usize = 3;

/// Span of months whose points are summed for the current rating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RewardWindow {
    pub year: i32,
    pub start_month: u32,
    pub end_month: u32,
}

impl RewardWindow {
    /// Whether a reward issued in `(year, month)` counts toward this window
    pub fn contains(&self, year: i32, month: u32) -> bool {
        year == self.year && (self.start_month..=self.end_month).contains(&month)
    }
}

/// The window containing `today` for a reset period of `period_months`
///
/// Periods outside 1..=12 are clamped.
pub fn reward_window(period_months: i32, today: NaiveDate) -> RewardWindow {
    let period = period_months.clamp(1, 12) as u32;
    let month = today.month();
    let start_month = ((month - 1) / period) * period + 1;

    RewardWindow {
        year: today.year(),
        start_month,
        end_month: (start_month + period - 1).min(12),
    }
}

/// One line of a rating table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct RatingEntry {
    pub student_id: Uuid,
    pub full_name: String,
    pub photo_path: Option<String>,
    pub points: i64,
}

/// Drops students without points and orders the rest
///
/// Highest points first, ties broken by name, at most `limit` entries.
pub fn rank(mut entries: Vec<RatingEntry>, limit: usize) -> Vec<RatingEntry> {
    entries.retain(|e| e.points > 0);
    entries.sort_by(|a, b| {
        b.points
            .cmp(&a.points)
            .then_with(|| a.full_name.cmp(&b.full_name))
    });
    entries.truncate(limit);
    entries
}

/// Top students of one month
#[derive(Debug, Clone, Serialize)]
pub struct MonthPodium {
    pub month: u32,
    pub students: Vec<RatingEntry>,
    pub is_empty: bool,
}

/// Builds the twelve monthly podiums of a year from per-month point totals
pub fn yearly_podiums(rows: Vec<(u32, RatingEntry)>) -> Vec<MonthPodium> {
    let mut by_month: BTreeMap<u32, Vec<RatingEntry>> = BTreeMap::new();
    for (month, entry) in rows {
        by_month.entry(month).or_default().push(entry);
    }

    (1..=12)
        .map(|month| {
            let students = rank(by_month.remove(&month).unwrap_or_default(), PODIUM_SIZE);
            MonthPodium {
                month,
                is_empty: students.is_empty(),
                students,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 15).unwrap()
    }

    fn entry(name: &str, points: i64) -> RatingEntry {
        RatingEntry {
            student_id: Uuid::new_v4(),
            full_name: name.to_string(),
            photo_path: None,
            points,
        }
    }

    #[test]
    fn test_monthly_window() {
        let window = reward_window(1, date(2025, 7));
        assert_eq!(
            window,
            RewardWindow {
                year: 2025,
                start_month: 7,
                end_month: 7
            }
        );
    }

    #[test]
    fn test_quarterly_window() {
        let window = reward_window(3, date(2025, 5));
        assert_eq!((window.start_month, window.end_month), (4, 6));
        assert!(window.contains(2025, 4));
        assert!(!window.contains(2025, 7));
        assert!(!window.contains(2024, 5));
    }

    #[test]
    fn test_uneven_period_is_cut_at_december() {
        // 5-month windows: Jan-May, Jun-Oct, Nov-Dec
        let window = reward_window(5, date(2025, 12));
        assert_eq!((window.start_month, window.end_month), (11, 12));
    }

    #[test]
    fn test_yearly_window_and_clamping() {
        assert_eq!(reward_window(12, date(2025, 9)).start_month, 1);
        assert_eq!(reward_window(0, date(2025, 9)).start_month, 9);
        assert_eq!(reward_window(40, date(2025, 9)).end_month, 12);
    }

    #[test]
    fn test_rank_orders_filters_and_truncates() {
        let ranked = rank(
            vec![
                entry("Bobur", 5),
                entry("Aziz", 5),
                entry("Jasur", 0),
                entry("Dilshod", 9),
                entry("Olim", 1),
            ],
            3,
        );

        let names: Vec<&str> = ranked.iter().map(|e| e.full_name.as_str()).collect();
        assert_eq!(names, vec!["Dilshod", "Aziz", "Bobur"]);
    }

    #[test]
    fn test_yearly_podiums() {
        let podiums = yearly_podiums(vec![
            (2, entry("A", 3)),
            (2, entry("B", 7)),
            (2, entry("C", 1)),
            (2, entry("D", 2)),
            (5, entry("E", 0)),
        ]);

        assert_eq!(podiums.len(), 12);
        assert!(podiums[0].is_empty);

        let feb = &podiums[1];
        assert_eq!(feb.month, 2);
        let names: Vec<&str> = feb.students.iter().map(|e| e.full_name.as_str()).collect();
        assert_eq!(names, vec!["B", "A", "D"]);

        assert!(podiums[4].is_empty);
    }
}
