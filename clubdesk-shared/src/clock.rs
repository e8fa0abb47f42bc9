/// Club-local time
///
/// The club operates in a single time zone with a fixed UTC offset. Every
/// "today", "current month" and lateness decision goes through [`ClubClock`]
/// so the server's own time zone never leaks into business rules.
///
/// # Example
///
/// ```
/// use clubdesk_shared::clock::ClubClock;
///
/// let clock = ClubClock::from_offset_minutes(300).expect("valid offset");
/// let today = clock.today();
/// let (year, month) = clock.current_month();
/// assert_eq!(chrono::Datelike::year(&today), year);
/// # let _ = month;
/// ```

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset,
    TimeZone, Utc,
};

use crate::billing::YearMonth;

/// Offset used when none is configured (UTC+5)
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 300;

/// Clock that reports wall time at the club
#[derive(Debug, Clone, Copy)]
pub struct ClubClock {
    offset: FixedOffset,
}

impl ClubClock {
    /// Builds a clock for an offset east of UTC, in minutes
    ///
    /// Returns `None` when the offset is outside ±24h.
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(minutes.checked_mul(60)?).map(|offset| Self { offset })
    }

    /// The configured offset
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Current club-local date and time
    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }

    /// Current club-local calendar date
    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// `(year, month)` of the current club-local date
    pub fn current_month(&self) -> (i32, u32) {
        let today = self.today();
        (today.year(), today.month())
    }

    /// Converts a UTC instant into club-local wall time
    pub fn local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&self.offset).naive_local()
    }

    /// Interprets a club-local date and time as a UTC instant
    pub fn to_utc(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        // A fixed offset has no gaps or folds, so the mapping is always single.
        self.offset
            .from_local_datetime(&date.and_time(time))
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&date.and_time(time)))
    }

    /// UTC half-open range `[start, end)` covering a club-local day
    pub fn day_bounds(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.to_utc(date, NaiveTime::MIN);
        (start, start + Duration::days(1))
    }

    /// UTC half-open range covering a club-local calendar month
    pub fn month_bounds(&self, month: YearMonth) -> (DateTime<Utc>, DateTime<Utc>) {
        let next = month.succ();
        (
            self.to_utc(first_day(month), NaiveTime::MIN),
            self.to_utc(first_day(next), NaiveTime::MIN),
        )
    }
}

fn first_day(month: YearMonth) -> NaiveDate {
    NaiveDate::from_ymd_opt(month.year, month.month, 1).unwrap_or(NaiveDate::MIN)
}

impl Default for ClubClock {
    fn default() -> Self {
        Self::from_offset_minutes(DEFAULT_UTC_OFFSET_MINUTES).unwrap_or(Self { offset: Utc.fix() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_rejects_out_of_range_offset() {
        assert!(ClubClock::from_offset_minutes(24 * 60).is_none());
        assert!(ClubClock::from_offset_minutes(-24 * 60).is_none());
        assert!(ClubClock::from_offset_minutes(-300).is_some());
    }

    #[test]
    fn test_local_applies_offset() {
        let clock = ClubClock::from_offset_minutes(300).unwrap();
        let instant = Utc.with_ymd_and_hms(2025, 3, 31, 21, 30, 0).unwrap();

        let local = clock.local(instant);

        // 21:30 UTC is already the next day in UTC+5
        assert_eq!(local.date(), NaiveDate::from_ymd_opt(2025, 4, 1).unwrap());
        assert_eq!(local.hour(), 2);
        assert_eq!(local.minute(), 30);
    }

    #[test]
    fn test_to_utc_inverts_local() {
        let clock = ClubClock::default();
        let date = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        let time = NaiveTime::from_hms_opt(16, 0, 0).unwrap();

        let utc = clock.to_utc(date, time);

        assert_eq!(utc.hour(), 11);
        assert_eq!(clock.local(utc), date.and_time(time));
    }

    #[test]
    fn test_day_bounds_are_shifted_by_offset() {
        let clock = ClubClock::from_offset_minutes(300).unwrap();
        let (start, end) = clock.day_bounds(NaiveDate::from_ymd_opt(2025, 1, 10).unwrap());

        assert_eq!(start, Utc.with_ymd_and_hms(2025, 1, 9, 19, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 1, 10, 19, 0, 0).unwrap());
    }

    #[test]
    fn test_month_bounds_cross_year() {
        let clock = ClubClock::from_offset_minutes(0).unwrap();
        let (start, end) = clock.month_bounds(YearMonth { year: 2024, month: 12 });

        assert_eq!(start, Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_current_month_matches_today() {
        let clock = ClubClock::default();
        let today = clock.today();
        assert_eq!(clock.current_month(), (today.year(), today.month()));
    }
}
