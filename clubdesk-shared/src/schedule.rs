/// Group schedule validation against field capacity
///
/// The club's field is split into `max_groups_per_slot` blocks. A group
/// trains on a set of ISO weekdays (1 = Monday .. 7 = Sunday) starting at a
/// fixed time for `duration_minutes`, and occupies one or more field blocks.
/// Two groups conflict on a day when their lesson intervals
/// `[start, start + duration)` overlap.
///
/// # Example
///
/// ```
/// use chrono::NaiveTime;
/// use clubdesk_shared::schedule::{validate_group_schedule, GroupSlot, SlotRules};
///
/// let rules = SlotRules {
///     working_days: vec![1, 2, 3, 4, 5],
///     work_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
///     work_end: NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
///     max_groups_per_slot: 2,
/// };
///
/// let candidate = GroupSlot {
///     id: None,
///     name: "U-10".to_string(),
///     start: NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
///     duration_minutes: 60,
///     days: vec![1, 3],
///     blocks: vec![0],
/// };
///
/// assert!(validate_group_schedule(&rules, &candidate, &[]).is_ok());
/// ```

use std::collections::BTreeSet;

use chrono::{NaiveTime, Timelike};
use uuid::Uuid;

/// Short weekday labels indexed by ISO weekday - 1
pub const DAY_LABELS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Schedule rule violations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("Lesson time is required")]
    MissingTime,

    #[error("Select at least one day of the week")]
    NoDays,

    #[error("Lesson duration must be positive")]
    InvalidDuration,

    #[error("Selected days are outside the club's working days")]
    DayNotWorking,

    #[error("Lesson time is outside the club's working hours")]
    OutsideWorkingHours,

    #[error("No free field on {day} {time}")]
    SlotFull { day: String, time: String },

    #[error("Field block {index} does not exist (the field has {available} blocks)")]
    BlockOutOfRange { index: i32, available: i32 },

    #[error("Field block {index} is already taken by \"{group}\" on {day} {time}")]
    BlockTaken {
        index: i32,
        group: String,
        day: String,
        time: String,
    },
}

/// Club-wide limits the schedule must respect
#[derive(Debug, Clone)]
pub struct SlotRules {
    /// ISO weekdays the club is open
    pub working_days: Vec<i32>,

    /// Earliest allowed lesson start
    pub work_start: NaiveTime,

    /// Latest allowed lesson start
    pub work_end: NaiveTime,

    /// Number of field blocks, and therefore of concurrent groups
    pub max_groups_per_slot: i32,
}

/// A group's footprint on the field
#[derive(Debug, Clone)]
pub struct GroupSlot {
    /// `None` for a group that doesn't exist yet
    pub id: Option<Uuid>,
    pub name: String,
    pub start: NaiveTime,
    pub duration_minutes: i32,
    pub days: Vec<i32>,
    pub blocks: Vec<i32>,
}

impl GroupSlot {
    fn start_minute(&self) -> i32 {
        (self.start.hour() * 60 + self.start.minute()) as i32
    }

    fn end_minute(&self) -> i32 {
        self.start_minute() + self.duration_minutes.max(1)
    }

    /// Whether both groups train on `day` at overlapping times
    pub fn overlaps_on(&self, other: &GroupSlot, day: i32) -> bool {
        self.days.contains(&day)
            && other.days.contains(&day)
            && self.start_minute() < other.end_minute()
            && other.start_minute() < self.end_minute()
    }

    fn is_same_group(&self, other: &GroupSlot) -> bool {
        matches!((self.id, other.id), (Some(a), Some(b)) if a == b)
    }
}

/// Short label for an ISO weekday, or the number itself when out of range
pub fn day_label(day: i32) -> String {
    usize::try_from(day - 1)
        .ok()
        .and_then(|i| DAY_LABELS.get(i))
        .map(|s| s.to_string())
        .unwrap_or_else(|| day.to_string())
}

fn time_label(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Parses a weekday list from a request body
///
/// Accepts a JSON array of numbers or numeric strings, or a comma-separated
/// string. Anything that isn't a plain number is skipped. The result is
/// sorted, de-duplicated and limited to 1..=7.
pub fn parse_days(raw: &serde_json::Value) -> Vec<i32> {
    let tokens: Vec<String> = match raw {
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| match item {
                serde_json::Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            })
            .collect(),
        serde_json::Value::String(s) => s.split(',').map(|t| t.trim().to_string()).collect(),
        _ => Vec::new(),
    };

    tokens
        .iter()
        .filter(|t| !t.is_empty() && t.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|t| t.parse::<i32>().ok())
        .filter(|d| (1..=7).contains(d))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Sorted, unique, non-negative block indices
pub fn normalize_block_indices(raw: &[i32]) -> Vec<i32> {
    raw.iter()
        .copied()
        .filter(|i| *i >= 0)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Returns the lesson time or `MissingTime`
pub fn require_time(time: Option<NaiveTime>) -> Result<NaiveTime, ScheduleError> {
    time.ok_or(ScheduleError::MissingTime)
}

fn check_calendar(rules: &SlotRules, candidate: &GroupSlot) -> Result<(), ScheduleError> {
    if candidate.days.is_empty() {
        return Err(ScheduleError::NoDays);
    }

    if candidate.duration_minutes <= 0 {
        return Err(ScheduleError::InvalidDuration);
    }

    if !candidate.days.iter().all(|d| rules.working_days.contains(d)) {
        return Err(ScheduleError::DayNotWorking);
    }

    if candidate.start < rules.work_start || candidate.start > rules.work_end {
        return Err(ScheduleError::OutsideWorkingHours);
    }

    Ok(())
}

fn overlapping<'a>(
    candidate: &'a GroupSlot,
    existing: &'a [GroupSlot],
    day: i32,
) -> impl Iterator<Item = &'a GroupSlot> + 'a {
    existing
        .iter()
        .filter(move |g| !g.is_same_group(candidate) && candidate.overlaps_on(g, day))
}

fn check_capacity(
    rules: &SlotRules,
    candidate: &GroupSlot,
    existing: &[GroupSlot],
) -> Result<(), ScheduleError> {
    for &day in &candidate.days {
        let taken = overlapping(candidate, existing, day).count() as i32;
        if taken >= rules.max_groups_per_slot {
            return Err(ScheduleError::SlotFull {
                day: day_label(day),
                time: time_label(candidate.start),
            });
        }
    }
    Ok(())
}

/// Checks a group's schedule against the club rules and the other groups
///
/// `existing` may contain the candidate itself (matched by id); it is skipped.
///
/// # Errors
///
/// The first violated rule, in this order: no days, bad duration, non-working
/// day, time outside working hours, full slot, bad or colliding field block.
pub fn validate_group_schedule(
    rules: &SlotRules,
    candidate: &GroupSlot,
    existing: &[GroupSlot],
) -> Result<(), ScheduleError> {
    check_calendar(rules, candidate)?;
    check_capacity(rules, candidate, existing)?;

    for &index in &candidate.blocks {
        if index >= rules.max_groups_per_slot {
            return Err(ScheduleError::BlockOutOfRange {
                index,
                available: rules.max_groups_per_slot,
            });
        }
    }

    for &day in &candidate.days {
        for other in overlapping(candidate, existing, day) {
            if let Some(&index) = candidate.blocks.iter().find(|b| other.blocks.contains(b)) {
                return Err(ScheduleError::BlockTaken {
                    index,
                    group: other.name.clone(),
                    day: day_label(day),
                    time: time_label(other.start),
                });
            }
        }
    }

    Ok(())
}

/// Picks the lowest `count` blocks that are free on every selected day
///
/// Used when a group is saved without explicit block indices. The candidate's
/// own `blocks` are ignored.
///
/// # Errors
///
/// Calendar and capacity errors as in [`validate_group_schedule`], or
/// `SlotFull` when fewer than `count` blocks are free.
pub fn assign_free_blocks(
    rules: &SlotRules,
    candidate: &GroupSlot,
    existing: &[GroupSlot],
    count: usize,
) -> Result<Vec<i32>, ScheduleError> {
    check_calendar(rules, candidate)?;
    check_capacity(rules, candidate, existing)?;

    let mut taken = BTreeSet::new();
    for &day in &candidate.days {
        for other in overlapping(candidate, existing, day) {
            taken.extend(other.blocks.iter().copied());
        }
    }

    let free: Vec<i32> = (0..rules.max_groups_per_slot)
        .filter(|i| !taken.contains(i))
        .take(count.max(1))
        .collect();

    if free.len() < count.max(1) {
        let day = candidate.days.first().copied().unwrap_or(1);
        return Err(ScheduleError::SlotFull {
            day: day_label(day),
            time: time_label(candidate.start),
        });
    }

    Ok(free)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn rules(max: i32) -> SlotRules {
        SlotRules {
            working_days: vec![1, 2, 3, 4, 5],
            work_start: t(9, 0),
            work_end: t(21, 0),
            max_groups_per_slot: max,
        }
    }

    fn slot(name: &str, start: NaiveTime, duration: i32, days: &[i32], blocks: &[i32]) -> GroupSlot {
        GroupSlot {
            id: Some(Uuid::new_v4()),
            name: name.to_string(),
            start,
            duration_minutes: duration,
            days: days.to_vec(),
            blocks: blocks.to_vec(),
        }
    }

    #[test]
    fn test_parse_days_array_and_string() {
        assert_eq!(parse_days(&json!([3, "1", 1, "x", 9])), vec![1, 3]);
        assert_eq!(parse_days(&json!("5, 2,2,abc")), vec![2, 5]);
        assert!(parse_days(&json!(null)).is_empty());
        assert!(parse_days(&json!([-1, 0])).is_empty());
    }

    #[test]
    fn test_normalize_block_indices() {
        assert_eq!(normalize_block_indices(&[2, 0, 2, -1, 1]), vec![0, 1, 2]);
    }

    #[test]
    fn test_day_label() {
        assert_eq!(day_label(1), "Mon");
        assert_eq!(day_label(7), "Sun");
        assert_eq!(day_label(8), "8");
    }

    #[test]
    fn test_rejects_empty_days() {
        let candidate = slot("A", t(15, 0), 60, &[], &[0]);
        assert_eq!(
            validate_group_schedule(&rules(4), &candidate, &[]),
            Err(ScheduleError::NoDays)
        );
    }

    #[test]
    fn test_rejects_non_working_day() {
        let candidate = slot("A", t(15, 0), 60, &[1, 6], &[0]);
        assert_eq!(
            validate_group_schedule(&rules(4), &candidate, &[]),
            Err(ScheduleError::DayNotWorking)
        );
    }

    #[test]
    fn test_rejects_time_outside_hours() {
        let early = slot("A", t(8, 59), 60, &[1], &[0]);
        assert_eq!(
            validate_group_schedule(&rules(4), &early, &[]),
            Err(ScheduleError::OutsideWorkingHours)
        );

        // Boundaries are inclusive
        let at_end = slot("A", t(21, 0), 60, &[1], &[0]);
        assert!(validate_group_schedule(&rules(4), &at_end, &[]).is_ok());
    }

    #[test]
    fn test_slot_full_when_capacity_reached() {
        let existing = vec![
            slot("A", t(15, 0), 60, &[3], &[0]),
            slot("B", t(15, 0), 60, &[3], &[1]),
        ];
        let candidate = slot("C", t(15, 0), 60, &[3], &[2]);

        let err = validate_group_schedule(&rules(2), &candidate, &existing).unwrap_err();
        assert_eq!(err.to_string(), "No free field on Wed 15:00");
    }

    #[test]
    fn test_overlapping_intervals_count_against_capacity() {
        // 15:30 lesson overlaps the tail of a 15:00-16:00 lesson
        let existing = vec![slot("A", t(15, 0), 60, &[2], &[0])];
        let candidate = slot("B", t(15, 30), 60, &[2], &[1]);

        assert!(matches!(
            validate_group_schedule(&rules(1), &candidate, &existing),
            Err(ScheduleError::SlotFull { .. })
        ));
    }

    #[test]
    fn test_back_to_back_lessons_do_not_overlap() {
        let existing = vec![slot("A", t(15, 0), 60, &[2], &[0])];
        let candidate = slot("B", t(16, 0), 60, &[2], &[0]);

        assert!(validate_group_schedule(&rules(1), &candidate, &existing).is_ok());
    }

    #[test]
    fn test_other_days_do_not_count() {
        let existing = vec![slot("A", t(15, 0), 60, &[1], &[0])];
        let candidate = slot("B", t(15, 0), 60, &[2], &[0]);

        assert!(validate_group_schedule(&rules(1), &candidate, &existing).is_ok());
    }

    #[test]
    fn test_edited_group_is_excluded() {
        let existing = vec![slot("A", t(15, 0), 60, &[1], &[0])];
        let mut edited = existing[0].clone();
        edited.start = t(15, 15);

        assert!(validate_group_schedule(&rules(1), &edited, &existing).is_ok());
    }

    #[test]
    fn test_block_out_of_range() {
        let candidate = slot("A", t(15, 0), 60, &[1], &[4]);
        assert_eq!(
            validate_group_schedule(&rules(4), &candidate, &[]),
            Err(ScheduleError::BlockOutOfRange {
                index: 4,
                available: 4
            })
        );
    }

    #[test]
    fn test_block_collision() {
        let existing = vec![slot("A", t(15, 0), 90, &[1, 3], &[0, 1])];
        let candidate = slot("B", t(16, 0), 60, &[3], &[1, 2]);

        let err = validate_group_schedule(&rules(4), &candidate, &existing).unwrap_err();
        assert_eq!(
            err,
            ScheduleError::BlockTaken {
                index: 1,
                group: "A".to_string(),
                day: "Wed".to_string(),
                time: "15:00".to_string(),
            }
        );
    }

    #[test]
    fn test_assign_free_blocks_skips_taken() {
        let existing = vec![
            slot("A", t(15, 0), 60, &[1], &[0]),
            slot("B", t(15, 0), 60, &[2], &[1]),
        ];
        let candidate = slot("C", t(15, 0), 60, &[1, 2], &[]);

        let blocks = assign_free_blocks(&rules(4), &candidate, &existing, 2).unwrap();
        assert_eq!(blocks, vec![2, 3]);
    }

    #[test]
    fn test_assign_free_blocks_reports_full_slot() {
        let existing = vec![slot("A", t(15, 0), 60, &[1], &[0, 1])];
        let candidate = slot("C", t(15, 0), 60, &[1], &[]);

        assert!(matches!(
            assign_free_blocks(&rules(2), &candidate, &existing, 1),
            Err(ScheduleError::SlotFull { .. })
        ));
    }
}
