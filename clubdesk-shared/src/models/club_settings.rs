/// Club-wide settings
///
/// A single row (`id = 1`) created on first read. The working calendar and
/// slot capacity feed the group schedule validator; the reward settings
/// drive ratings.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::schedule::{parse_days, SlotRules};

/// Allowed podium sizes are multiples of this step
pub const PODIUM_STEP: i32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct ClubSettings {
    pub system_name: String,

    /// ISO weekdays the club trains on
    pub working_days: Vec<i32>,

    pub work_start_time: NaiveTime,
    pub work_end_time: NaiveTime,

    /// Groups allowed at the same time; also the number of field blocks
    pub max_groups_per_slot: i32,

    /// Refuse monthly payments for months after the current one
    pub block_future_payments: bool,

    pub rewards_reset_period_months: i32,

    /// Rating rows shown per group
    pub podium_display_count: i32,
}

/// Body of a settings update
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsInput {
    #[serde(default)]
    pub system_name: Option<String>,

    /// Array of numbers or strings, or a comma-separated string
    #[serde(default)]
    pub working_days: serde_json::Value,

    pub work_start_time: NaiveTime,
    pub work_end_time: NaiveTime,

    #[serde(default = "default_max_groups")]
    pub max_groups_per_slot: i32,

    #[serde(default)]
    pub block_future_payments: bool,

    #[serde(default = "default_reset_period")]
    pub rewards_reset_period_months: i32,

    #[serde(default = "default_podium")]
    pub podium_display_count: i32,
}

fn default_max_groups() -> i32 {
    1
}

fn default_reset_period() -> i32 {
    1
}

fn default_podium() -> i32 {
    20
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("Select at least one working day")]
    NoWorkingDays,

    #[error("End time must be later than start time")]
    EndBeforeStart,

    #[error("Slot capacity must be positive")]
    NonPositiveCapacity,

    #[error("Rewards reset period must be between 1 and 12 months")]
    ResetPeriodOutOfRange,

    #[error("Podium must show between 5 and 50 students in steps of 5")]
    PodiumOutOfRange,
}

impl SettingsInput {
    /// Validates the input and builds the settings to store
    ///
    /// A blank system name falls back to `default_name`.
    pub fn into_settings(self, default_name: &str) -> Result<ClubSettings, SettingsError> {
        let working_days = parse_days(&self.working_days);
        if working_days.is_empty() {
            return Err(SettingsError::NoWorkingDays);
        }
        if self.work_end_time <= self.work_start_time {
            return Err(SettingsError::EndBeforeStart);
        }
        if self.max_groups_per_slot <= 0 {
            return Err(SettingsError::NonPositiveCapacity);
        }
        if !(1..=12).contains(&self.rewards_reset_period_months) {
            return Err(SettingsError::ResetPeriodOutOfRange);
        }
        if !(5..=50).contains(&self.podium_display_count)
            || self.podium_display_count % PODIUM_STEP != 0
        {
            return Err(SettingsError::PodiumOutOfRange);
        }

        let system_name = self
            .system_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| default_name.to_string());

        Ok(ClubSettings {
            system_name,
            working_days,
            work_start_time: self.work_start_time,
            work_end_time: self.work_end_time,
            max_groups_per_slot: self.max_groups_per_slot,
            block_future_payments: self.block_future_payments,
            rewards_reset_period_months: self.rewards_reset_period_months,
            podium_display_count: self.podium_display_count,
        })
    }
}

impl ClubSettings {
    pub fn slot_rules(&self) -> SlotRules {
        SlotRules {
            working_days: self.working_days.clone(),
            work_start: self.work_start_time,
            work_end: self.work_end_time,
            max_groups_per_slot: self.max_groups_per_slot,
        }
    }

    /// Loads the settings row, creating it with defaults when missing
    pub async fn get(pool: &PgPool) -> Result<Self, sqlx::Error> {
        sqlx::query("INSERT INTO club_settings (id) VALUES (1) ON CONFLICT (id) DO NOTHING")
            .execute(pool)
            .await?;

        sqlx::query_as::<_, ClubSettings>(
            r#"
            SELECT system_name, working_days, work_start_time, work_end_time, max_groups_per_slot,
                   block_future_payments, rewards_reset_period_months, podium_display_count
            FROM club_settings
            WHERE id = 1
            "#,
        )
        .fetch_one(pool)
        .await
    }

    pub async fn update(pool: &PgPool, settings: &ClubSettings) -> Result<Self, sqlx::Error> {
        let saved = sqlx::query_as::<_, ClubSettings>(
            r#"
            INSERT INTO club_settings (id, system_name, working_days, work_start_time,
                                       work_end_time, max_groups_per_slot, block_future_payments,
                                       rewards_reset_period_months, podium_display_count)
            VALUES (1, $1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE
            SET system_name = EXCLUDED.system_name,
                working_days = EXCLUDED.working_days,
                work_start_time = EXCLUDED.work_start_time,
                work_end_time = EXCLUDED.work_end_time,
                max_groups_per_slot = EXCLUDED.max_groups_per_slot,
                block_future_payments = EXCLUDED.block_future_payments,
                rewards_reset_period_months = EXCLUDED.rewards_reset_period_months,
                podium_display_count = EXCLUDED.podium_display_count
            RETURNING system_name, working_days, work_start_time, work_end_time,
                      max_groups_per_slot, block_future_payments, rewards_reset_period_months,
                      podium_display_count
            "#,
        )
        .bind(&settings.system_name)
        .bind(&settings.working_days)
        .bind(settings.work_start_time)
        .bind(settings.work_end_time)
        .bind(settings.max_groups_per_slot)
        .bind(settings.block_future_payments)
        .bind(settings.rewards_reset_period_months)
        .bind(settings.podium_display_count)
        .fetch_one(pool)
        .await?;

        tracing::info!(
            working_days = ?saved.working_days,
            max_groups_per_slot = saved.max_groups_per_slot,
            "Club settings updated"
        );

        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(overrides: serde_json::Value) -> SettingsInput {
        let mut body = json!({
            "system_name": "  ",
            "working_days": "1,3,5",
            "work_start_time": "09:00:00",
            "work_end_time": "21:00:00",
            "max_groups_per_slot": 4,
            "rewards_reset_period_months": 3,
            "podium_display_count": 10,
        });
        if let (Some(base), Some(extra)) = (body.as_object_mut(), overrides.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_valid_input_with_default_name() {
        let settings = input(json!({})).into_settings("FK QORASUV").unwrap();

        assert_eq!(settings.system_name, "FK QORASUV");
        assert_eq!(settings.working_days, vec![1, 3, 5]);
        assert_eq!(settings.slot_rules().max_groups_per_slot, 4);
        assert!(!settings.block_future_payments);
    }

    #[test]
    fn test_rejections() {
        let cases = [
            (json!({"working_days": []}), SettingsError::NoWorkingDays),
            (json!({"work_end_time": "08:00:00"}), SettingsError::EndBeforeStart),
            (json!({"max_groups_per_slot": 0}), SettingsError::NonPositiveCapacity),
            (json!({"rewards_reset_period_months": 13}), SettingsError::ResetPeriodOutOfRange),
            (json!({"podium_display_count": 12}), SettingsError::PodiumOutOfRange),
            (json!({"podium_display_count": 55}), SettingsError::PodiumOutOfRange),
        ];

        for (overrides, expected) in cases {
            assert_eq!(input(overrides).into_settings("X").unwrap_err(), expected);
        }
    }
}
