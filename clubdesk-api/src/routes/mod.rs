/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Login, token refresh, current user
/// - `users`: Staff accounts and admin credentials
/// - `dashboard`: Headline numbers for the front page
/// - `students`: Student cards, face encodings, monthly payment view
/// - `payments`: Lesson-pack and month-covering payments
/// - `attendance`: Check-in, journal and analytics
/// - `teacher`: Roll call for a teacher's own group
/// - `groups`: Training groups and their schedule
/// - `tariffs`: Lesson packs
/// - `expenses`: Club expenses
/// - `finances`: Income, expense and debt reports
/// - `settings`: Club settings
/// - `rewards`: Reward types and issued rewards
/// - `rating`: Group ratings and monthly podiums
/// - `recognition`: Face recognition check
/// - `cash_transfers`: Cash handed over from the payment desk

pub mod attendance;
pub mod auth;
pub mod cash_transfers;
pub mod dashboard;
pub mod expenses;
pub mod finances;
pub mod groups;
pub mod health;
pub mod payments;
pub mod rating;
pub mod recognition;
pub mod rewards;
pub mod settings;
pub mod students;
pub mod tariffs;
pub mod teacher;
pub mod users;

use crate::error::ApiError;
use chrono::{NaiveTime, Timelike};
use serde::Serialize;

/// Plain acknowledgement body
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Trims `value` and rejects it when blank
pub(crate) fn required_text(field: &str, value: &str, message: &str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::invalid(field, message));
    }
    Ok(trimmed.to_string())
}

/// Parses `HH:MM` or `HH:MM:SS`
pub(crate) fn parse_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

/// `HH:MM` without seconds
pub(crate) fn clock_label<T: Timelike>(time: &T) -> String {
    format!("{:02}:{:02}", time.hour(), time.minute())
}
