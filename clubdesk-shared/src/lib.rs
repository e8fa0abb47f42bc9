//! # ClubDesk Shared Library
//!
//! This crate contains the data model, authentication primitives and the
//! club's business rules used by the ClubDesk API server.
//!
//! ## Module Organization
//!
//! - `models`: Database models and their SQL operations
//! - `db`: Connection pool and migrations
//! - `auth`: Password hashing, JWT tokens, role checks
//! - `billing`: Lesson balance, per-lesson pricing and monthly debts
//! - `schedule`: Group schedule validation against field capacity
//! - `rating`: Reward windows and student ranking
//! - `face`: Face-encoding matching index
//! - `analytics`: Month windows and attendance statistics helpers
//! - `clock`: Club-local time

pub mod analytics;
pub mod auth;
pub mod billing;
pub mod clock;
pub mod db;
pub mod face;
pub mod models;
pub mod rating;
pub mod schedule;

/// Current version of the ClubDesk shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
