//! # ClubDesk API Server Library
//!
//! HTTP layer of ClubDesk: configuration, the Axum router, error mapping and
//! request handlers. Domain rules and SQL live in `clubdesk-shared`.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration from environment variables
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Security headers and login throttling
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
