/// Middleware modules for the API server
///
/// - `security`: Security headers on every response
/// - `rate_limit`: Per-username login throttle

pub mod rate_limit;
pub mod security;
