//! API middleware.
//!
//! - `audit` wraps every route and logs method, path, status and latency.
//! - `auth` guards the session routes and injects `SessionContext`.

pub mod audit;
pub mod auth;
