//! API endpoint handlers, one module per resource.

pub mod appointments;
pub mod auth;
pub mod doctors;
pub mod health;
pub mod prescriptions;
