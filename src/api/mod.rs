//! HTTP API.
//!
//! Exposes the booking services as JSON endpoints. Account routes that
//! need a session sit behind the bearer middleware; every request passes
//! through the audit logger.
//!
//! The router is composable: `api_router()` returns a `Router` that can
//! be mounted on any axum server instance.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_api_server, ApiServer, ServerError};
pub use types::ApiContext;
