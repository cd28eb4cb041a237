pub mod api; // HTTP API router, middleware, server lifecycle
pub mod appointment; // Appointment lifecycle
pub mod auth; // Registration, login, sessions
pub mod config;
pub mod core_state; // Shared state for all handlers
pub mod db;
pub mod doctors;
pub mod error;
pub mod login_guard; // Brute-force lockout
pub mod models;
pub mod notifier; // Patient notifications
pub mod prescription;
pub mod validation;

use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Startup failed: {0}")]
    Core(#[from] core_state::CoreError),
    #[error(transparent)]
    Server(#[from] api::ServerError),
}

/// Initialize tracing from `RUST_LOG`, falling back to the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}

/// Load settings from the environment, open the database, and serve until
/// `shutdown` resolves.
pub async fn run<F>(shutdown: F) -> Result<(), AppError>
where
    F: std::future::Future<Output = ()>,
{
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let settings = config::Settings::from_env()?;
    let bind_addr = settings.bind_addr;
    let core = Arc::new(core_state::CoreState::open(settings)?);

    let server = api::start_api_server(core, bind_addr).await?;
    tracing::info!(addr = %server.addr, "Listening");

    shutdown.await;
    server.stop().await?;
    tracing::info!("{} stopped", config::APP_NAME);
    Ok(())
}
