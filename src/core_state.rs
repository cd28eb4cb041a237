//! Application state shared by every request handler.
//!
//! One SQLite connection behind a `Mutex`, plus the in-memory login guard,
//! session store and notifier. Wrapped in `Arc` at startup.

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::auth::SessionStore;
use crate::config::Settings;
use crate::db;
use crate::login_guard::{GuardPolicy, LoginAttemptGuard};
use crate::notifier::{self, LogNotifier, Notification, Notifier, NotifyError};

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    db: Mutex<Connection>,
    guard: LoginAttemptGuard,
    sessions: SessionStore,
    notifier: Arc<dyn Notifier>,
    settings: Settings,
}

impl CoreState {
    /// Open the configured database and build the notifier for `settings`.
    pub fn open(settings: Settings) -> Result<Self, CoreError> {
        let conn = db::open_database(&settings.db_path)?;
        let notifier = notifier::from_settings(&settings)?;
        tracing::info!(
            db = %settings.db_path.display(),
            notifier = notifier.name(),
            "Core state ready"
        );
        Ok(Self::with_parts(conn, notifier, settings))
    }

    /// Assemble state from an already-migrated connection.
    pub fn with_parts(conn: Connection, notifier: Arc<dyn Notifier>, settings: Settings) -> Self {
        let policy = GuardPolicy {
            max_attempts: settings.max_login_attempts,
            window: settings.lockout_window,
        };
        Self {
            db: Mutex::new(conn),
            guard: LoginAttemptGuard::new(policy),
            sessions: SessionStore::new(settings.session_ttl),
            notifier,
            settings,
        }
    }

    /// In-memory database with default settings and log-only notifications.
    pub fn in_memory() -> Result<Self, CoreError> {
        Self::in_memory_with(Arc::new(LogNotifier), Settings::default())
    }

    pub fn in_memory_with(notifier: Arc<dyn Notifier>, settings: Settings) -> Result<Self, CoreError> {
        let conn = db::open_memory_database()?;
        Ok(Self::with_parts(conn, notifier, settings))
    }

    // ── Database access ─────────────────────────────────────

    /// Run `f` with exclusive access to the connection.
    ///
    /// Keep the closure short: every request serializes on this lock.
    pub fn with_db<T, E>(&self, f: impl FnOnce(&Connection) -> Result<T, E>) -> Result<T, E>
    where
        E: From<CoreError>,
    {
        let conn = self.lock_db()?;
        f(&conn)
    }

    fn lock_db(&self) -> Result<MutexGuard<'_, Connection>, CoreError> {
        self.db.lock().map_err(|_| CoreError::LockPoisoned)
    }

    // ── Auth state ──────────────────────────────────────────

    pub fn guard(&self) -> &LoginAttemptGuard {
        &self.guard
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // ── Notifications ───────────────────────────────────────

    /// Fire-and-forget delivery. Must be called from within the runtime.
    pub fn notify(&self, notification: Notification) {
        notifier::dispatch(self.notifier.clone(), notification);
    }
}

// ═══════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Internal lock error")]
    LockPoisoned,
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("Notifier setup failed: {0}")]
    Notifier(#[from] NotifyError),
}
