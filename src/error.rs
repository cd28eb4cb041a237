//! Domain errors shared by the services. The HTTP layer maps each
//! variant to a status code in `api::error`.

use thiserror::Error;

use crate::core_state::CoreError;
use crate::db::DatabaseError;
use crate::login_guard::Locked;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("correo ya registrado")]
    EmailTaken,

    #[error("Credenciales inválidas")]
    InvalidCredentials { remaining_attempts: u32 },

    #[error(transparent)]
    RateLimited(#[from] Locked),

    #[error("Sesión inválida o expirada")]
    Unauthorized,

    #[error("Database error: {0}")]
    Database(DatabaseError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DatabaseError> for ServiceError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity_type, id } => {
                ServiceError::NotFound(format!("{entity_type} {id} no encontrado"))
            }
            other => ServiceError::Database(other),
        }
    }
}

impl From<CoreError> for ServiceError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Database(e) => e.into(),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(err: rusqlite::Error) -> Self {
        ServiceError::Database(DatabaseError::Sqlite(err))
    }
}
