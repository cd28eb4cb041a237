//! Account registration, login against the attempt guard, bearer sessions.
//!
//! Password hashing runs outside the database lock; only the short
//! read/write steps go through `CoreState::with_db`.

pub mod password;
pub mod session;

pub use password::{hash_password, verify_missing_account, verify_password};
pub use session::SessionStore;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core_state::CoreState;
use crate::db::{self, DatabaseError};
use crate::error::ServiceError;
use crate::login_guard;
use crate::models::{User, UserInfo};
use crate::validation;

pub const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Deserialize, Default)]
pub struct RegisterRequest {
    #[serde(rename = "nombre")]
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub token: String,
    pub user: UserInfo,
}

pub fn register(core: &CoreState, req: RegisterRequest) -> Result<UserInfo, ServiceError> {
    validation::require_all(&[
        ("nombre", req.name.as_deref()),
        ("email", req.email.as_deref()),
        ("password", req.password.as_deref()),
    ])?;
    let name = validation::required(req.name.as_deref(), "nombre")?;
    let email = validation::email(req.email.as_deref().unwrap_or_default())?;
    let password = req.password.unwrap_or_default();
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ServiceError::Validation(format!(
            "La contraseña debe tener al menos {MIN_PASSWORD_LENGTH} caracteres"
        )));
    }

    if core.with_db(|conn| db::get_user_by_email(conn, &email).map_err(ServiceError::from))?.is_some() {
        return Err(ServiceError::EmailTaken);
    }

    let user = User {
        id: Uuid::new_v4(),
        name,
        email,
        password_hash: hash_password(&password),
        failed_attempts: 0,
        locked_until: None,
        last_login: None,
        created_at: Utc::now(),
    };

    core.with_db(|conn| match db::insert_user(conn, &user) {
        // Lost a race with a concurrent registration of the same email
        Err(DatabaseError::ConstraintViolation(_)) => Err(ServiceError::EmailTaken),
        other => other.map_err(ServiceError::from),
    })?;

    tracing::info!(user_id = %user.id, "User registered");
    Ok(user.to_info())
}

/// Verify credentials and open a session.
///
/// Locked identifiers are rejected before the password is checked. Every
/// failure counts against the identifier, known account or not.
pub fn login(core: &CoreState, req: LoginRequest) -> Result<LoginOutcome, ServiceError> {
    validation::require_all(&[
        ("email", req.email.as_deref()),
        ("password", req.password.as_deref()),
    ])?;
    let email = login_guard::normalize(req.email.as_deref().unwrap_or_default());
    let password = req.password.unwrap_or_default();

    core.guard().check_allowed(&email)?;

    let user = core.with_db(|conn| db::get_user_by_email(conn, &email).map_err(ServiceError::from))?;
    let verified = match &user {
        Some(user) => verify_password(&password, &user.password_hash),
        None => verify_missing_account(&password),
    };
    let mut user = match user {
        Some(user) if verified => user,
        other => return Err(reject(core, &email, other.map(|u| u.id))),
    };

    core.guard().record_success(&email);
    let now = Utc::now();
    core.with_db(|conn| db::record_login_success(conn, &user.id, now).map_err(ServiceError::from))?;
    user.failed_attempts = 0;
    user.locked_until = None;
    user.last_login = Some(now);

    let token = core.sessions().issue(user.id);
    tracing::info!(user_id = %user.id, "User logged in");
    Ok(LoginOutcome {
        token,
        user: user.to_info(),
    })
}

/// Count a failed login and mirror the counters into the account row.
fn reject(core: &CoreState, email: &str, user_id: Option<Uuid>) -> ServiceError {
    let state = core.guard().record_failure(email);
    tracing::info!(
        attempts = state.attempts,
        max_attempts = state.max_attempts,
        "Login failed"
    );

    if let Some(user_id) = user_id {
        let locked_until = state
            .seconds_remaining
            .filter(|_| state.locked)
            .map(|secs| Utc::now() + chrono::Duration::seconds(secs as i64));
        let mirrored = core.with_db(|conn| {
            db::record_login_failure(conn, &user_id, state.attempts, locked_until)
                .map_err(ServiceError::from)
        });
        if let Err(e) = mirrored {
            return e;
        }
    }

    ServiceError::InvalidCredentials {
        remaining_attempts: state.remaining_attempts(),
    }
}

pub fn logout(core: &CoreState, token: &str) -> Result<(), ServiceError> {
    if core.sessions().revoke(token) {
        Ok(())
    } else {
        Err(ServiceError::Unauthorized)
    }
}

pub fn current_user(core: &CoreState, token: &str) -> Result<UserInfo, ServiceError> {
    let user_id = core.sessions().resolve(token).ok_or(ServiceError::Unauthorized)?;
    let user = core.with_db(|conn| db::get_user(conn, &user_id).map_err(ServiceError::from))?;
    user.map(|u| u.to_info()).ok_or(ServiceError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(email: &str) -> RegisterRequest {
        RegisterRequest {
            name: Some("Ana Pérez".into()),
            email: Some(email.into()),
            password: Some("secreto1".into()),
        }
    }

    fn credentials(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }

    fn stored_user(core: &CoreState, email: &str) -> User {
        core.with_db(|conn| db::get_user_by_email(conn, email).map_err(ServiceError::from))
            .unwrap()
            .unwrap()
    }

    #[test]
    fn register_returns_info_and_hashes_password() {
        let core = CoreState::in_memory().unwrap();
        let info = register(&core, registration("Ana@Example.com")).unwrap();
        assert_eq!(info.email, "ana@example.com");
        assert_eq!(info.name, "Ana Pérez");

        let user = stored_user(&core, "ana@example.com");
        assert_ne!(user.password_hash, "secreto1");
        assert!(verify_password("secreto1", &user.password_hash));
    }

    #[test]
    fn register_rejects_missing_and_short_fields() {
        let core = CoreState::in_memory().unwrap();
        let err = register(&core, RegisterRequest::default()).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let mut req = registration("a@b.com");
        req.password = Some("12345".into());
        assert!(matches!(register(&core, req), Err(ServiceError::Validation(_))));

        let req = registration("not-an-email");
        assert!(matches!(register(&core, req), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let core = CoreState::in_memory().unwrap();
        register(&core, registration("a@b.com")).unwrap();
        let err = register(&core, registration(" A@B.com ")).unwrap_err();
        assert!(matches!(err, ServiceError::EmailTaken));
    }

    #[test]
    fn login_issues_resolvable_token() {
        let core = CoreState::in_memory().unwrap();
        register(&core, registration("a@b.com")).unwrap();

        let outcome = login(&core, credentials("a@b.com", "secreto1")).unwrap();
        assert!(outcome.user.last_login.is_some());

        let me = current_user(&core, &outcome.token).unwrap();
        assert_eq!(me.email, "a@b.com");
    }

    #[test]
    fn wrong_password_reports_remaining_attempts() {
        let core = CoreState::in_memory().unwrap();
        register(&core, registration("a@b.com")).unwrap();

        let err = login(&core, credentials("a@b.com", "wrong")).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InvalidCredentials { remaining_attempts: 4 }
        ));
        assert_eq!(stored_user(&core, "a@b.com").failed_attempts, 1);
    }

    #[test]
    fn unknown_email_counts_as_failure() {
        let core = CoreState::in_memory().unwrap();
        let err = login(&core, credentials("ghost@b.com", "whatever")).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidCredentials { .. }));
        assert_eq!(core.guard().attempts("ghost@b.com"), 1);
    }

    #[test]
    fn unknown_email_never_matches_placeholder_hash() {
        let core = CoreState::in_memory().unwrap();
        let err = login(&core, credentials("ghost@b.com", "citamed-no-account")).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InvalidCredentials { remaining_attempts: 4 }
        ));
    }

    #[test]
    fn fifth_failure_locks_and_sixth_attempt_is_rate_limited() {
        let core = CoreState::in_memory().unwrap();
        register(&core, registration("a@b.com")).unwrap();

        for _ in 0..5 {
            let err = login(&core, credentials("a@b.com", "wrong")).unwrap_err();
            assert!(matches!(err, ServiceError::InvalidCredentials { .. }));
        }
        let user = stored_user(&core, "a@b.com");
        assert_eq!(user.failed_attempts, 5);
        assert!(user.locked_until.is_some());

        // Correct password is refused while locked
        let err = login(&core, credentials("a@b.com", "secreto1")).unwrap_err();
        match err {
            ServiceError::RateLimited(locked) => {
                assert_eq!(locked.attempts, 5);
                assert!(locked.seconds_remaining >= 1 && locked.seconds_remaining <= 60);
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn success_resets_counters() {
        let core = CoreState::in_memory().unwrap();
        register(&core, registration("a@b.com")).unwrap();
        for _ in 0..3 {
            let _ = login(&core, credentials("a@b.com", "wrong"));
        }
        login(&core, credentials("A@b.com", "secreto1")).unwrap();

        assert_eq!(core.guard().attempts("a@b.com"), 0);
        let user = stored_user(&core, "a@b.com");
        assert_eq!(user.failed_attempts, 0);
        assert!(user.locked_until.is_none());
    }

    #[test]
    fn logout_revokes_session() {
        let core = CoreState::in_memory().unwrap();
        register(&core, registration("a@b.com")).unwrap();
        let outcome = login(&core, credentials("a@b.com", "secreto1")).unwrap();

        logout(&core, &outcome.token).unwrap();
        assert!(matches!(
            current_user(&core, &outcome.token),
            Err(ServiceError::Unauthorized)
        ));
        assert!(matches!(logout(&core, &outcome.token), Err(ServiceError::Unauthorized)));
    }
}
