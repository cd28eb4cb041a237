//! Account endpoints.
//!
//! `POST /auth/register`, `POST /auth/login`: public
//! `POST /auth/logout`, `GET /auth/me`: require a bearer session
//!
//! Password hashing is CPU-bound, so register and login run on the
//! blocking pool.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::{Extension, Json};
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, MessageResponse, SessionContext};
use crate::auth::{self, LoginRequest, RegisterRequest};
use crate::models::UserInfo;

#[derive(Serialize)]
pub struct RegisterResponse {
    pub message: &'static str,
    pub user: UserInfo,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    pub token: String,
    pub user: UserInfo,
}

#[derive(Serialize)]
pub struct MeResponse {
    pub user: UserInfo,
}

/// `POST /auth/register`
pub async fn register(
    State(ctx): State<ApiContext>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let Json(request) = payload?;
    let core = ctx.core.clone();
    let user = tokio::task::spawn_blocking(move || auth::register(&core, request)).await??;

    Ok(Json(RegisterResponse {
        message: "Usuario registrado correctamente",
        user,
    }))
}

/// `POST /auth/login`
pub async fn login(
    State(ctx): State<ApiContext>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(request) = payload?;
    let core = ctx.core.clone();
    let outcome = tokio::task::spawn_blocking(move || auth::login(&core, request)).await??;

    Ok(Json(LoginResponse {
        message: "Inicio de sesión exitoso",
        token: outcome.token,
        user: outcome.user,
    }))
}

/// `POST /auth/logout`
pub async fn logout(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<MessageResponse>, ApiError> {
    auth::logout(&ctx.core, &session.token)?;
    tracing::info!(user_id = %session.user_id, "User logged out");
    Ok(Json(MessageResponse::new("Sesión cerrada")))
}

/// `GET /auth/me`
pub async fn me(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<MeResponse>, ApiError> {
    let user = auth::current_user(&ctx.core, &session.token)?;
    Ok(Json(MeResponse { user }))
}
