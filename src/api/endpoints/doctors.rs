//! Doctor directory endpoints.
//!
//! - `GET /doctors`: full roster
//! - `GET /doctors/filter?especialidad=&modalidad=`: filtered roster
//! - `GET /doctors/:id`: one doctor

use axum::extract::{Path, Query, State};
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::doctors::{self, DoctorQuery};
use crate::models::Doctor;
use crate::validation;

/// `GET /doctors`
pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<Vec<Doctor>>, ApiError> {
    let doctors = ctx.core.with_db(|conn| doctors::list(conn))?;
    Ok(Json(doctors))
}

/// `GET /doctors/filter`: 400 without criteria, 404 when nothing matches.
pub async fn filter(
    State(ctx): State<ApiContext>,
    Query(query): Query<DoctorQuery>,
) -> Result<Json<Vec<Doctor>>, ApiError> {
    let doctors = ctx.core.with_db(|conn| doctors::filter(conn, query))?;
    Ok(Json(doctors))
}

/// `GET /doctors/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<Doctor>, ApiError> {
    let id = validation::id(&id, "id")?;
    let doctor = ctx.core.with_db(|conn| doctors::get(conn, &id))?;
    Ok(Json(doctor))
}
