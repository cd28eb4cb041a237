//! Prescription endpoints (`/recetas`).

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, MessageResponse};
use crate::models::Prescription;
use crate::prescription::{self, PrescriptionRequest};
use crate::validation;

#[derive(Serialize)]
pub struct PrescriptionResponse {
    pub message: &'static str,
    pub receta: Prescription,
}

/// `POST /recetas`: 201, or 404 for an unknown appointment, 409 if one exists.
pub async fn create(
    State(ctx): State<ApiContext>,
    payload: Result<Json<PrescriptionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PrescriptionResponse>), ApiError> {
    let Json(request) = payload?;
    let (receta, notification) = ctx.core.with_db(|conn| prescription::create(conn, request))?;
    ctx.core.notify(notification);

    Ok((
        StatusCode::CREATED,
        Json(PrescriptionResponse {
            message: "Receta emitida correctamente",
            receta,
        }),
    ))
}

/// `GET /recetas/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<Prescription>, ApiError> {
    let id = validation::id(&id, "id")?;
    let receta = ctx.core.with_db(|conn| prescription::get(conn, &id))?;
    Ok(Json(receta))
}

/// `GET /recetas/cita/:cita_id`
pub async fn by_appointment(
    State(ctx): State<ApiContext>,
    Path(cita_id): Path<String>,
) -> Result<Json<Prescription>, ApiError> {
    let cita_id = validation::id(&cita_id, "citaId")?;
    let receta = ctx
        .core
        .with_db(|conn| prescription::get_by_appointment(conn, &cita_id))?;
    Ok(Json(receta))
}

/// `GET /recetas/doctor/:doctor_id`
pub async fn by_doctor(
    State(ctx): State<ApiContext>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Vec<Prescription>>, ApiError> {
    let doctor_id = validation::id(&doctor_id, "doctorId")?;
    let recetas = ctx
        .core
        .with_db(|conn| prescription::list_by_doctor(conn, &doctor_id))?;
    Ok(Json(recetas))
}

/// `PUT /recetas/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    payload: Result<Json<PrescriptionRequest>, JsonRejection>,
) -> Result<Json<PrescriptionResponse>, ApiError> {
    let id = validation::id(&id, "id")?;
    let Json(request) = payload?;
    let receta = ctx.core.with_db(|conn| prescription::update(conn, &id, request))?;
    Ok(Json(PrescriptionResponse {
        message: "Receta actualizada",
        receta,
    }))
}

/// `DELETE /recetas/:id`
pub async fn remove(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = validation::id(&id, "id")?;
    ctx.core.with_db(|conn| prescription::delete(conn, &id))?;
    Ok(Json(MessageResponse::new("Receta eliminada")))
}
