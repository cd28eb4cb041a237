//! Appointment endpoints (`/citas`).
//!
//! Booking, confirmation and cancellation notify the patient in the
//! background; the response never waits on delivery.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, MessageResponse};
use crate::appointment::{self, AppointmentQuery, AppointmentRequest};
use crate::models::Appointment;
use crate::validation;

#[derive(Serialize)]
pub struct AppointmentResponse {
    pub message: &'static str,
    pub cita: Appointment,
}

/// `POST /citas`: 201 with the pending appointment.
pub async fn create(
    State(ctx): State<ApiContext>,
    payload: Result<Json<AppointmentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AppointmentResponse>), ApiError> {
    let Json(request) = payload?;
    let (cita, notification) = ctx.core.with_db(|conn| appointment::create(conn, request))?;
    ctx.core.notify(notification);

    Ok((
        StatusCode::CREATED,
        Json(AppointmentResponse {
            message: "Cita registrada correctamente",
            cita,
        }),
    ))
}

/// `GET /citas?correo=&doctorId=&fecha=`
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(query): Query<AppointmentQuery>,
) -> Result<Json<Vec<Appointment>>, ApiError> {
    let filter = query.into_filter()?;
    let citas = ctx.core.with_db(|conn| appointment::list(conn, &filter))?;
    Ok(Json(citas))
}

/// `GET /citas/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, ApiError> {
    let id = validation::id(&id, "id")?;
    let cita = ctx.core.with_db(|conn| appointment::get(conn, &id))?;
    Ok(Json(cita))
}

/// `PUT /citas/:id`: partial update; absent fields are left unchanged.
pub async fn update(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    payload: Result<Json<AppointmentRequest>, JsonRejection>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    let id = validation::id(&id, "id")?;
    let Json(request) = payload?;
    let cita = ctx.core.with_db(|conn| appointment::update(conn, &id, request))?;
    Ok(Json(AppointmentResponse {
        message: "Cita actualizada",
        cita,
    }))
}

/// `DELETE /citas/:id`
pub async fn remove(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = validation::id(&id, "id")?;
    ctx.core.with_db(|conn| appointment::delete(conn, &id))?;
    Ok(Json(MessageResponse::new("Cita eliminada")))
}

/// `PATCH /citas/:id/confirmar`
pub async fn confirm(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    let id = validation::id(&id, "id")?;
    let (cita, notification) = ctx.core.with_db(|conn| appointment::confirm(conn, &id))?;
    if let Some(notification) = notification {
        ctx.core.notify(notification);
    }
    Ok(Json(AppointmentResponse {
        message: "Cita confirmada",
        cita,
    }))
}

/// `PATCH /citas/:id/cancelar`
pub async fn cancel(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    let id = validation::id(&id, "id")?;
    let (cita, notification) = ctx.core.with_db(|conn| appointment::cancel(conn, &id))?;
    if let Some(notification) = notification {
        ctx.core.notify(notification);
    }
    Ok(Json(AppointmentResponse {
        message: "Cita cancelada",
        cita,
    }))
}
