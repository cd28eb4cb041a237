//! Appointment lifecycle: validated booking, partial updates, and the
//! `pending → confirmed | cancelled` state machine.
//!
//! Every check runs before the first write. Lifecycle events return the
//! `Notification` to send; delivery is the caller's business.

use std::str::FromStr;

use chrono::Utc;
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::db;
use crate::error::ServiceError;
use crate::models::{
    Appointment, AppointmentChanges, AppointmentFilter, AppointmentStatus, Doctor, Modality,
};
use crate::notifier::{messages, Notification};
use crate::validation;

// ─── Types ────────────────────────────────────────────────────────────────────

/// Booking form, also used as the body of a partial update (absent = unchanged).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentRequest {
    #[serde(rename = "nombre")]
    pub patient_name: Option<String>,
    #[serde(rename = "correo")]
    pub patient_email: Option<String>,
    #[serde(rename = "telefono")]
    pub patient_phone: Option<String>,
    pub doctor_id: Option<String>,
    #[serde(rename = "especialidad")]
    pub specialty: Option<String>,
    #[serde(rename = "modalidad")]
    pub modality: Option<String>,
    #[serde(rename = "fecha")]
    pub date: Option<String>,
    #[serde(rename = "hora")]
    pub time: Option<String>,
    #[serde(rename = "notas")]
    pub notes: Option<String>,
}

/// Query string of the listing endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentQuery {
    #[serde(rename = "correo")]
    pub patient_email: Option<String>,
    pub doctor_id: Option<String>,
    #[serde(rename = "fecha")]
    pub date: Option<String>,
}

// ─── Operations ───────────────────────────────────────────────────────────────

/// Book a new appointment in the `pending` state.
pub fn create(
    conn: &Connection,
    req: AppointmentRequest,
) -> Result<(Appointment, Notification), ServiceError> {
    validation::require_all(&[
        ("nombre", req.patient_name.as_deref()),
        ("correo", req.patient_email.as_deref()),
        ("telefono", req.patient_phone.as_deref()),
        ("doctorId", req.doctor_id.as_deref()),
        ("especialidad", req.specialty.as_deref()),
        ("modalidad", req.modality.as_deref()),
        ("fecha", req.date.as_deref()),
        ("hora", req.time.as_deref()),
    ])?;

    let patient_name = validation::required(req.patient_name.as_deref(), "nombre")?;
    let patient_email = validation::email(req.patient_email.as_deref().unwrap_or_default())?;
    let patient_phone = validation::required(req.patient_phone.as_deref(), "telefono")?;
    let doctor_id = validation::id(req.doctor_id.as_deref().unwrap_or_default(), "doctorId")?;
    let specialty = validation::required(req.specialty.as_deref(), "especialidad")?;
    let modality = parse_modality(req.modality.as_deref().unwrap_or_default())?;
    let date = validation::date(req.date.as_deref().unwrap_or_default())?;
    let time = validation::time(req.time.as_deref().unwrap_or_default())?;

    let doctor = check_doctor(conn, &doctor_id, &specialty, modality)?;

    let now = Utc::now();
    let appt = Appointment {
        id: Uuid::new_v4(),
        patient_name,
        patient_email,
        patient_phone,
        doctor_id,
        specialty: doctor.specialty.clone(),
        modality,
        date,
        time,
        notes: validation::optional(req.notes.as_deref()),
        status: AppointmentStatus::Pending,
        created_at: now,
        updated_at: now,
    };
    db::insert_appointment(conn, &appt)?;

    tracing::info!(appointment_id = %appt.id, doctor_id = %doctor.id, "Appointment booked");
    let notification = messages::appointment_booked(&appt, Some(&doctor));
    Ok((appt, notification))
}

pub fn get(conn: &Connection, id: &Uuid) -> Result<Appointment, ServiceError> {
    db::get_appointment(conn, id)?.ok_or_else(|| not_found(id))
}

pub fn list(conn: &Connection, filter: &AppointmentFilter) -> Result<Vec<Appointment>, ServiceError> {
    Ok(db::list_appointments(conn, filter)?)
}

impl AppointmentQuery {
    /// Validate the raw query values. Blank values are ignored.
    pub fn into_filter(self) -> Result<AppointmentFilter, ServiceError> {
        Ok(AppointmentFilter {
            patient_email: validation::optional(self.patient_email.as_deref())
                .map(|e| validation::email(&e))
                .transpose()?,
            doctor_id: validation::optional(self.doctor_id.as_deref())
                .map(|id| validation::id(&id, "doctorId"))
                .transpose()?,
            date: validation::optional(self.date.as_deref())
                .map(|d| validation::date(&d))
                .transpose()?,
        })
    }
}

/// Apply the fields present in `req`. The state is not patchable; an
/// empty patch returns the record unchanged.
pub fn update(conn: &Connection, id: &Uuid, req: AppointmentRequest) -> Result<Appointment, ServiceError> {
    let mut appt = get(conn, id)?;
    let changes = changes_from(req)?;
    if changes.is_empty() {
        return Ok(appt);
    }

    let touches_doctor =
        changes.doctor_id.is_some() || changes.specialty.is_some() || changes.modality.is_some();
    changes.apply_to(&mut appt);
    if touches_doctor {
        let doctor = check_doctor(conn, &appt.doctor_id, &appt.specialty, appt.modality)?;
        appt.specialty = doctor.specialty;
    }

    appt.updated_at = Utc::now();
    db::update_appointment(conn, &appt)?;
    tracing::info!(appointment_id = %appt.id, "Appointment updated");
    Ok(appt)
}

/// Move a pending appointment to `confirmed`.
pub fn confirm(conn: &Connection, id: &Uuid) -> Result<(Appointment, Option<Notification>), ServiceError> {
    transition(conn, id, AppointmentStatus::Confirmed)
}

/// Move a pending appointment to `cancelled`.
pub fn cancel(conn: &Connection, id: &Uuid) -> Result<(Appointment, Option<Notification>), ServiceError> {
    transition(conn, id, AppointmentStatus::Cancelled)
}

/// Deleting an appointment also deletes its prescription.
pub fn delete(conn: &Connection, id: &Uuid) -> Result<(), ServiceError> {
    db::delete_appointment(conn, id)?;
    tracing::info!(appointment_id = %id, "Appointment deleted");
    Ok(())
}

// ─── Internals ────────────────────────────────────────────────────────────────

/// Re-applying the current state succeeds without a notification.
fn transition(
    conn: &Connection,
    id: &Uuid,
    target: AppointmentStatus,
) -> Result<(Appointment, Option<Notification>), ServiceError> {
    let mut appt = get(conn, id)?;
    if appt.status == target {
        return Ok((appt, None));
    }
    if !appt.status.can_transition_to(target) {
        return Err(ServiceError::Conflict(format!(
            "La cita está {} y no puede pasar a {}",
            appt.status, target
        )));
    }

    let now = Utc::now();
    db::set_appointment_status(conn, id, target, now)?;
    let from = appt.status;
    appt.status = target;
    appt.updated_at = now;
    tracing::info!(appointment_id = %id, %from, to = %target, "Appointment state changed");

    let doctor = db::get_doctor(conn, &appt.doctor_id)?;
    let notification = match target {
        AppointmentStatus::Confirmed => messages::appointment_confirmed(&appt, doctor.as_ref()),
        _ => messages::appointment_cancelled(&appt, doctor.as_ref()),
    };
    Ok((appt, Some(notification)))
}

fn changes_from(req: AppointmentRequest) -> Result<AppointmentChanges, ServiceError> {
    let present = |value: Option<&str>, field: &str| -> Result<Option<String>, ServiceError> {
        value.map(|v| validation::required(Some(v), field)).transpose()
    };

    Ok(AppointmentChanges {
        patient_name: present(req.patient_name.as_deref(), "nombre")?,
        patient_email: req.patient_email.as_deref().map(validation::email).transpose()?,
        patient_phone: present(req.patient_phone.as_deref(), "telefono")?,
        doctor_id: req
            .doctor_id
            .as_deref()
            .map(|v| validation::id(v, "doctorId"))
            .transpose()?,
        specialty: present(req.specialty.as_deref(), "especialidad")?,
        modality: req.modality.as_deref().map(parse_modality).transpose()?,
        date: req.date.as_deref().map(validation::date).transpose()?,
        time: req.time.as_deref().map(validation::time).transpose()?,
        // A blank value clears the notes
        notes: req.notes.as_deref().map(|v| validation::optional(Some(v))),
    })
}

pub(crate) fn parse_modality(value: &str) -> Result<Modality, ServiceError> {
    Modality::from_str(&value.trim().to_lowercase()).map_err(|_| {
        ServiceError::Validation(format!(
            "Modalidad inválida: {value} (use 'presencial' o 'virtual')"
        ))
    })
}

/// The doctor must exist, practice `specialty`, and offer `modality`.
fn check_doctor(
    conn: &Connection,
    doctor_id: &Uuid,
    specialty: &str,
    modality: Modality,
) -> Result<Doctor, ServiceError> {
    let doctor = db::get_doctor(conn, doctor_id)?
        .ok_or_else(|| ServiceError::Validation(format!("El doctor {doctor_id} no existe")))?;
    if !doctor.has_specialty(specialty) {
        return Err(ServiceError::Validation(format!(
            "El doctor {} no atiende {}",
            doctor.name,
            specialty.trim()
        )));
    }
    if !doctor.offers(modality) {
        return Err(ServiceError::Validation(format!(
            "El doctor {} no ofrece consultas en modalidad {}",
            doctor.name, modality
        )));
    }
    Ok(doctor)
}

fn not_found(id: &Uuid) -> ServiceError {
    ServiceError::NotFound(format!("Cita {id} no encontrada"))
}
