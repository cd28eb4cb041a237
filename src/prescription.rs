//! Prescriptions: at most one per appointment.

use chrono::Utc;
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::{self, DatabaseError};
use crate::error::ServiceError;
use crate::models::{AppointmentStatus, Prescription, PrescriptionChanges};
use crate::notifier::{messages, Notification};
use crate::validation;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrescriptionRequest {
    #[serde(rename = "citaId")]
    pub appointment_id: Option<String>,
    #[serde(rename = "nombrePaciente")]
    pub patient_name: Option<String>,
    #[serde(rename = "doctorId")]
    pub doctor_id: Option<String>,
    #[serde(rename = "medicamento")]
    pub medication: Option<String>,
    #[serde(rename = "dosis")]
    pub dose: Option<String>,
    #[serde(rename = "frecuencia")]
    pub frequency: Option<String>,
    #[serde(rename = "duracion")]
    pub duration: Option<String>,
    #[serde(rename = "indicaciones")]
    pub instructions: Option<String>,
}

/// Issue the prescription for an appointment, dated today.
///
/// Returns the notification for the patient at the appointment's stored email.
pub fn create(
    conn: &Connection,
    req: PrescriptionRequest,
) -> Result<(Prescription, Notification), ServiceError> {
    validation::require_all(&[
        ("citaId", req.appointment_id.as_deref()),
        ("nombrePaciente", req.patient_name.as_deref()),
        ("doctorId", req.doctor_id.as_deref()),
        ("medicamento", req.medication.as_deref()),
        ("dosis", req.dose.as_deref()),
        ("frecuencia", req.frequency.as_deref()),
        ("duracion", req.duration.as_deref()),
    ])?;
    let appointment_id = validation::id(req.appointment_id.as_deref().unwrap_or_default(), "citaId")?;
    let doctor_id = validation::id(req.doctor_id.as_deref().unwrap_or_default(), "doctorId")?;

    let appt = db::get_appointment(conn, &appointment_id)?
        .ok_or_else(|| ServiceError::NotFound(format!("Cita {appointment_id} no encontrada")))?;
    if appt.doctor_id != doctor_id {
        return Err(ServiceError::Validation(
            "El doctor de la receta no corresponde al de la cita".into(),
        ));
    }
    if appt.status == AppointmentStatus::Cancelled {
        return Err(ServiceError::Conflict(
            "No se puede emitir una receta para una cita cancelada".into(),
        ));
    }
    if db::get_prescription_by_appointment(conn, &appointment_id)?.is_some() {
        return Err(already_issued(&appointment_id));
    }

    let now = Utc::now();
    let rx = Prescription {
        id: Uuid::new_v4(),
        appointment_id,
        patient_name: validation::required(req.patient_name.as_deref(), "nombrePaciente")?,
        doctor_id,
        medication: validation::required(req.medication.as_deref(), "medicamento")?,
        dose: validation::required(req.dose.as_deref(), "dosis")?,
        frequency: validation::required(req.frequency.as_deref(), "frecuencia")?,
        duration: validation::required(req.duration.as_deref(), "duracion")?,
        instructions: validation::optional(req.instructions.as_deref()),
        issued_on: now.date_naive(),
        updated_at: now,
    };

    match db::insert_prescription(conn, &rx) {
        Err(DatabaseError::ConstraintViolation(_)) => return Err(already_issued(&appointment_id)),
        other => other?,
    }
    tracing::info!(prescription_id = %rx.id, appointment_id = %appointment_id, "Prescription issued");

    let doctor = db::get_doctor(conn, &doctor_id)?;
    let notification = messages::prescription_issued(&rx, &appt, doctor.as_ref());
    Ok((rx, notification))
}

pub fn get(conn: &Connection, id: &Uuid) -> Result<Prescription, ServiceError> {
    db::get_prescription(conn, id)?
        .ok_or_else(|| ServiceError::NotFound(format!("Receta {id} no encontrada")))
}

pub fn get_by_appointment(conn: &Connection, appointment_id: &Uuid) -> Result<Prescription, ServiceError> {
    db::get_prescription_by_appointment(conn, appointment_id)?.ok_or_else(|| {
        ServiceError::NotFound(format!("La cita {appointment_id} no tiene receta"))
    })
}

pub fn list_by_doctor(conn: &Connection, doctor_id: &Uuid) -> Result<Vec<Prescription>, ServiceError> {
    Ok(db::list_prescriptions_by_doctor(conn, doctor_id)?)
}

/// Patch the mutable fields. The appointment and doctor references are fixed.
pub fn update(conn: &Connection, id: &Uuid, req: PrescriptionRequest) -> Result<Prescription, ServiceError> {
    let mut rx = get(conn, id)?;
    let present = |value: Option<&str>, field: &str| -> Result<Option<String>, ServiceError> {
        value.map(|v| validation::required(Some(v), field)).transpose()
    };
    let changes = PrescriptionChanges {
        patient_name: present(req.patient_name.as_deref(), "nombrePaciente")?,
        medication: present(req.medication.as_deref(), "medicamento")?,
        dose: present(req.dose.as_deref(), "dosis")?,
        frequency: present(req.frequency.as_deref(), "frecuencia")?,
        duration: present(req.duration.as_deref(), "duracion")?,
        instructions: req.instructions.as_deref().map(|v| validation::optional(Some(v))),
    };
    if changes.is_empty() {
        return Ok(rx);
    }

    changes.apply_to(&mut rx);
    rx.updated_at = Utc::now();
    db::update_prescription(conn, &rx)?;
    tracing::info!(prescription_id = %rx.id, "Prescription updated");
    Ok(rx)
}

pub fn delete(conn: &Connection, id: &Uuid) -> Result<(), ServiceError> {
    db::delete_prescription(conn, id)?;
    tracing::info!(prescription_id = %id, "Prescription deleted");
    Ok(())
}

fn already_issued(appointment_id: &Uuid) -> ServiceError {
    ServiceError::Conflict(format!("La cita {appointment_id} ya tiene una receta"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appointment::{self, tests::booking};
    use crate::db::open_memory_database;
    use crate::models::Appointment;

    fn booked(conn: &Connection) -> Appointment {
        appointment::create(conn, booking()).unwrap().0
    }

    fn request_for(appt: &Appointment) -> PrescriptionRequest {
        PrescriptionRequest {
            appointment_id: Some(appt.id.to_string()),
            patient_name: Some(appt.patient_name.clone()),
            doctor_id: Some(appt.doctor_id.to_string()),
            medication: Some("Enalapril".into()),
            dose: Some("10mg".into()),
            frequency: Some("cada 12 horas".into()),
            duration: Some("30 días".into()),
            instructions: None,
        }
    }

    #[test]
    fn create_dates_today_and_notifies_appointment_email() {
        let conn = open_memory_database().unwrap();
        let appt = booked(&conn);
        let (rx, notification) = create(&conn, request_for(&appt)).unwrap();

        assert_eq!(rx.issued_on, Utc::now().date_naive());
        assert_eq!(rx.appointment_id, appt.id);
        assert_eq!(notification.to, appt.patient_email);
        assert!(notification.body.contains("Enalapril"));
        assert_eq!(get_by_appointment(&conn, &appt.id).unwrap(), rx);
    }

    #[test]
    fn second_prescription_conflicts_and_original_survives() {
        let conn = open_memory_database().unwrap();
        let appt = booked(&conn);
        let (original, _) = create(&conn, request_for(&appt)).unwrap();

        let mut second = request_for(&appt);
        second.medication = Some("Losartán".into());
        assert!(matches!(create(&conn, second), Err(ServiceError::Conflict(_))));
        assert_eq!(get(&conn, &original.id).unwrap(), original);
    }

    #[test]
    fn unknown_appointment_is_not_found() {
        let conn = open_memory_database().unwrap();
        let appt = booked(&conn);
        let mut req = request_for(&appt);
        req.appointment_id = Some(Uuid::new_v4().to_string());
        assert!(matches!(create(&conn, req), Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn missing_fields_are_validated_before_lookup() {
        let conn = open_memory_database().unwrap();
        let req = PrescriptionRequest {
            appointment_id: Some(Uuid::new_v4().to_string()),
            ..Default::default()
        };
        assert!(matches!(create(&conn, req), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn doctor_must_match_appointment() {
        let conn = open_memory_database().unwrap();
        let appt = booked(&conn);
        let mut req = request_for(&appt);
        req.doctor_id = Some(appointment::tests::GENERAL_ID.into());
        assert!(matches!(create(&conn, req), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn cancelled_appointment_cannot_get_prescription() {
        let conn = open_memory_database().unwrap();
        let appt = booked(&conn);
        appointment::cancel(&conn, &appt.id).unwrap();
        assert!(matches!(create(&conn, request_for(&appt)), Err(ServiceError::Conflict(_))));
    }

    #[test]
    fn update_patches_fields_and_keeps_references() {
        let conn = open_memory_database().unwrap();
        let appt = booked(&conn);
        let (rx, _) = create(&conn, request_for(&appt)).unwrap();

        let patch = PrescriptionRequest {
            dose: Some("20mg".into()),
            instructions: Some("En ayunas".into()),
            appointment_id: Some(Uuid::new_v4().to_string()),
            ..Default::default()
        };
        let updated = update(&conn, &rx.id, patch).unwrap();
        assert_eq!(updated.dose, "20mg");
        assert_eq!(updated.instructions.as_deref(), Some("En ayunas"));
        assert_eq!(updated.appointment_id, appt.id);
        assert_eq!(updated.medication, "Enalapril");

        let blank = PrescriptionRequest {
            medication: Some(" ".into()),
            ..Default::default()
        };
        assert!(matches!(update(&conn, &rx.id, blank), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn list_by_doctor_and_delete() {
        let conn = open_memory_database().unwrap();
        let appt = booked(&conn);
        let (rx, _) = create(&conn, request_for(&appt)).unwrap();

        assert_eq!(list_by_doctor(&conn, &appt.doctor_id).unwrap(), vec![rx.clone()]);
        delete(&conn, &rx.id).unwrap();
        assert!(list_by_doctor(&conn, &appt.doctor_id).unwrap().is_empty());
        assert!(matches!(delete(&conn, &rx.id), Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn deleting_appointment_removes_prescription() {
        let conn = open_memory_database().unwrap();
        let appt = booked(&conn);
        let (rx, _) = create(&conn, request_for(&appt)).unwrap();
        appointment::delete(&conn, &appt.id).unwrap();
        assert!(matches!(get(&conn, &rx.id), Err(ServiceError::NotFound(_))));
    }
}
