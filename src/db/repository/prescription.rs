use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{date_column, timestamp_column, uuid_column};
use crate::db::DatabaseError;
use crate::models::Prescription;

const PRESCRIPTION_COLUMNS: &str = "id, appointment_id, patient_name, doctor_id, medication, \
     dose, frequency, duration, instructions, issued_on, updated_at";

fn prescription_from_row(row: &Row<'_>) -> rusqlite::Result<Prescription> {
    Ok(Prescription {
        id: uuid_column(row, 0)?,
        appointment_id: uuid_column(row, 1)?,
        patient_name: row.get(2)?,
        doctor_id: uuid_column(row, 3)?,
        medication: row.get(4)?,
        dose: row.get(5)?,
        frequency: row.get(6)?,
        duration: row.get(7)?,
        instructions: row.get(8)?,
        issued_on: date_column(row, 9)?,
        updated_at: timestamp_column(row, 10)?,
    })
}

/// Insert a prescription. A second prescription for the same appointment
/// violates the UNIQUE index and surfaces as `ConstraintViolation`.
pub fn insert_prescription(conn: &Connection, rx: &Prescription) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO prescriptions (id, appointment_id, patient_name, doctor_id, medication,
         dose, frequency, duration, instructions, issued_on, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            rx.id.to_string(),
            rx.appointment_id.to_string(),
            rx.patient_name,
            rx.doctor_id.to_string(),
            rx.medication,
            rx.dose,
            rx.frequency,
            rx.duration,
            rx.instructions,
            rx.issued_on.to_string(),
            rx.updated_at.to_rfc3339(),
        ],
    )
    .map_err(DatabaseError::from_write)?;
    Ok(())
}

pub fn get_prescription(conn: &Connection, id: &Uuid) -> Result<Option<Prescription>, DatabaseError> {
    let sql = format!("SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions WHERE id = ?1");
    let rx = conn
        .query_row(&sql, params![id.to_string()], prescription_from_row)
        .optional()?;
    Ok(rx)
}

pub fn get_prescription_by_appointment(
    conn: &Connection,
    appointment_id: &Uuid,
) -> Result<Option<Prescription>, DatabaseError> {
    let sql = format!("SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions WHERE appointment_id = ?1");
    let rx = conn
        .query_row(&sql, params![appointment_id.to_string()], prescription_from_row)
        .optional()?;
    Ok(rx)
}

pub fn list_prescriptions_by_doctor(
    conn: &Connection,
    doctor_id: &Uuid,
) -> Result<Vec<Prescription>, DatabaseError> {
    let sql = format!(
        "SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions WHERE doctor_id = ?1
         ORDER BY issued_on DESC, updated_at DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![doctor_id.to_string()], prescription_from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

pub fn update_prescription(conn: &Connection, rx: &Prescription) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE prescriptions SET patient_name = ?2, medication = ?3, dose = ?4, frequency = ?5,
         duration = ?6, instructions = ?7, updated_at = ?8
         WHERE id = ?1",
        params![
            rx.id.to_string(),
            rx.patient_name,
            rx.medication,
            rx.dose,
            rx.frequency,
            rx.duration,
            rx.instructions,
            rx.updated_at.to_rfc3339(),
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::not_found("prescription", rx.id));
    }
    Ok(())
}

pub fn delete_prescription(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM prescriptions WHERE id = ?1",
        params![id.to_string()],
    )?;
    if deleted == 0 {
        return Err(DatabaseError::not_found("prescription", id));
    }
    Ok(())
}
