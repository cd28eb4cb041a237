use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{date_column, enum_column, timestamp_column, uuid_column};
use crate::db::DatabaseError;
use crate::models::{Appointment, AppointmentFilter, AppointmentStatus};

const APPOINTMENT_COLUMNS: &str = "id, patient_name, patient_email, patient_phone, doctor_id, \
     specialty, modality, date, time, notes, status, created_at, updated_at";

fn appointment_from_row(row: &Row<'_>) -> rusqlite::Result<Appointment> {
    Ok(Appointment {
        id: uuid_column(row, 0)?,
        patient_name: row.get(1)?,
        patient_email: row.get(2)?,
        patient_phone: row.get(3)?,
        doctor_id: uuid_column(row, 4)?,
        specialty: row.get(5)?,
        modality: enum_column(row, 6)?,
        date: date_column(row, 7)?,
        time: row.get(8)?,
        notes: row.get(9)?,
        status: enum_column(row, 10)?,
        created_at: timestamp_column(row, 11)?,
        updated_at: timestamp_column(row, 12)?,
    })
}

pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointments (id, patient_name, patient_email, patient_phone, doctor_id,
         specialty, modality, date, time, notes, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            appt.id.to_string(),
            appt.patient_name,
            appt.patient_email,
            appt.patient_phone,
            appt.doctor_id.to_string(),
            appt.specialty,
            appt.modality.as_str(),
            appt.date.to_string(),
            appt.time,
            appt.notes,
            appt.status.as_str(),
            appt.created_at.to_rfc3339(),
            appt.updated_at.to_rfc3339(),
        ],
    )
    .map_err(DatabaseError::from_write)?;
    Ok(())
}

pub fn get_appointment(conn: &Connection, id: &Uuid) -> Result<Option<Appointment>, DatabaseError> {
    let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1");
    let appt = conn
        .query_row(&sql, params![id.to_string()], appointment_from_row)
        .optional()?;
    Ok(appt)
}

/// List appointments matching every present filter field, ordered by date and time.
pub fn list_appointments(
    conn: &Connection,
    filter: &AppointmentFilter,
) -> Result<Vec<Appointment>, DatabaseError> {
    let mut sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE 1=1");
    let mut values: Vec<Value> = Vec::new();

    if let Some(email) = &filter.patient_email {
        values.push(Value::Text(email.clone()));
        sql.push_str(&format!(" AND patient_email = ?{}", values.len()));
    }
    if let Some(doctor_id) = &filter.doctor_id {
        values.push(Value::Text(doctor_id.to_string()));
        sql.push_str(&format!(" AND doctor_id = ?{}", values.len()));
    }
    if let Some(date) = &filter.date {
        values.push(Value::Text(date.to_string()));
        sql.push_str(&format!(" AND date = ?{}", values.len()));
    }
    sql.push_str(" ORDER BY date, time");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values), appointment_from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Overwrite every mutable column of an existing appointment.
pub fn update_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    let updated = conn
        .execute(
            "UPDATE appointments SET patient_name = ?2, patient_email = ?3, patient_phone = ?4,
             doctor_id = ?5, specialty = ?6, modality = ?7, date = ?8, time = ?9, notes = ?10,
             status = ?11, updated_at = ?12
             WHERE id = ?1",
            params![
                appt.id.to_string(),
                appt.patient_name,
                appt.patient_email,
                appt.patient_phone,
                appt.doctor_id.to_string(),
                appt.specialty,
                appt.modality.as_str(),
                appt.date.to_string(),
                appt.time,
                appt.notes,
                appt.status.as_str(),
                appt.updated_at.to_rfc3339(),
            ],
        )
        .map_err(DatabaseError::from_write)?;
    if updated == 0 {
        return Err(DatabaseError::not_found("appointment", appt.id));
    }
    Ok(())
}

pub fn set_appointment_status(
    conn: &Connection,
    id: &Uuid,
    status: AppointmentStatus,
    at: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE appointments SET status = ?2, updated_at = ?3 WHERE id = ?1",
        params![id.to_string(), status.as_str(), at.to_rfc3339()],
    )?;
    if updated == 0 {
        return Err(DatabaseError::not_found("appointment", id));
    }
    Ok(())
}

pub fn delete_appointment(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM appointments WHERE id = ?1",
        params![id.to_string()],
    )?;
    if deleted == 0 {
        return Err(DatabaseError::not_found("appointment", id));
    }
    Ok(())
}
