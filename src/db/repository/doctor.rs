use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::uuid_column;
use crate::db::DatabaseError;
use crate::models::{Doctor, DoctorFilter, Modality};

fn doctor_from_row(row: &Row<'_>) -> rusqlite::Result<Doctor> {
    let in_person: bool = row.get(3)?;
    let remote: bool = row.get(4)?;
    let mut modalities = Vec::with_capacity(2);
    if in_person {
        modalities.push(Modality::InPerson);
    }
    if remote {
        modalities.push(Modality::Remote);
    }
    Ok(Doctor {
        id: uuid_column(row, 0)?,
        name: row.get(1)?,
        specialty: row.get(2)?,
        modalities,
        office: row.get(5)?,
    })
}

pub fn insert_doctor(conn: &Connection, doctor: &Doctor) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO doctors (id, name, specialty, in_person, remote, office)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            doctor.id.to_string(),
            doctor.name,
            doctor.specialty,
            doctor.offers(Modality::InPerson),
            doctor.offers(Modality::Remote),
            doctor.office,
        ],
    )
    .map_err(DatabaseError::from_write)?;
    Ok(())
}

pub fn get_doctor(conn: &Connection, id: &Uuid) -> Result<Option<Doctor>, DatabaseError> {
    let doctor = conn
        .query_row(
            "SELECT id, name, specialty, in_person, remote, office FROM doctors WHERE id = ?1",
            params![id.to_string()],
            doctor_from_row,
        )
        .optional()?;
    Ok(doctor)
}

pub fn list_doctors(conn: &Connection) -> Result<Vec<Doctor>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, specialty, in_person, remote, office
         FROM doctors ORDER BY specialty, name",
    )?;
    let rows = stmt.query_map([], doctor_from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Filter doctors by specialty (case-insensitive, Unicode-aware) and offered modality.
/// Filtering happens in Rust: SQLite's `lower()` only folds ASCII.
pub fn filter_doctors(conn: &Connection, filter: &DoctorFilter) -> Result<Vec<Doctor>, DatabaseError> {
    let doctors = list_doctors(conn)?
        .into_iter()
        .filter(|d| {
            filter
                .specialty
                .as_deref()
                .map_or(true, |s| d.has_specialty(s))
        })
        .filter(|d| filter.modality.map_or(true, |m| d.offers(m)))
        .collect();
    Ok(doctors)
}
