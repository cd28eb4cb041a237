//! Doctor directory. Read-only: the roster is seeded by migration.

use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::appointment::parse_modality;
use crate::db;
use crate::error::ServiceError;
use crate::models::{Doctor, DoctorFilter};
use crate::validation;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoctorQuery {
    #[serde(rename = "especialidad")]
    pub specialty: Option<String>,
    #[serde(rename = "modalidad")]
    pub modality: Option<String>,
}

pub fn list(conn: &Connection) -> Result<Vec<Doctor>, ServiceError> {
    Ok(db::list_doctors(conn)?)
}

pub fn get(conn: &Connection, id: &Uuid) -> Result<Doctor, ServiceError> {
    db::get_doctor(conn, id)?.ok_or_else(|| ServiceError::NotFound(format!("Doctor {id} no encontrado")))
}

/// At least one criterion is required, and an empty result is `NotFound`.
pub fn filter(conn: &Connection, query: DoctorQuery) -> Result<Vec<Doctor>, ServiceError> {
    let filter = DoctorFilter {
        specialty: validation::optional(query.specialty.as_deref()),
        modality: validation::optional(query.modality.as_deref())
            .map(|m| parse_modality(&m))
            .transpose()?,
    };
    if filter.specialty.is_none() && filter.modality.is_none() {
        return Err(ServiceError::Validation(
            "Indique al menos 'especialidad' o 'modalidad'".into(),
        ));
    }

    let doctors = db::filter_doctors(conn, &filter)?;
    if doctors.is_empty() {
        return Err(ServiceError::NotFound(
            "No hay doctores que coincidan con el filtro".into(),
        ));
    }
    Ok(doctors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::models::Modality;

    fn query(specialty: Option<&str>, modality: Option<&str>) -> DoctorQuery {
        DoctorQuery {
            specialty: specialty.map(Into::into),
            modality: modality.map(Into::into),
        }
    }

    #[test]
    fn filter_requires_a_criterion() {
        let conn = open_memory_database().unwrap();
        let err = filter(&conn, query(None, Some("  "))).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn filter_by_specialty_ignores_case() {
        let conn = open_memory_database().unwrap();
        let found = filter(&conn, query(Some("CARDIOLOGÍA"), None)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].specialty, "Cardiología");
    }

    #[test]
    fn filter_by_modality() {
        let conn = open_memory_database().unwrap();
        let remote = filter(&conn, query(None, Some("virtual"))).unwrap();
        assert!(!remote.is_empty());
        assert!(remote.iter().all(|d| d.offers(Modality::Remote)));
    }

    #[test]
    fn filter_without_match_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = filter(&conn, query(Some("Cardiología"), Some("virtual"))).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn invalid_modality_is_rejected() {
        let conn = open_memory_database().unwrap();
        let err = filter(&conn, query(None, Some("holograma"))).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn get_unknown_doctor_is_not_found() {
        let conn = open_memory_database().unwrap();
        assert!(matches!(get(&conn, &Uuid::new_v4()), Err(ServiceError::NotFound(_))));
        let first = list(&conn).unwrap().remove(0);
        assert_eq!(get(&conn, &first.id).unwrap(), first);
    }
}
