use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AppointmentStatus, Modality};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: Uuid,
    #[serde(rename = "nombre")]
    pub patient_name: String,
    #[serde(rename = "correo")]
    pub patient_email: String,
    #[serde(rename = "telefono")]
    pub patient_phone: String,
    pub doctor_id: Uuid,
    #[serde(rename = "especialidad")]
    pub specialty: String,
    #[serde(rename = "modalidad")]
    pub modality: Modality,
    #[serde(rename = "fecha")]
    pub date: NaiveDate,
    /// `HH:MM`, 24h clock
    #[serde(rename = "hora")]
    pub time: String,
    #[serde(rename = "notas")]
    pub notes: Option<String>,
    #[serde(rename = "estado")]
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update. `None` means "leave unchanged"; `notes: Some(None)` clears the notes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentChanges {
    pub patient_name: Option<String>,
    pub patient_email: Option<String>,
    pub patient_phone: Option<String>,
    pub doctor_id: Option<Uuid>,
    pub specialty: Option<String>,
    pub modality: Option<Modality>,
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    pub notes: Option<Option<String>>,
}

impl AppointmentChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the present fields onto `appt`.
    pub fn apply_to(self, appt: &mut Appointment) {
        if let Some(v) = self.patient_name {
            appt.patient_name = v;
        }
        if let Some(v) = self.patient_email {
            appt.patient_email = v;
        }
        if let Some(v) = self.patient_phone {
            appt.patient_phone = v;
        }
        if let Some(v) = self.doctor_id {
            appt.doctor_id = v;
        }
        if let Some(v) = self.specialty {
            appt.specialty = v;
        }
        if let Some(v) = self.modality {
            appt.modality = v;
        }
        if let Some(v) = self.date {
            appt.date = v;
        }
        if let Some(v) = self.time {
            appt.time = v;
        }
        if let Some(v) = self.notes {
            appt.notes = v;
        }
    }
}
