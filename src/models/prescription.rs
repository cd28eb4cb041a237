use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    pub id: Uuid,
    #[serde(rename = "citaId")]
    pub appointment_id: Uuid,
    #[serde(rename = "nombrePaciente")]
    pub patient_name: String,
    pub doctor_id: Uuid,
    #[serde(rename = "medicamento")]
    pub medication: String,
    #[serde(rename = "dosis")]
    pub dose: String,
    #[serde(rename = "frecuencia")]
    pub frequency: String,
    #[serde(rename = "duracion")]
    pub duration: String,
    #[serde(rename = "indicaciones")]
    pub instructions: Option<String>,
    #[serde(rename = "fechaEmision")]
    pub issued_on: NaiveDate,
    pub updated_at: DateTime<Utc>,
}

/// Partial update of the mutable prescription fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrescriptionChanges {
    pub patient_name: Option<String>,
    pub medication: Option<String>,
    pub dose: Option<String>,
    pub frequency: Option<String>,
    pub duration: Option<String>,
    pub instructions: Option<Option<String>>,
}

impl PrescriptionChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(self, rx: &mut Prescription) {
        if let Some(v) = self.patient_name {
            rx.patient_name = v;
        }
        if let Some(v) = self.medication {
            rx.medication = v;
        }
        if let Some(v) = self.dose {
            rx.dose = v;
        }
        if let Some(v) = self.frequency {
            rx.frequency = v;
        }
        if let Some(v) = self.duration {
            rx.duration = v;
        }
        if let Some(v) = self.instructions {
            rx.instructions = v;
        }
    }
}
