use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Modality;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "especialidad")]
    pub specialty: String,
    #[serde(rename = "modalidades")]
    pub modalities: Vec<Modality>,
    #[serde(rename = "consultorio")]
    pub office: Option<String>,
}

impl Doctor {
    pub fn offers(&self, modality: Modality) -> bool {
        self.modalities.contains(&modality)
    }

    /// Case-insensitive specialty comparison (input comes from free-text forms).
    pub fn has_specialty(&self, specialty: &str) -> bool {
        self.specialty.to_lowercase() == specialty.trim().to_lowercase()
    }
}
