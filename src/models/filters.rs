use chrono::NaiveDate;
use uuid::Uuid;

use super::enums::Modality;

#[derive(Debug, Default, Clone)]
pub struct AppointmentFilter {
    pub patient_email: Option<String>,
    pub doctor_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Default, Clone)]
pub struct DoctorFilter {
    pub specialty: Option<String>,
    pub modality: Option<Modality>,
}
