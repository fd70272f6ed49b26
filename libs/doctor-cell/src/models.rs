use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::TimeOfDay;

/// One bookable interval on a doctor's day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment_id: Option<Uuid>,
}

/// A free slot tagged with the doctor it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailableSlot {
    pub doctor_id: Uuid,
    pub doctor_name: String,
    pub specialty_id: Uuid,
    pub date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
}

impl AvailableSlot {
    pub fn from_slot(slot: TimeSlot, doctor_name: &str, specialty_id: Uuid) -> Self {
        Self {
            doctor_id: slot.doctor_id,
            doctor_name: doctor_name.to_string(),
            specialty_id,
            date: slot.date,
            start_time: slot.start_time,
            end_time: slot.end_time,
        }
    }
}

/// Also the query string of `GET /doctors/availability`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AvailabilityFilters {
    pub date: Option<NaiveDate>,
    pub specialty_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DaySlotsQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityResponse {
    pub date: NaiveDate,
    pub total: usize,
    pub available_slots: Vec<AvailableSlot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorDayResponse {
    pub doctor_id: Uuid,
    pub doctor_name: String,
    pub date: NaiveDate,
    pub slot_duration_minutes: Option<u16>,
    pub slots: Vec<TimeSlot>,
}
