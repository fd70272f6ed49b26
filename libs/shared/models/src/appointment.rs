use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::time::TimeOfDay;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Scheduled,
    Cancelled,
    Completed,
    NoShow,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "SCHEDULED"),
            AppointmentStatus::Cancelled => write!(f, "CANCELLED"),
            AppointmentStatus::Completed => write!(f, "COMPLETED"),
            AppointmentStatus::NoShow => write!(f, "NO_SHOW"),
        }
    }
}

impl AppointmentStatus {
    /// Every status except CANCELLED keeps its slot occupied.
    pub fn occupies_slot(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AppointmentStatus::Scheduled)
    }

    pub fn valid_transitions(&self) -> &'static [AppointmentStatus] {
        match self {
            AppointmentStatus::Scheduled => &[
                AppointmentStatus::Cancelled,
                AppointmentStatus::Completed,
                AppointmentStatus::NoShow,
            ],
            // Terminal states - no transitions allowed
            AppointmentStatus::Cancelled
            | AppointmentStatus::Completed
            | AppointmentStatus::NoShow => &[],
        }
    }

    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        self.valid_transitions().contains(&next)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub specialty_id: Uuid,
    pub appointment_date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn summary(&self) -> AppointmentSummary {
        AppointmentSummary {
            appointment_id: self.id,
            doctor_id: self.doctor_id,
            specialty_id: self.specialty_id,
            appointment_date: self.appointment_date,
            start_time: self.start_time,
            end_time: self.end_time,
            status: self.status,
        }
    }

    pub fn occupies(&self, doctor_id: Uuid, date: NaiveDate, start_time: TimeOfDay) -> bool {
        self.status.occupies_slot()
            && self.doctor_id == doctor_id
            && self.appointment_date == date
            && self.start_time == start_time
    }

    pub fn is_patient_booking(&self, patient_id: Uuid, doctor_id: Uuid, date: NaiveDate) -> bool {
        self.status.occupies_slot()
            && self.patient_id == patient_id
            && self.doctor_id == doctor_id
            && self.appointment_date == date
    }
}

/// Row to insert; the store assigns id, status and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub specialty_id: Uuid,
    pub appointment_date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub notes: Option<String>,
}

impl NewAppointment {
    pub fn into_appointment(self, now: DateTime<Utc>) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            patient_id: self.patient_id,
            doctor_id: self.doctor_id,
            specialty_id: self.specialty_id,
            appointment_date: self.appointment_date,
            start_time: self.start_time,
            end_time: self.end_time,
            status: AppointmentStatus::Scheduled,
            notes: self.notes,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppointmentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialty_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<TimeOfDay>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<TimeOfDay>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AppointmentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    /// Precondition checked by the store in the same write; not a column.
    #[serde(skip)]
    pub expected_status: Option<AppointmentStatus>,
}

impl AppointmentPatch {
    pub fn status(status: AppointmentStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Only apply the patch while the stored status is still `status`.
    pub fn expecting(mut self, status: AppointmentStatus) -> Self {
        self.expected_status = Some(status);
        self
    }

    /// True when the patch moves the appointment to another doctor, date or time.
    pub fn moves_slot(&self) -> bool {
        self.doctor_id.is_some() || self.appointment_date.is_some() || self.start_time.is_some()
    }

    pub fn apply_to(&self, appointment: &mut Appointment, now: DateTime<Utc>) {
        if let Some(doctor_id) = self.doctor_id {
            appointment.doctor_id = doctor_id;
        }
        if let Some(specialty_id) = self.specialty_id {
            appointment.specialty_id = specialty_id;
        }
        if let Some(date) = self.appointment_date {
            appointment.appointment_date = date;
        }
        if let Some(start_time) = self.start_time {
            appointment.start_time = start_time;
        }
        if let Some(end_time) = self.end_time {
            appointment.end_time = end_time;
        }
        if let Some(status) = self.status {
            appointment.status = status;
        }
        if let Some(notes) = &self.notes {
            appointment.notes = Some(notes.clone());
        }
        if let Some(reason) = &self.cancellation_reason {
            appointment.cancellation_reason = Some(reason.clone());
        }
        appointment.updated_at = now;
    }
}

/// What the notification collaborator gets to see about an appointment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentSummary {
    pub appointment_id: Uuid,
    pub doctor_id: Uuid,
    pub specialty_id: Uuid,
    pub appointment_date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub status: AppointmentStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Appointment {
        NewAppointment {
            patient_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            specialty_id: Uuid::new_v4(),
            appointment_date: NaiveDate::from_ymd_opt(2025, 12, 1).unwrap(),
            start_time: TimeOfDay::parse("10:00").unwrap(),
            end_time: TimeOfDay::parse("10:30").unwrap(),
            notes: None,
        }
        .into_appointment(Utc::now())
    }

    #[test]
    fn only_scheduled_can_transition() {
        use AppointmentStatus::*;
        assert!(Scheduled.can_transition_to(Cancelled));
        assert!(Scheduled.can_transition_to(Completed));
        assert!(Scheduled.can_transition_to(NoShow));
        assert!(!Scheduled.can_transition_to(Scheduled));
        for terminal in [Cancelled, Completed, NoShow] {
            assert!(terminal.is_terminal());
            assert!(terminal.valid_transitions().is_empty());
        }
    }

    #[test]
    fn cancelled_appointments_free_their_slot() {
        let mut appointment = sample();
        let (doctor, date, start) = (
            appointment.doctor_id,
            appointment.appointment_date,
            appointment.start_time,
        );
        assert!(appointment.occupies(doctor, date, start));
        appointment.status = AppointmentStatus::Completed;
        assert!(appointment.occupies(doctor, date, start));
        appointment.status = AppointmentStatus::Cancelled;
        assert!(!appointment.occupies(doctor, date, start));
        assert!(!appointment.is_patient_booking(appointment.patient_id, doctor, date));
    }

    #[test]
    fn patch_serializes_only_present_fields() {
        let patch = AppointmentPatch {
            cancellation_reason: Some("sick".into()),
            ..AppointmentPatch::status(AppointmentStatus::Cancelled)
        }
        .expecting(AppointmentStatus::Scheduled);
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "status": "CANCELLED", "cancellation_reason": "sick" })
        );
        assert!(!patch.moves_slot());
    }

    #[test]
    fn patch_applies_and_touches_updated_at() {
        let mut appointment = sample();
        let later = appointment.updated_at + chrono::Duration::minutes(5);
        let patch = AppointmentPatch {
            start_time: Some(TimeOfDay::parse("11:00").unwrap()),
            end_time: Some(TimeOfDay::parse("11:30").unwrap()),
            notes: Some("moved".into()),
            ..AppointmentPatch::default()
        };
        assert!(patch.moves_slot());
        patch.apply_to(&mut appointment, later);
        assert_eq!(appointment.start_time.to_string(), "11:00");
        assert_eq!(appointment.end_time.to_string(), "11:30");
        assert_eq!(appointment.notes.as_deref(), Some("moved"));
        assert_eq!(appointment.updated_at, later);
        assert_eq!(appointment.status, AppointmentStatus::Scheduled);
    }
}
