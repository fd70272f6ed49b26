use std::fmt;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use shared_models::{
    Appointment, AppointmentPatch, AppointmentStatus, BlockedPeriod, Doctor, NewAppointment, Schedule, Specialty,
    TimeOfDay,
};

/// Uniqueness rules the store enforces on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueConstraint {
    /// At most one non-cancelled appointment per (doctor, date, start time).
    SlotExclusivity,
    /// At most one non-cancelled appointment per (patient, doctor, date).
    PatientDailyBooking,
    /// At most one active schedule per (doctor, day of week).
    ActiveSchedulePerDay,
}

impl UniqueConstraint {
    pub const ALL: [UniqueConstraint; 3] = [
        UniqueConstraint::SlotExclusivity,
        UniqueConstraint::PatientDailyBooking,
        UniqueConstraint::ActiveSchedulePerDay,
    ];

    /// Name of the backing unique index in `sql/scheduling_constraints.sql`.
    pub fn index_name(&self) -> &'static str {
        match self {
            UniqueConstraint::SlotExclusivity => "appointments_active_slot_key",
            UniqueConstraint::PatientDailyBooking => "appointments_patient_doctor_day_key",
            UniqueConstraint::ActiveSchedulePerDay => "doctor_schedules_active_day_key",
        }
    }

    /// Finds the constraint whose index name appears in a database error message.
    pub fn from_error_message(message: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|constraint| message.contains(constraint.index_name()))
    }
}

impl fmt::Display for UniqueConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.index_name())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(UniqueConstraint),

    #[error("Appointment status is now {0}")]
    StaleStatus(AppointmentStatus),

    #[error("Invalid record: {0}")]
    Invalid(String),

    #[error("Failed to decode store response: {0}")]
    Decode(String),

    #[error("Store backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Default)]
pub struct DoctorFilter {
    pub specialty_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub active_only: bool,
}

impl DoctorFilter {
    pub fn active() -> Self {
        Self {
            active_only: true,
            ..Self::default()
        }
    }

    pub fn matches(&self, doctor: &Doctor) -> bool {
        (!self.active_only || doctor.is_active)
            && self.specialty_id.map_or(true, |id| doctor.specialty_id == id)
            && self.doctor_id.map_or(true, |id| doctor.id == id)
    }
}

/// Persistence contract consumed by the scheduling core.
///
/// Implementations must make `insert_appointment` and `update_appointment`
/// atomic with respect to the [`UniqueConstraint`] rules: of two concurrent
/// writes that would both occupy the same slot, exactly one succeeds and the
/// other returns [`StoreError::UniqueViolation`].
#[async_trait]
pub trait SchedulingStore: Send + Sync {
    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, StoreError>;

    /// Doctors matching the filter, ordered by name then id.
    async fn list_doctors(&self, filter: &DoctorFilter) -> Result<Vec<Doctor>, StoreError>;

    async fn get_specialty(&self, specialty_id: Uuid) -> Result<Option<Specialty>, StoreError>;

    /// Schedules ordered by day of week then start time.
    async fn schedules_for_doctor(
        &self,
        doctor_id: Uuid,
        active_only: bool,
    ) -> Result<Vec<Schedule>, StoreError>;

    async fn schedule_for_day(
        &self,
        doctor_id: Uuid,
        day_of_week: u8,
    ) -> Result<Option<Schedule>, StoreError> {
        Ok(self
            .schedules_for_doctor(doctor_id, true)
            .await?
            .into_iter()
            .find(|schedule| schedule.day_of_week == day_of_week))
    }

    async fn blocked_periods(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<BlockedPeriod>, StoreError>;

    /// The non-cancelled appointment occupying (doctor, date, start), if any.
    async fn find_slot_appointment(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        start_time: TimeOfDay,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<Option<Appointment>, StoreError>;

    /// The patient's non-cancelled appointment with this doctor on this date, if any.
    async fn find_patient_appointment(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        date: NaiveDate,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<Option<Appointment>, StoreError>;

    /// Non-cancelled appointments for the doctor on the date, ordered by start time.
    async fn appointments_for_doctor_on(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError>;

    async fn get_appointment(&self, appointment_id: Uuid)
        -> Result<Option<Appointment>, StoreError>;

    async fn insert_appointment(&self, appointment: NewAppointment)
        -> Result<Appointment, StoreError>;

    /// Applies `patch` in one write. When `patch.expected_status` is set and the
    /// stored status differs, nothing is written and
    /// [`StoreError::StaleStatus`] carries the current status.
    async fn update_appointment(
        &self,
        appointment_id: Uuid,
        patch: AppointmentPatch,
    ) -> Result<Appointment, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_is_recognised_from_postgres_message() {
        let message = r#"duplicate key value violates unique constraint "appointments_active_slot_key""#;
        assert_eq!(
            UniqueConstraint::from_error_message(message),
            Some(UniqueConstraint::SlotExclusivity)
        );
        assert_eq!(UniqueConstraint::from_error_message("some other failure"), None);
    }

    #[test]
    fn doctor_filter_combines_criteria() {
        let specialty = Uuid::new_v4();
        let doctor = Doctor {
            id: Uuid::new_v4(),
            full_name: "Dr. Ada Lovelace".into(),
            specialty_id: specialty,
            is_active: true,
        };

        assert!(DoctorFilter::active().matches(&doctor));
        assert!(DoctorFilter {
            specialty_id: Some(specialty),
            ..DoctorFilter::active()
        }
        .matches(&doctor));
        assert!(!DoctorFilter {
            doctor_id: Some(Uuid::new_v4()),
            ..DoctorFilter::default()
        }
        .matches(&doctor));

        let inactive = Doctor {
            is_active: false,
            ..doctor
        };
        assert!(!DoctorFilter::active().matches(&inactive));
        assert!(DoctorFilter::default().matches(&inactive));
    }
}
