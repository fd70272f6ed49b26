// libs/appointment-cell/src/services/validator.rs
use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::{SchedulingStore, StoreError};
use shared_models::scheduling::{day_name, day_of_week};

use crate::models::{BookingCandidate, BookingError, ErrorKind, ValidatedSlot, ValidationResult};

/// Checks a requested slot against the doctor's schedule and existing bookings.
///
/// Checks run in a fixed order and stop at the first failure. Only reads are
/// performed; a passing result is not a reservation, the store still enforces
/// uniqueness on insert.
pub struct BookingValidator {
    store: Arc<dyn SchedulingStore>,
}

impl BookingValidator {
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self { store }
    }

    /// Dry-run form: rejections come back as a `ValidationResult`, only store
    /// failures are errors.
    pub async fn validate_booking(
        &self,
        candidate: &BookingCandidate,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<ValidationResult, StoreError> {
        match self.check(candidate, exclude_appointment_id).await {
            Ok(slot) => Ok(ValidationResult::accepted(&slot)),
            Err(BookingError::Rejected { kind, message }) => {
                Ok(ValidationResult::rejected(kind, message))
            }
            Err(BookingError::Store(e)) => Err(e),
        }
    }

    pub async fn check(
        &self,
        candidate: &BookingCandidate,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<ValidatedSlot, BookingError> {
        debug!(
            "Validating booking for doctor {} on {} at {}",
            candidate.doctor_id, candidate.date, candidate.start_time
        );

        let result = self.run_checks(candidate, exclude_appointment_id).await;
        if let Err(BookingError::Rejected { kind, message }) = &result {
            warn!("Booking rejected ({}): {}", kind, message);
        }
        result
    }

    async fn run_checks(
        &self,
        candidate: &BookingCandidate,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<ValidatedSlot, BookingError> {
        let doctor = self
            .store
            .get_doctor(candidate.doctor_id)
            .await?
            .filter(|doctor| doctor.is_active)
            .ok_or_else(|| {
                BookingError::rejected(
                    ErrorKind::DoctorNotFound,
                    format!("Doctor {} not found", candidate.doctor_id),
                )
            })?;

        let specialty = self
            .store
            .get_specialty(candidate.specialty_id)
            .await?
            .ok_or_else(|| {
                BookingError::rejected(
                    ErrorKind::SpecialtyNotFound,
                    format!("Specialty {} not found", candidate.specialty_id),
                )
            })?;

        if doctor.specialty_id != specialty.id {
            return Err(BookingError::rejected(
                ErrorKind::SpecialtyMismatch,
                format!("{} does not practice {}", doctor.full_name, specialty.name),
            ));
        }

        let weekday = day_of_week(candidate.date);
        let schedule = self
            .store
            .schedule_for_day(doctor.id, weekday)
            .await?
            .ok_or_else(|| {
                BookingError::rejected(
                    ErrorKind::NoScheduleForDay,
                    format!("{} does not attend on {}", doctor.full_name, day_name(weekday)),
                )
            })?;

        let start_time = candidate.start_time;
        if !schedule.contains_start(start_time) {
            return Err(BookingError::rejected(
                ErrorKind::OutsideWorkingHours,
                format!(
                    "Doctor attends from {} to {} on this day",
                    schedule.start_time, schedule.end_time
                ),
            ));
        }

        if !schedule.is_aligned(start_time) {
            return Err(BookingError::rejected(
                ErrorKind::MisalignedSlot,
                format!(
                    "Appointments start every {} minutes from {}",
                    schedule.slot_duration_minutes, schedule.start_time
                ),
            ));
        }

        let blocked = self.store.blocked_periods(doctor.id, candidate.date).await?;
        if let Some(period) = blocked
            .iter()
            .find(|period| period.blocks(start_time, schedule.slot_duration_minutes))
        {
            let reason = period
                .reason
                .as_deref()
                .map(|r| format!(" ({})", r))
                .unwrap_or_default();
            return Err(BookingError::rejected(
                ErrorKind::DoctorUnavailable,
                format!(
                    "{} is unavailable at {} on {}{}",
                    doctor.full_name, start_time, candidate.date, reason
                ),
            ));
        }

        if self
            .store
            .find_slot_appointment(doctor.id, candidate.date, start_time, exclude_appointment_id)
            .await?
            .is_some()
        {
            return Err(BookingError::slot_taken(candidate.date, start_time));
        }

        if self
            .store
            .find_patient_appointment(
                candidate.patient_id,
                doctor.id,
                candidate.date,
                exclude_appointment_id,
            )
            .await?
            .is_some()
        {
            return Err(BookingError::duplicate_patient_booking(candidate.date));
        }

        let end_time = schedule.slot_end(start_time);
        Ok(ValidatedSlot {
            schedule,
            start_time,
            end_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use shared_models::{AppointmentPatch, AppointmentStatus, BlockedPeriod, NewAppointment};
    use shared_utils::test_utils::ClinicFixture;

    fn validator(clinic: &ClinicFixture) -> BookingValidator {
        let store: Arc<dyn SchedulingStore> = clinic.store.clone();
        BookingValidator::new(store)
    }

    fn candidate(clinic: &ClinicFixture, start: &str) -> BookingCandidate {
        BookingCandidate {
            patient_id: Uuid::new_v4(),
            doctor_id: clinic.doctor.id,
            specialty_id: clinic.specialty.id,
            date: ClinicFixture::monday(),
            start_time: ClinicFixture::time(start),
        }
    }

    async fn book(clinic: &ClinicFixture, candidate: &BookingCandidate) -> Uuid {
        clinic
            .store
            .insert_appointment(NewAppointment {
                patient_id: candidate.patient_id,
                doctor_id: candidate.doctor_id,
                specialty_id: candidate.specialty_id,
                appointment_date: candidate.date,
                start_time: candidate.start_time,
                end_time: candidate.start_time.add_minutes(30),
                notes: None,
            })
            .await
            .unwrap()
            .id
    }

    async fn reason(clinic: &ClinicFixture, candidate: &BookingCandidate) -> Option<ErrorKind> {
        validator(clinic)
            .validate_booking(candidate, None)
            .await
            .unwrap()
            .reason
    }

    #[tokio::test]
    async fn aligned_slot_inside_hours_is_valid() {
        let clinic = ClinicFixture::new().await;
        let result = validator(&clinic)
            .validate_booking(&candidate(&clinic, "10:30"), None)
            .await
            .unwrap();

        assert!(result.valid);
        assert_eq!(result.reason, None);
        assert_eq!(result.slot_duration_minutes, Some(30));
    }

    #[tokio::test]
    async fn misaligned_start_is_rejected() {
        let clinic = ClinicFixture::new().await;
        let result = validator(&clinic)
            .validate_booking(&candidate(&clinic, "09:15"), None)
            .await
            .unwrap();

        assert!(!result.valid);
        assert_eq!(result.reason, Some(ErrorKind::MisalignedSlot));
        assert!(result.message.contains("30 minutes"));
    }

    #[tokio::test]
    async fn window_end_is_exclusive() {
        let clinic = ClinicFixture::new().await;
        let result = validator(&clinic)
            .validate_booking(&candidate(&clinic, "11:00"), None)
            .await
            .unwrap();

        assert_eq!(result.reason, Some(ErrorKind::OutsideWorkingHours));
        assert_eq!(result.message, "Doctor attends from 09:00 to 11:00 on this day");
        assert_eq!(
            reason(&clinic, &candidate(&clinic, "08:30")).await,
            Some(ErrorKind::OutsideWorkingHours)
        );
    }

    #[tokio::test]
    async fn reference_data_checks_come_first() {
        let clinic = ClinicFixture::new().await;

        let unknown_doctor = BookingCandidate {
            doctor_id: Uuid::new_v4(),
            ..candidate(&clinic, "09:15")
        };
        assert_eq!(reason(&clinic, &unknown_doctor).await, Some(ErrorKind::DoctorNotFound));

        let unknown_specialty = BookingCandidate {
            specialty_id: Uuid::new_v4(),
            ..candidate(&clinic, "09:00")
        };
        assert_eq!(
            reason(&clinic, &unknown_specialty).await,
            Some(ErrorKind::SpecialtyNotFound)
        );

        let mismatch = BookingCandidate {
            specialty_id: clinic.other_specialty.id,
            ..candidate(&clinic, "09:00")
        };
        assert_eq!(reason(&clinic, &mismatch).await, Some(ErrorKind::SpecialtyMismatch));

        let tuesday = BookingCandidate {
            date: ClinicFixture::tuesday(),
            ..candidate(&clinic, "09:00")
        };
        assert_eq!(reason(&clinic, &tuesday).await, Some(ErrorKind::NoScheduleForDay));
    }

    #[tokio::test]
    async fn booked_slot_and_duplicate_patient_are_rejected() {
        let clinic = ClinicFixture::new().await;
        let first = candidate(&clinic, "09:00");
        let id = book(&clinic, &first).await;

        assert_eq!(
            reason(&clinic, &candidate(&clinic, "09:00")).await,
            Some(ErrorKind::SlotTaken)
        );

        let same_patient_later = BookingCandidate {
            start_time: ClinicFixture::time("10:00"),
            ..first.clone()
        };
        assert_eq!(
            reason(&clinic, &same_patient_later).await,
            Some(ErrorKind::DuplicatePatientBooking)
        );

        // Excluding the existing appointment lets it validate against itself.
        let own = validator(&clinic).validate_booking(&first, Some(id)).await.unwrap();
        assert!(own.valid);
    }

    #[tokio::test]
    async fn cancelled_booking_frees_the_slot() {
        let clinic = ClinicFixture::new().await;
        let id = book(&clinic, &candidate(&clinic, "09:00")).await;
        clinic
            .store
            .update_appointment(id, AppointmentPatch::status(AppointmentStatus::Cancelled))
            .await
            .unwrap();

        assert_eq!(reason(&clinic, &candidate(&clinic, "09:00")).await, None);
    }

    #[tokio::test]
    async fn blocked_period_makes_doctor_unavailable() {
        let clinic = ClinicFixture::new().await;
        clinic
            .store
            .add_blocked_period(BlockedPeriod::whole_day(
                clinic.doctor.id,
                ClinicFixture::monday(),
                Some("conference".into()),
            ))
            .await;

        let err = validator(&clinic)
            .check(&candidate(&clinic, "09:00"), None)
            .await
            .unwrap_err();
        assert_matches!(
            err,
            BookingError::Rejected { kind: ErrorKind::DoctorUnavailable, ref message }
                if message.contains("conference")
        );
    }
}
