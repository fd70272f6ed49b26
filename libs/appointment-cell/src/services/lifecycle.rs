// libs/appointment-cell/src/services/lifecycle.rs
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_database::{SchedulingStore, StoreError, UniqueConstraint};
use shared_models::{
    Appointment, AppointmentPatch, AppointmentStatus, NewAppointment, TimeOfDay,
};

use crate::models::{
    BookingCandidate, BookingError, CancelAppointmentRequest, CreateAppointmentRequest, ErrorKind,
    RescheduleAppointmentRequest,
};
use crate::services::notification::NotificationDispatcher;
use crate::services::validator::BookingValidator;

/// Creates, moves and closes appointments.
///
/// Validation runs before every write, and the store's uniqueness rules are
/// the final word: a write that loses a race is reported exactly like a
/// sequential conflict.
pub struct AppointmentLifecycleService {
    store: Arc<dyn SchedulingStore>,
    validator: BookingValidator,
    notifications: NotificationDispatcher,
}

impl AppointmentLifecycleService {
    pub fn new(store: Arc<dyn SchedulingStore>, notifications: NotificationDispatcher) -> Self {
        Self {
            validator: BookingValidator::new(store.clone()),
            store,
            notifications,
        }
    }

    pub fn validator(&self) -> &BookingValidator {
        &self.validator
    }

    #[instrument(skip(self, request), fields(doctor_id = %request.doctor_id, date = %request.appointment_date))]
    pub async fn create(&self, request: CreateAppointmentRequest) -> Result<Appointment, BookingError> {
        debug!("Creating appointment at {}", request.start_time);

        let start_time = parse_start_time(&request.start_time)?;
        let candidate = BookingCandidate {
            patient_id: request.patient_id,
            doctor_id: request.doctor_id,
            specialty_id: request.specialty_id,
            date: request.appointment_date,
            start_time,
        };

        let slot = self.validator.check(&candidate, None).await?;

        let appointment = self
            .store
            .insert_appointment(NewAppointment {
                patient_id: candidate.patient_id,
                doctor_id: candidate.doctor_id,
                specialty_id: candidate.specialty_id,
                appointment_date: candidate.date,
                start_time: slot.start_time,
                end_time: slot.end_time,
                notes: request.notes,
            })
            .await
            .map_err(|e| conflict_error(e, &candidate))?;

        info!(
            "Appointment {} booked for {} {}-{}",
            appointment.id, appointment.appointment_date, appointment.start_time, appointment.end_time
        );
        self.notifications.confirmed(&appointment);
        Ok(appointment)
    }

    #[instrument(skip(self, request))]
    pub async fn reschedule(
        &self,
        appointment_id: Uuid,
        request: RescheduleAppointmentRequest,
    ) -> Result<Appointment, BookingError> {
        let current = self.get(appointment_id).await?;
        if current.status != AppointmentStatus::Scheduled {
            return Err(BookingError::already_terminal(current.status));
        }

        let start_time = match request.start_time.as_deref() {
            Some(raw) => parse_start_time(raw)?,
            None => current.start_time,
        };
        let candidate = BookingCandidate {
            patient_id: current.patient_id,
            doctor_id: request.doctor_id.unwrap_or(current.doctor_id),
            specialty_id: request.specialty_id.unwrap_or(current.specialty_id),
            date: request.appointment_date.unwrap_or(current.appointment_date),
            start_time,
        };

        let mut patch = AppointmentPatch {
            notes: request.notes,
            ..AppointmentPatch::default()
        }
        .expecting(AppointmentStatus::Scheduled);

        let moves = candidate.doctor_id != current.doctor_id
            || candidate.specialty_id != current.specialty_id
            || candidate.date != current.appointment_date
            || candidate.start_time != current.start_time;

        if moves {
            let slot = self.validator.check(&candidate, Some(appointment_id)).await?;
            patch.doctor_id = Some(candidate.doctor_id);
            patch.specialty_id = Some(candidate.specialty_id);
            patch.appointment_date = Some(candidate.date);
            patch.start_time = Some(slot.start_time);
            patch.end_time = Some(slot.end_time);
        } else {
            debug!("Reschedule of {} keeps the same slot", appointment_id);
        }

        let updated = self
            .store
            .update_appointment(appointment_id, patch)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => BookingError::appointment_not_found(appointment_id),
                StoreError::StaleStatus(status) => BookingError::already_terminal(status),
                other => conflict_error(other, &candidate),
            })?;

        info!(
            "Appointment {} rescheduled to {} {}-{}",
            updated.id, updated.appointment_date, updated.start_time, updated.end_time
        );
        self.notifications.updated(&updated);
        Ok(updated)
    }

    #[instrument(skip(self, request))]
    pub async fn cancel(
        &self,
        appointment_id: Uuid,
        request: CancelAppointmentRequest,
    ) -> Result<Appointment, BookingError> {
        let current = self.get(appointment_id).await?;
        if !current.status.can_transition_to(AppointmentStatus::Cancelled) {
            return Err(BookingError::already_terminal(current.status));
        }

        let patch = AppointmentPatch {
            status: Some(AppointmentStatus::Cancelled),
            cancellation_reason: request.reason,
            ..AppointmentPatch::default()
        };
        let cancelled = self.write_patch(appointment_id, patch).await?;

        info!("Appointment {} cancelled", cancelled.id);
        self.notifications.cancelled(&cancelled);
        Ok(cancelled)
    }

    pub async fn complete(&self, appointment_id: Uuid) -> Result<Appointment, BookingError> {
        self.transition(appointment_id, AppointmentStatus::Completed).await
    }

    pub async fn mark_no_show(&self, appointment_id: Uuid) -> Result<Appointment, BookingError> {
        self.transition(appointment_id, AppointmentStatus::NoShow).await
    }

    pub async fn get(&self, appointment_id: Uuid) -> Result<Appointment, BookingError> {
        self.store
            .get_appointment(appointment_id)
            .await?
            .ok_or_else(|| BookingError::appointment_not_found(appointment_id))
    }

    #[instrument(skip(self))]
    async fn transition(
        &self,
        appointment_id: Uuid,
        next: AppointmentStatus,
    ) -> Result<Appointment, BookingError> {
        let current = self.get(appointment_id).await?;
        if !current.status.can_transition_to(next) {
            warn!(
                "Invalid status transition attempted: {} -> {}",
                current.status, next
            );
            return Err(BookingError::already_terminal(current.status));
        }

        let updated = self
            .write_patch(appointment_id, AppointmentPatch::status(next))
            .await?;
        info!("Appointment {} marked {}", updated.id, updated.status);
        Ok(updated)
    }

    /// Status writes only land while the row is still SCHEDULED, so two racing
    /// transitions cannot both succeed.
    async fn write_patch(
        &self,
        appointment_id: Uuid,
        patch: AppointmentPatch,
    ) -> Result<Appointment, BookingError> {
        self.store
            .update_appointment(appointment_id, patch.expecting(AppointmentStatus::Scheduled))
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => BookingError::appointment_not_found(appointment_id),
                StoreError::StaleStatus(status) => BookingError::already_terminal(status),
                other => BookingError::Store(other),
            })
    }
}

fn parse_start_time(raw: &str) -> Result<TimeOfDay, BookingError> {
    TimeOfDay::parse(raw).map_err(|e| BookingError::rejected(ErrorKind::InvalidTimeFormat, e.to_string()))
}

/// Maps a write-time uniqueness violation to the same rejection the validator gives.
fn conflict_error(err: StoreError, candidate: &BookingCandidate) -> BookingError {
    match err {
        StoreError::UniqueViolation(UniqueConstraint::SlotExclusivity) => {
            warn!(
                "Lost booking race for doctor {} on {} at {}",
                candidate.doctor_id, candidate.date, candidate.start_time
            );
            BookingError::slot_taken(candidate.date, candidate.start_time)
        }
        StoreError::UniqueViolation(UniqueConstraint::PatientDailyBooking) => {
            BookingError::duplicate_patient_booking(candidate.date)
        }
        other => BookingError::Store(other),
    }
}
