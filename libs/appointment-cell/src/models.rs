// libs/appointment-cell/src/models.rs
use std::fmt;

use axum::http::StatusCode;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::error::AppError;
use shared_models::{AppointmentStatus, Schedule, TimeOfDay};

// ==============================================================================
// ERROR TYPES
// ==============================================================================

/// Why a booking, reschedule or status change was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidTimeFormat,
    DoctorNotFound,
    SpecialtyNotFound,
    SpecialtyMismatch,
    NoScheduleForDay,
    OutsideWorkingHours,
    MisalignedSlot,
    DoctorUnavailable,
    SlotTaken,
    DuplicatePatientBooking,
    AppointmentNotFound,
    AlreadyTerminal,
    Unauthorized,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidTimeFormat => "INVALID_TIME_FORMAT",
            ErrorKind::DoctorNotFound => "DOCTOR_NOT_FOUND",
            ErrorKind::SpecialtyNotFound => "SPECIALTY_NOT_FOUND",
            ErrorKind::SpecialtyMismatch => "SPECIALTY_MISMATCH",
            ErrorKind::NoScheduleForDay => "NO_SCHEDULE_FOR_DAY",
            ErrorKind::OutsideWorkingHours => "OUTSIDE_WORKING_HOURS",
            ErrorKind::MisalignedSlot => "MISALIGNED_SLOT",
            ErrorKind::DoctorUnavailable => "DOCTOR_UNAVAILABLE",
            ErrorKind::SlotTaken => "SLOT_TAKEN",
            ErrorKind::DuplicatePatientBooking => "DUPLICATE_PATIENT_BOOKING",
            ErrorKind::AppointmentNotFound => "APPOINTMENT_NOT_FOUND",
            ErrorKind::AlreadyTerminal => "ALREADY_TERMINAL",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::SlotTaken | ErrorKind::DuplicatePatientBooking => StatusCode::CONFLICT,
            ErrorKind::DoctorNotFound
            | ErrorKind::SpecialtyNotFound
            | ErrorKind::AppointmentNotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
            ErrorKind::InvalidTimeFormat
            | ErrorKind::SpecialtyMismatch
            | ErrorKind::NoScheduleForDay
            | ErrorKind::OutsideWorkingHours
            | ErrorKind::MisalignedSlot
            | ErrorKind::DoctorUnavailable
            | ErrorKind::AlreadyTerminal => StatusCode::BAD_REQUEST,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("{kind}: {message}")]
    Rejected { kind: ErrorKind, message: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl BookingError {
    pub fn rejected(kind: ErrorKind, message: impl Into<String>) -> Self {
        BookingError::Rejected {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            BookingError::Rejected { kind, .. } => Some(*kind),
            BookingError::Store(_) => None,
        }
    }

    pub fn slot_taken(date: NaiveDate, start_time: TimeOfDay) -> Self {
        Self::rejected(
            ErrorKind::SlotTaken,
            format!("The {} slot on {} is already booked", start_time, date),
        )
    }

    pub fn duplicate_patient_booking(date: NaiveDate) -> Self {
        Self::rejected(
            ErrorKind::DuplicatePatientBooking,
            format!("Patient already has an appointment with this doctor on {}", date),
        )
    }

    pub fn appointment_not_found(appointment_id: Uuid) -> Self {
        Self::rejected(
            ErrorKind::AppointmentNotFound,
            format!("Appointment {} not found", appointment_id),
        )
    }

    /// Guard message for an appointment that has left SCHEDULED.
    pub fn already_terminal(status: AppointmentStatus) -> Self {
        let message = match status {
            AppointmentStatus::Cancelled => "Appointment is already cancelled",
            AppointmentStatus::Completed => "Appointment is already completed",
            AppointmentStatus::NoShow => "Appointment was marked as no-show",
            AppointmentStatus::Scheduled => "Appointment is still scheduled",
        };
        Self::rejected(ErrorKind::AlreadyTerminal, message)
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::Rejected { kind, message } => AppError::Rejected {
                status: kind.status(),
                kind: kind.as_str(),
                message,
            },
            BookingError::Store(e) => AppError::Database(e.to_string()),
        }
    }
}

// ==============================================================================
// VALIDATION MODELS
// ==============================================================================

/// A requested (patient, doctor, specialty, date, start) to check.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingCandidate {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub specialty_id: Uuid,
    pub date: NaiveDate,
    pub start_time: TimeOfDay,
}

/// A candidate that passed every check, with the schedule it fits into.
#[derive(Debug, Clone)]
pub struct ValidatedSlot {
    pub schedule: Schedule,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ErrorKind>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot_duration_minutes: Option<u16>,
}

impl ValidationResult {
    pub fn accepted(slot: &ValidatedSlot) -> Self {
        Self {
            valid: true,
            reason: None,
            message: format!(
                "Slot {}-{} is available",
                slot.start_time, slot.end_time
            ),
            slot_duration_minutes: Some(slot.schedule.slot_duration_minutes),
        }
    }

    pub fn rejected(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(kind),
            message: message.into(),
            slot_duration_minutes: None,
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub specialty_id: Uuid,
    pub appointment_date: NaiveDate,
    /// "HH:MM"; parsed by the lifecycle so a bad value maps to `InvalidTimeFormat`.
    pub start_time: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateAppointmentRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub specialty_id: Uuid,
    pub appointment_date: NaiveDate,
    pub start_time: String,
    pub exclude_appointment_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub appointment_date: Option<NaiveDate>,
    pub start_time: Option<String>,
    pub doctor_id: Option<Uuid>,
    pub specialty_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_http_statuses() {
        assert_eq!(ErrorKind::SlotTaken.status(), StatusCode::CONFLICT);
        assert_eq!(ErrorKind::DuplicatePatientBooking.status(), StatusCode::CONFLICT);
        assert_eq!(ErrorKind::AppointmentNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorKind::MisalignedSlot.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorKind::Unauthorized.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn kind_serializes_like_as_str() {
        for kind in [ErrorKind::NoScheduleForDay, ErrorKind::DoctorUnavailable, ErrorKind::SlotTaken] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn booking_error_becomes_rejected_app_error() {
        let date = NaiveDate::from_ymd_opt(2025, 12, 1).unwrap();
        let err: AppError = BookingError::slot_taken(date, TimeOfDay::new(10, 0).unwrap()).into();

        assert_eq!(err.status(), StatusCode::CONFLICT);
        match err {
            AppError::Rejected { kind, message, .. } => {
                assert_eq!(kind, "SLOT_TAKEN");
                assert_eq!(message, "The 10:00 slot on 2025-12-01 is already booked");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn terminal_guard_messages() {
        let err = BookingError::already_terminal(AppointmentStatus::NoShow);
        assert_eq!(err.kind(), Some(ErrorKind::AlreadyTerminal));
        assert!(err.to_string().contains("no-show"));
    }
}
