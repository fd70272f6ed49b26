// libs/appointment-cell/src/handlers.rs
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::{Appointment, TimeOfDay};

use crate::models::{
    BookingCandidate, BookingError, CancelAppointmentRequest, CreateAppointmentRequest, ErrorKind,
    RescheduleAppointmentRequest, ValidateAppointmentRequest, ValidationResult,
};
use crate::router::AppointmentCellState;

/// Patients act only on their own appointments; doctors and admins on any.
fn ensure_can_act_for(user: &User, patient_id: Uuid) -> Result<(), BookingError> {
    if user.is_staff() || user.is_same_person(&patient_id) {
        Ok(())
    } else {
        Err(BookingError::rejected(
            ErrorKind::Unauthorized,
            "Not authorized to act on this patient's appointments",
        ))
    }
}

fn ensure_staff(user: &User) -> Result<(), BookingError> {
    if user.is_staff() {
        Ok(())
    } else {
        Err(BookingError::rejected(
            ErrorKind::Unauthorized,
            "Only doctors and admins can close appointments",
        ))
    }
}

async fn load_owned(
    state: &AppointmentCellState,
    user: &User,
    appointment_id: Uuid,
) -> Result<Appointment, BookingError> {
    let appointment = state.lifecycle.get(appointment_id).await?;
    ensure_can_act_for(user, appointment.patient_id)?;
    Ok(appointment)
}

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<AppointmentCellState>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    ensure_can_act_for(&user, request.patient_id)?;

    let appointment = state.lifecycle.create(request).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

#[axum::debug_handler]
pub async fn validate_appointment(
    State(state): State<AppointmentCellState>,
    Extension(user): Extension<User>,
    Json(request): Json<ValidateAppointmentRequest>,
) -> Result<Json<ValidationResult>, AppError> {
    ensure_can_act_for(&user, request.patient_id)?;

    let start_time = match TimeOfDay::parse(&request.start_time) {
        Ok(start_time) => start_time,
        Err(e) => {
            return Ok(Json(ValidationResult::rejected(
                ErrorKind::InvalidTimeFormat,
                e.to_string(),
            )))
        }
    };

    let candidate = BookingCandidate {
        patient_id: request.patient_id,
        doctor_id: request.doctor_id,
        specialty_id: request.specialty_id,
        date: request.appointment_date,
        start_time,
    };
    debug!("Dry-run validation for doctor {}", candidate.doctor_id);

    let result = state
        .lifecycle
        .validator()
        .validate_booking(&candidate, request.exclude_appointment_id)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(Json(result))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppointmentCellState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(load_owned(&state, &user, appointment_id).await?))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<AppointmentCellState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    load_owned(&state, &user, appointment_id).await?;

    let appointment = state.lifecycle.reschedule(appointment_id, request).await?;
    Ok(Json(appointment))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<AppointmentCellState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    load_owned(&state, &user, appointment_id).await?;

    let appointment = state.lifecycle.cancel(appointment_id, request).await?;
    Ok(Json(appointment))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<AppointmentCellState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Appointment>, AppError> {
    ensure_staff(&user)?;
    Ok(Json(state.lifecycle.complete(appointment_id).await?))
}

#[axum::debug_handler]
pub async fn mark_no_show(
    State(state): State<AppointmentCellState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Appointment>, AppError> {
    ensure_staff(&user)?;
    Ok(Json(state.lifecycle.mark_no_show(appointment_id).await?))
}
