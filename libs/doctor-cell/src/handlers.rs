use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Local;
use tracing::debug;
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::error::AppError;

use crate::models::{
    AvailabilityFilters, AvailabilityResponse, DaySlotsQuery, DoctorDayResponse,
};
use crate::router::DoctorCellState;

fn store_error(err: StoreError) -> AppError {
    AppError::Database(err.to_string())
}

#[axum::debug_handler]
pub async fn get_availability(
    State(state): State<DoctorCellState>,
    Query(mut filters): Query<AvailabilityFilters>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let date = *filters.date.get_or_insert_with(|| Local::now().date_naive());
    debug!("Availability requested for {}", date);

    let available_slots = state
        .resolver
        .resolve_availability(filters)
        .await
        .map_err(store_error)?;

    Ok(Json(AvailabilityResponse {
        date,
        total: available_slots.len(),
        available_slots,
    }))
}

#[axum::debug_handler]
pub async fn get_doctor_slots(
    State(state): State<DoctorCellState>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<DaySlotsQuery>,
) -> Result<Json<DoctorDayResponse>, AppError> {
    state
        .resolver
        .doctor_day(doctor_id, query.date)
        .await
        .map_err(store_error)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Doctor {} not found", doctor_id)))
}
