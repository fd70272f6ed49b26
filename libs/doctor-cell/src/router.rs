use std::sync::Arc;

use axum::{routing::get, Router};

use shared_database::SchedulingStore;

use crate::handlers;
use crate::services::AvailabilityResolver;

#[derive(Clone)]
pub struct DoctorCellState {
    pub resolver: Arc<AvailabilityResolver>,
}

impl DoctorCellState {
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self {
            resolver: Arc::new(AvailabilityResolver::new(store)),
        }
    }
}

pub fn doctor_routes(state: DoctorCellState) -> Router {
    // Availability is public; booking lives in the appointment cell.
    Router::new()
        .route("/availability", get(handlers::get_availability))
        .route("/{doctor_id}/slots", get(handlers::get_doctor_slots))
        .with_state(state)
}
