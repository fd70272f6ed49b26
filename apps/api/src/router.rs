use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::{appointment_routes, AppointmentCellState, NotificationDispatcher};
use doctor_cell::{doctor_routes, DoctorCellState};
use shared_config::AppConfig;
use shared_database::SchedulingStore;

pub fn create_router(
    config: Arc<AppConfig>,
    store: Arc<dyn SchedulingStore>,
    notifications: NotificationDispatcher,
) -> Router {
    Router::new()
        .route("/", get(|| async { "MediSlot API is running!" }))
        .nest("/doctors", doctor_routes(DoctorCellState::new(store.clone())))
        .nest(
            "/appointments",
            appointment_routes(AppointmentCellState::new(config, store, notifications)),
        )
}
