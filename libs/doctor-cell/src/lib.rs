pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{AvailabilityFilters, AvailableSlot, TimeSlot};
pub use router::{doctor_routes, DoctorCellState};
pub use services::{doctor_slots, generate_slots, AvailabilityResolver};
