pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{
    BookingCandidate, BookingError, CancelAppointmentRequest, CreateAppointmentRequest, ErrorKind,
    RescheduleAppointmentRequest, ValidationResult,
};
pub use router::{appointment_routes, AppointmentCellState};
pub use services::{
    AppointmentLifecycleService, AppointmentNotifier, BookingValidator, LoggingNotifier,
    NotificationDispatcher,
};
