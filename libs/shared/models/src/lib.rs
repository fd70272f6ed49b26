pub mod appointment;
pub mod auth;
pub mod error;
pub mod scheduling;
pub mod time;

pub use appointment::{
    Appointment, AppointmentPatch, AppointmentStatus, AppointmentSummary, NewAppointment,
};
pub use scheduling::{BlockedPeriod, Doctor, Schedule, ScheduleError, Specialty};
pub use time::{TimeOfDay, TimeParseError};
