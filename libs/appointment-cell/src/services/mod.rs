pub mod lifecycle;
pub mod notification;
pub mod validator;

pub use lifecycle::AppointmentLifecycleService;
pub use notification::{
    AppointmentNotifier, LoggingNotifier, NotificationDispatcher, NotificationError,
    NotificationEvent,
};
pub use validator::BookingValidator;
