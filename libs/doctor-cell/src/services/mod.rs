pub mod availability;
pub mod slots;

pub use availability::AvailabilityResolver;
pub use slots::{doctor_slots, generate_slots, SlotIter};
