pub mod memory;
pub mod postgrest;
pub mod store;
pub mod supabase;

pub use memory::{InMemoryStore, SeedData};
pub use postgrest::SupabaseStore;
pub use store::{DoctorFilter, SchedulingStore, StoreError, UniqueConstraint};
