use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use futures::future::try_join_all;
use tracing::{debug, instrument};
use uuid::Uuid;

use shared_database::{DoctorFilter, SchedulingStore, StoreError};
use shared_models::{BlockedPeriod, Doctor, TimeOfDay};

use crate::models::{AvailabilityFilters, AvailableSlot, DoctorDayResponse, TimeSlot};
use crate::services::slots::doctor_slots;

/// Read-only view of which slots are free.
///
/// Results reflect the store at call time; two reads over unchanged state
/// return identical output.
pub struct AvailabilityResolver {
    store: Arc<dyn SchedulingStore>,
}

impl AvailabilityResolver {
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self { store }
    }

    /// Free slots across all matching active doctors, ordered by doctor name,
    /// doctor id, then start time.
    #[instrument(skip(self))]
    pub async fn resolve_availability(
        &self,
        filters: AvailabilityFilters,
    ) -> Result<Vec<AvailableSlot>, StoreError> {
        let date = filters.date.unwrap_or_else(today);

        let doctor_filter = DoctorFilter {
            specialty_id: filters.specialty_id,
            doctor_id: filters.doctor_id,
            active_only: true,
        };
        let doctors = self.store.list_doctors(&doctor_filter).await?;
        debug!("Resolving availability for {} doctors on {}", doctors.len(), date);

        let per_doctor = try_join_all(
            doctors
                .iter()
                .map(|doctor| self.free_slots_for(doctor, date)),
        )
        .await?;

        let mut slots: Vec<AvailableSlot> = per_doctor.into_iter().flatten().collect();
        slots.sort_by(|a, b| {
            a.doctor_name
                .cmp(&b.doctor_name)
                .then(a.doctor_id.cmp(&b.doctor_id))
                .then(a.start_time.cmp(&b.start_time))
        });

        debug!("Found {} available slots on {}", slots.len(), date);
        Ok(slots)
    }

    /// Every generated slot of one doctor's day, with booked and blocked
    /// slots flagged instead of removed. `None` when the doctor is unknown or inactive.
    #[instrument(skip(self))]
    pub async fn doctor_day(
        &self,
        doctor_id: Uuid,
        date: Option<NaiveDate>,
    ) -> Result<Option<DoctorDayResponse>, StoreError> {
        let date = date.unwrap_or_else(today);

        let doctor = self.store.get_doctor(doctor_id).await?;
        let Some(doctor) = doctor.filter(|doctor| doctor.is_active) else {
            return Ok(None);
        };

        let Some((schedule, slots)) = doctor_slots(self.store.as_ref(), doctor_id, date).await?
        else {
            return Ok(Some(DoctorDayResponse {
                doctor_id,
                doctor_name: doctor.full_name,
                date,
                slot_duration_minutes: None,
                slots: Vec::new(),
            }));
        };

        let (booked, blocked) = self.occupancy(doctor_id, date).await?;
        let slots = slots
            .into_iter()
            .map(|mut slot| {
                slot.appointment_id = booked.get(&slot.start_time).copied();
                slot.available = slot.appointment_id.is_none()
                    && !is_blocked(&blocked, &slot, schedule.slot_duration_minutes);
                slot
            })
            .collect();

        Ok(Some(DoctorDayResponse {
            doctor_id,
            doctor_name: doctor.full_name,
            date,
            slot_duration_minutes: Some(schedule.slot_duration_minutes),
            slots,
        }))
    }

    async fn free_slots_for(
        &self,
        doctor: &Doctor,
        date: NaiveDate,
    ) -> Result<Vec<AvailableSlot>, StoreError> {
        let Some((schedule, slots)) = doctor_slots(self.store.as_ref(), doctor.id, date).await?
        else {
            return Ok(Vec::new());
        };

        let (booked, blocked) = self.occupancy(doctor.id, date).await?;

        Ok(slots
            .into_iter()
            .filter(|slot| !booked.contains_key(&slot.start_time))
            .filter(|slot| !is_blocked(&blocked, slot, schedule.slot_duration_minutes))
            .map(|slot| AvailableSlot::from_slot(slot, &doctor.full_name, doctor.specialty_id))
            .collect())
    }

    /// Booked start times (non-cancelled) and blocked periods for the day.
    async fn occupancy(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<(HashMap<TimeOfDay, Uuid>, Vec<BlockedPeriod>), StoreError> {
        let appointments = self.store.appointments_for_doctor_on(doctor_id, date).await?;
        let booked = appointments
            .into_iter()
            .filter(|a| a.status.occupies_slot())
            .map(|a| (a.start_time, a.id))
            .collect();
        let blocked = self.store.blocked_periods(doctor_id, date).await?;
        Ok((booked, blocked))
    }
}

fn is_blocked(blocked: &[BlockedPeriod], slot: &TimeSlot, duration_minutes: u16) -> bool {
    blocked
        .iter()
        .any(|period| period.blocks(slot.start_time, duration_minutes))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}
