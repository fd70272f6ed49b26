use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::{
    Appointment, AppointmentPatch, BlockedPeriod, Doctor, NewAppointment, Schedule, Specialty,
    TimeOfDay,
};

use crate::store::{DoctorFilter, SchedulingStore, StoreError, UniqueConstraint};

/// Reference data loaded into an [`InMemoryStore`] at startup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub specialties: Vec<Specialty>,
    #[serde(default)]
    pub doctors: Vec<Doctor>,
    #[serde(default)]
    pub schedules: Vec<Schedule>,
    #[serde(default)]
    pub blocked_periods: Vec<BlockedPeriod>,
}

impl SeedData {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Backend(format!("Failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| StoreError::Decode(format!("Invalid seed file {}: {}", path.display(), e)))
    }
}

#[derive(Default)]
struct Tables {
    specialties: HashMap<Uuid, Specialty>,
    doctors: HashMap<Uuid, Doctor>,
    schedules: Vec<Schedule>,
    blocked_periods: Vec<BlockedPeriod>,
    appointments: HashMap<Uuid, Appointment>,
}

impl Tables {
    /// Applies the appointment uniqueness rules to `candidate`, ignoring its own row.
    fn check_unique(&self, candidate: &Appointment) -> Result<(), StoreError> {
        if !candidate.status.occupies_slot() {
            return Ok(());
        }

        let others = || self.appointments.values().filter(|a| a.id != candidate.id);

        if others().any(|a| {
            a.occupies(candidate.doctor_id, candidate.appointment_date, candidate.start_time)
        }) {
            return Err(StoreError::UniqueViolation(UniqueConstraint::SlotExclusivity));
        }

        if others().any(|a| {
            a.is_patient_booking(
                candidate.patient_id,
                candidate.doctor_id,
                candidate.appointment_date,
            )
        }) {
            return Err(StoreError::UniqueViolation(UniqueConstraint::PatientDailyBooking));
        }

        Ok(())
    }
}

/// Process-local store guarded by a single lock.
///
/// Every write re-checks the uniqueness rules while holding the write lock,
/// which is what makes concurrent bookings for one slot resolve to a single
/// winner.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn from_seed(seed: SeedData) -> Result<Self, StoreError> {
        let store = Self::new();
        for specialty in seed.specialties {
            store.add_specialty(specialty).await;
        }
        for doctor in seed.doctors {
            store.add_doctor(doctor).await;
        }
        for schedule in seed.schedules {
            store.add_schedule(schedule).await?;
        }
        for period in seed.blocked_periods {
            store.add_blocked_period(period).await;
        }

        let tables = store.tables.read().await;
        info!(
            "Seeded in-memory store: {} specialties, {} doctors, {} schedules, {} blocked periods",
            tables.specialties.len(),
            tables.doctors.len(),
            tables.schedules.len(),
            tables.blocked_periods.len()
        );
        drop(tables);

        Ok(store)
    }

    pub async fn add_specialty(&self, specialty: Specialty) {
        self.tables.write().await.specialties.insert(specialty.id, specialty);
    }

    pub async fn add_doctor(&self, doctor: Doctor) {
        self.tables.write().await.doctors.insert(doctor.id, doctor);
    }

    /// Inserts or replaces a schedule, rejecting a second active schedule for the same day.
    pub async fn add_schedule(&self, schedule: Schedule) -> Result<(), StoreError> {
        schedule
            .validate()
            .map_err(|e| StoreError::Invalid(e.to_string()))?;

        let mut tables = self.tables.write().await;

        let clashes = schedule.is_active
            && tables.schedules.iter().any(|existing| {
                existing.id != schedule.id
                    && existing.is_active
                    && existing.doctor_id == schedule.doctor_id
                    && existing.day_of_week == schedule.day_of_week
            });
        if clashes {
            warn!(
                "Rejected second active schedule for doctor {} on day {}",
                schedule.doctor_id, schedule.day_of_week
            );
            return Err(StoreError::UniqueViolation(UniqueConstraint::ActiveSchedulePerDay));
        }

        tables.schedules.retain(|existing| existing.id != schedule.id);
        tables.schedules.push(schedule);
        Ok(())
    }

    pub async fn add_blocked_period(&self, period: BlockedPeriod) {
        self.tables.write().await.blocked_periods.push(period);
    }

    pub async fn appointment_count(&self) -> usize {
        self.tables.read().await.appointments.len()
    }
}

#[async_trait]
impl SchedulingStore for InMemoryStore {
    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, StoreError> {
        Ok(self.tables.read().await.doctors.get(&doctor_id).cloned())
    }

    async fn list_doctors(&self, filter: &DoctorFilter) -> Result<Vec<Doctor>, StoreError> {
        let tables = self.tables.read().await;
        let mut doctors: Vec<Doctor> = tables
            .doctors
            .values()
            .filter(|doctor| filter.matches(doctor))
            .cloned()
            .collect();
        doctors.sort_by(|a, b| a.full_name.cmp(&b.full_name).then(a.id.cmp(&b.id)));
        Ok(doctors)
    }

    async fn get_specialty(&self, specialty_id: Uuid) -> Result<Option<Specialty>, StoreError> {
        Ok(self.tables.read().await.specialties.get(&specialty_id).cloned())
    }

    async fn schedules_for_doctor(
        &self,
        doctor_id: Uuid,
        active_only: bool,
    ) -> Result<Vec<Schedule>, StoreError> {
        let tables = self.tables.read().await;
        let mut schedules: Vec<Schedule> = tables
            .schedules
            .iter()
            .filter(|s| s.doctor_id == doctor_id && (!active_only || s.is_active))
            .cloned()
            .collect();
        schedules.sort_by_key(|s| (s.day_of_week, s.start_time));
        Ok(schedules)
    }

    async fn blocked_periods(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<BlockedPeriod>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .blocked_periods
            .iter()
            .filter(|p| p.doctor_id == doctor_id && p.blocked_date == date)
            .cloned()
            .collect())
    }

    async fn find_slot_appointment(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        start_time: TimeOfDay,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<Option<Appointment>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .appointments
            .values()
            .filter(|a| Some(a.id) != exclude_appointment_id)
            .find(|a| a.occupies(doctor_id, date, start_time))
            .cloned())
    }

    async fn find_patient_appointment(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        date: NaiveDate,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<Option<Appointment>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .appointments
            .values()
            .filter(|a| Some(a.id) != exclude_appointment_id)
            .find(|a| a.is_patient_booking(patient_id, doctor_id, date))
            .cloned())
    }

    async fn appointments_for_doctor_on(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError> {
        let tables = self.tables.read().await;
        let mut appointments: Vec<Appointment> = tables
            .appointments
            .values()
            .filter(|a| {
                a.doctor_id == doctor_id && a.appointment_date == date && a.status.occupies_slot()
            })
            .cloned()
            .collect();
        appointments.sort_by_key(|a| a.start_time);
        Ok(appointments)
    }

    async fn get_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<Appointment>, StoreError> {
        Ok(self.tables.read().await.appointments.get(&appointment_id).cloned())
    }

    async fn insert_appointment(
        &self,
        appointment: NewAppointment,
    ) -> Result<Appointment, StoreError> {
        let appointment = appointment.into_appointment(Utc::now());

        let mut tables = self.tables.write().await;
        tables.check_unique(&appointment)?;
        tables.appointments.insert(appointment.id, appointment.clone());

        debug!("Inserted appointment {}", appointment.id);
        Ok(appointment)
    }

    async fn update_appointment(
        &self,
        appointment_id: Uuid,
        patch: AppointmentPatch,
    ) -> Result<Appointment, StoreError> {
        let mut tables = self.tables.write().await;

        let mut updated = tables
            .appointments
            .get(&appointment_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("appointment {}", appointment_id)))?;
        if let Some(expected) = patch.expected_status {
            if updated.status != expected {
                return Err(StoreError::StaleStatus(updated.status));
            }
        }
        patch.apply_to(&mut updated, Utc::now());

        tables.check_unique(&updated)?;
        tables.appointments.insert(appointment_id, updated.clone());

        debug!("Updated appointment {}", appointment_id);
        Ok(updated)
    }
}
