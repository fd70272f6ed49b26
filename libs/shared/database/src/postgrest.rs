// SchedulingStore over the Supabase REST (PostgREST) API.
//
// Slot exclusivity and the patient/doctor/day rule are enforced by the partial
// unique indexes in sql/scheduling_constraints.sql; a violating insert or update
// comes back as 409 / 23505 and is mapped to StoreError::UniqueViolation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_models::{
    Appointment, AppointmentPatch, AppointmentStatus, BlockedPeriod, Doctor, NewAppointment,
    Schedule, Specialty, TimeOfDay,
};

use crate::store::{DoctorFilter, SchedulingStore, StoreError, UniqueConstraint};
use crate::supabase::{SupabaseApiError, SupabaseClient};

pub struct SupabaseStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, StoreError> {
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, path, None, None)
            .await
            .map_err(classify_error)?;
        decode_rows(rows)
    }

    async fn fetch_one<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, StoreError> {
        Ok(self.fetch(path).await?.into_iter().next())
    }

    async fn write(
        &self,
        method: Method,
        path: &str,
        body: Value,
    ) -> Result<Vec<Appointment>, StoreError> {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(method, path, None, Some(body), Some(headers))
            .await
            .map_err(classify_error)?;
        decode_rows(rows)
    }
}

fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, StoreError> {
    rows.into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| StoreError::Decode(e.to_string()))
}

fn classify_error(err: anyhow::Error) -> StoreError {
    match err.downcast_ref::<SupabaseApiError>() {
        Some(api) if api.is_unique_violation() => {
            match UniqueConstraint::from_error_message(&api.message) {
                Some(constraint) => StoreError::UniqueViolation(constraint),
                None => {
                    warn!("Unique violation on unknown constraint: {}", api.message);
                    StoreError::Backend(api.to_string())
                }
            }
        }
        Some(api) if api.status == 404 => StoreError::NotFound(api.message.clone()),
        _ => StoreError::Backend(err.to_string()),
    }
}

fn exclude_clause(exclude_appointment_id: Option<Uuid>) -> String {
    exclude_appointment_id
        .map(|id| format!("&id=neq.{}", id))
        .unwrap_or_default()
}

#[async_trait]
impl SchedulingStore for SupabaseStore {
    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, StoreError> {
        self.fetch_one(&format!("/rest/v1/doctors?id=eq.{}", doctor_id)).await
    }

    async fn list_doctors(&self, filter: &DoctorFilter) -> Result<Vec<Doctor>, StoreError> {
        let mut query_parts = Vec::new();
        if filter.active_only {
            query_parts.push("is_active=eq.true".to_string());
        }
        if let Some(specialty_id) = filter.specialty_id {
            query_parts.push(format!("specialty_id=eq.{}", specialty_id));
        }
        if let Some(doctor_id) = filter.doctor_id {
            query_parts.push(format!("id=eq.{}", doctor_id));
        }
        query_parts.push("order=full_name.asc,id.asc".to_string());

        self.fetch(&format!("/rest/v1/doctors?{}", query_parts.join("&"))).await
    }

    async fn get_specialty(&self, specialty_id: Uuid) -> Result<Option<Specialty>, StoreError> {
        self.fetch_one(&format!("/rest/v1/specialties?id=eq.{}", specialty_id)).await
    }

    async fn schedules_for_doctor(
        &self,
        doctor_id: Uuid,
        active_only: bool,
    ) -> Result<Vec<Schedule>, StoreError> {
        let active = if active_only { "&is_active=eq.true" } else { "" };
        self.fetch(&format!(
            "/rest/v1/doctor_schedules?doctor_id=eq.{}{}&order=day_of_week.asc,start_time.asc",
            doctor_id, active
        ))
        .await
    }

    async fn schedule_for_day(
        &self,
        doctor_id: Uuid,
        day_of_week: u8,
    ) -> Result<Option<Schedule>, StoreError> {
        self.fetch_one(&format!(
            "/rest/v1/doctor_schedules?doctor_id=eq.{}&day_of_week=eq.{}&is_active=eq.true&limit=1",
            doctor_id, day_of_week
        ))
        .await
    }

    async fn blocked_periods(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<BlockedPeriod>, StoreError> {
        self.fetch(&format!(
            "/rest/v1/doctor_blocked_periods?doctor_id=eq.{}&blocked_date=eq.{}",
            doctor_id, date
        ))
        .await
    }

    async fn find_slot_appointment(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        start_time: TimeOfDay,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<Option<Appointment>, StoreError> {
        self.fetch_one(&format!(
            "/rest/v1/appointments?doctor_id=eq.{}&appointment_date=eq.{}&start_time=eq.{}&status=neq.{}{}&limit=1",
            doctor_id,
            date,
            start_time,
            AppointmentStatus::Cancelled,
            exclude_clause(exclude_appointment_id)
        ))
        .await
    }

    async fn find_patient_appointment(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        date: NaiveDate,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<Option<Appointment>, StoreError> {
        self.fetch_one(&format!(
            "/rest/v1/appointments?patient_id=eq.{}&doctor_id=eq.{}&appointment_date=eq.{}&status=neq.{}{}&limit=1",
            patient_id,
            doctor_id,
            date,
            AppointmentStatus::Cancelled,
            exclude_clause(exclude_appointment_id)
        ))
        .await
    }

    async fn appointments_for_doctor_on(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.fetch(&format!(
            "/rest/v1/appointments?doctor_id=eq.{}&appointment_date=eq.{}&status=neq.{}&order=start_time.asc",
            doctor_id,
            date,
            AppointmentStatus::Cancelled
        ))
        .await
    }

    async fn get_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<Appointment>, StoreError> {
        self.fetch_one(&format!("/rest/v1/appointments?id=eq.{}", appointment_id)).await
    }

    async fn insert_appointment(
        &self,
        appointment: NewAppointment,
    ) -> Result<Appointment, StoreError> {
        debug!(
            "Inserting appointment for doctor {} on {} at {}",
            appointment.doctor_id, appointment.appointment_date, appointment.start_time
        );

        let now = Utc::now().to_rfc3339();
        let mut body = serde_json::to_value(&appointment)
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        if let Value::Object(map) = &mut body {
            map.insert("id".to_string(), json!(Uuid::new_v4()));
            map.insert("status".to_string(), json!(AppointmentStatus::Scheduled));
            map.insert("created_at".to_string(), json!(now));
            map.insert("updated_at".to_string(), json!(now));
        }

        self.write(Method::POST, "/rest/v1/appointments", body)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Backend("Insert returned no rows".to_string()))
    }

    async fn update_appointment(
        &self,
        appointment_id: Uuid,
        patch: AppointmentPatch,
    ) -> Result<Appointment, StoreError> {
        let mut body = serde_json::to_value(&patch)
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        if let Value::Object(map) = &mut body {
            map.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));
        }

        let mut path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        if let Some(expected) = patch.expected_status {
            path.push_str(&format!("&status=eq.{}", expected));
        }

        if let Some(updated) = self.write(Method::PATCH, &path, body).await?.into_iter().next() {
            return Ok(updated);
        }

        let not_found = || StoreError::NotFound(format!("appointment {}", appointment_id));
        if patch.expected_status.is_none() {
            return Err(not_found());
        }

        // No row matched: either it is gone or its status moved on
        match self.get_appointment(appointment_id).await? {
            Some(current) => {
                debug!("Appointment {} is {}, patch skipped", appointment_id, current.status);
                Err(StoreError::StaleStatus(current.status))
            }
            None => Err(not_found()),
        }
    }
}
