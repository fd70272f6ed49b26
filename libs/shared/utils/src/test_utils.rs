use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, NaiveDate, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::{AppConfig, StoreBackend};
use shared_database::InMemoryStore;
use shared_models::auth::User;
use shared_models::{Doctor, Schedule, Specialty, TimeOfDay};

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_supabase_url(url: impl Into<String>) -> Self {
        Self {
            supabase_url: url.into(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            store_backend: StoreBackend::Memory,
            notification_queue_capacity: 16,
            ..AppConfig::default()
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn uuid(&self) -> Uuid {
        Uuid::parse_str(&self.id).unwrap_or_default()
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn bearer(user: &TestUser, config: &TestConfig) -> String {
        format!("Bearer {}", Self::create_test_token(user, &config.jwt_secret, None))
    }
}

/// A clinic with one cardiologist who works Mondays 09:00-11:00 in 30 minute slots.
pub struct ClinicFixture {
    pub store: Arc<InMemoryStore>,
    pub specialty: Specialty,
    pub other_specialty: Specialty,
    pub doctor: Doctor,
    pub schedule: Schedule,
}

impl ClinicFixture {
    /// 2025-12-01 is a Monday.
    pub fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, 1).expect("valid date")
    }

    pub fn tuesday() -> NaiveDate {
        Self::monday() + Duration::days(1)
    }

    pub fn time(value: &str) -> TimeOfDay {
        TimeOfDay::parse(value).expect("valid time")
    }

    pub async fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());

        let specialty = Specialty {
            id: Uuid::new_v4(),
            name: "Cardiology".to_string(),
        };
        let other_specialty = Specialty {
            id: Uuid::new_v4(),
            name: "Dermatology".to_string(),
        };
        let doctor = Doctor {
            id: Uuid::new_v4(),
            full_name: "Dr. Grace Hopper".to_string(),
            specialty_id: specialty.id,
            is_active: true,
        };
        let schedule = Schedule::new(doctor.id, 1, Self::time("09:00"), Self::time("11:00"), 30)
            .expect("valid schedule");

        store.add_specialty(specialty.clone()).await;
        store.add_specialty(other_specialty.clone()).await;
        store.add_doctor(doctor.clone()).await;
        store
            .add_schedule(schedule.clone())
            .await
            .expect("schedule accepted");

        Self {
            store,
            specialty,
            other_specialty,
            doctor,
            schedule,
        }
    }

    /// Adds another active doctor with a Monday schedule and returns it.
    pub async fn add_doctor(&self, full_name: &str, start: &str, end: &str, slot_minutes: u16) -> Doctor {
        let doctor = Doctor {
            id: Uuid::new_v4(),
            full_name: full_name.to_string(),
            specialty_id: self.specialty.id,
            is_active: true,
        };
        self.store.add_doctor(doctor.clone()).await;
        let schedule = Schedule::new(doctor.id, 1, Self::time(start), Self::time(end), slot_minutes)
            .expect("valid schedule");
        self.store
            .add_schedule(schedule)
            .await
            .expect("schedule accepted");
        doctor
    }
}

/// PostgREST row shapes for wiremock-backed tests.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn doctor_row(doctor_id: Uuid, specialty_id: Uuid, full_name: &str) -> serde_json::Value {
        json!({
            "id": doctor_id,
            "full_name": full_name,
            "specialty_id": specialty_id,
            "is_active": true
        })
    }

    pub fn schedule_row(doctor_id: Uuid, day_of_week: u8, start: &str, end: &str) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "doctor_id": doctor_id,
            "day_of_week": day_of_week,
            "start_time": format!("{}:00", start),
            "end_time": format!("{}:00", end),
            "slot_duration_minutes": 30,
            "is_active": true
        })
    }

    pub fn appointment_row(
        appointment_id: Uuid,
        patient_id: Uuid,
        doctor_id: Uuid,
        specialty_id: Uuid,
        date: &str,
        start: &str,
        end: &str,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": appointment_id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "specialty_id": specialty_id,
            "appointment_date": date,
            "start_time": format!("{}:00", start),
            "end_time": format!("{}:00", end),
            "status": status,
            "notes": null,
            "cancellation_reason": null,
            "created_at": "2025-11-20T08:00:00Z",
            "updated_at": "2025-11-20T08:00:00Z"
        })
    }

    pub fn unique_violation(index_name: &str) -> serde_json::Value {
        json!({
            "code": "23505",
            "details": null,
            "hint": null,
            "message": format!("duplicate key value violates unique constraint \"{}\"", index_name)
        })
    }
}
