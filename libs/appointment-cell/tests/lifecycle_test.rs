// libs/appointment-cell/tests/lifecycle_test.rs

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use appointment_cell::models::{
    BookingError, CancelAppointmentRequest, CreateAppointmentRequest, ErrorKind,
    RescheduleAppointmentRequest,
};
use appointment_cell::services::{
    AppointmentLifecycleService, AppointmentNotifier, NotificationDispatcher, NotificationError,
};
use shared_database::SchedulingStore;
use shared_models::{AppointmentStatus, AppointmentSummary};
use shared_utils::test_utils::ClinicFixture;

/// Records every notification; can be told to fail each delivery.
struct RecordingNotifier {
    events: UnboundedSender<String>,
    fail: bool,
}

impl RecordingNotifier {
    fn result(&self, label: String) -> Result<(), NotificationError> {
        self.events.send(label).ok();
        if self.fail {
            Err(NotificationError::Delivery("mail relay refused".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AppointmentNotifier for RecordingNotifier {
    async fn notify_confirmed(
        &self,
        _patient_id: Uuid,
        summary: &AppointmentSummary,
    ) -> Result<(), NotificationError> {
        self.result(format!("confirmed {}", summary.start_time))
    }

    async fn notify_cancelled(
        &self,
        _patient_id: Uuid,
        summary: &AppointmentSummary,
        reason: Option<&str>,
    ) -> Result<(), NotificationError> {
        self.result(format!("cancelled {} {}", summary.start_time, reason.unwrap_or("-")))
    }

    async fn notify_updated(
        &self,
        _patient_id: Uuid,
        summary: &AppointmentSummary,
    ) -> Result<(), NotificationError> {
        self.result(format!("updated {}", summary.start_time))
    }
}

struct Harness {
    clinic: ClinicFixture,
    service: Arc<AppointmentLifecycleService>,
    events: UnboundedReceiver<String>,
}

impl Harness {
    async fn new() -> Self {
        Self::with_failing_notifier(false).await
    }

    async fn with_failing_notifier(fail: bool) -> Self {
        let clinic = ClinicFixture::new().await;
        let (tx, events) = unbounded_channel();
        let dispatcher =
            NotificationDispatcher::spawn(Arc::new(RecordingNotifier { events: tx, fail }), 16);
        let store: Arc<dyn SchedulingStore> = clinic.store.clone();
        let service = Arc::new(AppointmentLifecycleService::new(store, dispatcher));
        Self {
            clinic,
            service,
            events,
        }
    }

    fn request(&self, patient_id: Uuid, start: &str) -> CreateAppointmentRequest {
        CreateAppointmentRequest {
            patient_id,
            doctor_id: self.clinic.doctor.id,
            specialty_id: self.clinic.specialty.id,
            appointment_date: ClinicFixture::monday(),
            start_time: start.to_string(),
            notes: None,
        }
    }

    async fn next_event(&mut self) -> String {
        tokio::time::timeout(Duration::from_secs(1), self.events.recv())
            .await
            .expect("notification within a second")
            .expect("notifier alive")
    }
}

fn kind(result: Result<impl std::fmt::Debug, BookingError>) -> ErrorKind {
    result.unwrap_err().kind().expect("rejection, not a store error")
}

#[tokio::test]
async fn create_books_slot_and_notifies() {
    let mut h = Harness::new().await;

    let apt = h.service.create(h.request(Uuid::new_v4(), "9:30")).await.unwrap();

    assert_eq!(apt.status, AppointmentStatus::Scheduled);
    assert_eq!(apt.start_time.to_string(), "09:30");
    assert_eq!(apt.end_time.to_string(), "10:00");
    assert_eq!(h.next_event().await, "confirmed 09:30");
}

#[tokio::test]
async fn malformed_time_is_rejected_before_validation() {
    let h = Harness::new().await;
    assert_eq!(
        kind(h.service.create(h.request(Uuid::new_v4(), "9.30")).await),
        ErrorKind::InvalidTimeFormat
    );
    assert_eq!(
        kind(h.service.create(h.request(Uuid::new_v4(), "25:00")).await),
        ErrorKind::InvalidTimeFormat
    );
}

#[tokio::test]
async fn misaligned_start_is_rejected() {
    let h = Harness::new().await;
    assert_eq!(
        kind(h.service.create(h.request(Uuid::new_v4(), "09:15")).await),
        ErrorKind::MisalignedSlot
    );
    assert_eq!(h.clinic.store.appointment_count().await, 0);
}

#[tokio::test]
async fn slot_is_exclusive_until_cancelled() {
    let h = Harness::new().await;
    let first = h.service.create(h.request(Uuid::new_v4(), "10:00")).await.unwrap();

    assert_eq!(
        kind(h.service.create(h.request(Uuid::new_v4(), "10:00")).await),
        ErrorKind::SlotTaken
    );

    h.service
        .cancel(first.id, CancelAppointmentRequest { reason: Some("travel".into()) })
        .await
        .unwrap();

    let rebooked = h.service.create(h.request(Uuid::new_v4(), "10:00")).await.unwrap();
    assert_ne!(rebooked.id, first.id);
}

#[tokio::test]
async fn patient_books_one_slot_per_doctor_per_day() {
    let h = Harness::new().await;
    let patient = Uuid::new_v4();
    h.service.create(h.request(patient, "09:00")).await.unwrap();

    assert_eq!(
        kind(h.service.create(h.request(patient, "10:00")).await),
        ErrorKind::DuplicatePatientBooking
    );

    let other = h.clinic.add_doctor("Dr. Alan Turing", "09:00", "12:00", 30).await;
    let with_other_doctor = CreateAppointmentRequest {
        doctor_id: other.id,
        ..h.request(patient, "10:00")
    };
    h.service.create(with_other_doctor).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_for_one_slot_have_one_winner() {
    let h = Harness::new().await;

    let attempts = (0..8).map(|_| {
        let service = h.service.clone();
        let request = h.request(Uuid::new_v4(), "10:30");
        tokio::spawn(async move { service.create(request).await })
    });
    let results = futures::future::join_all(attempts).await;

    let (wins, losses): (Vec<_>, Vec<_>) = results
        .into_iter()
        .map(|joined| joined.expect("task completed"))
        .partition(|result| result.is_ok());

    assert_eq!(wins.len(), 1);
    assert_eq!(losses.len(), 7);
    for loss in losses {
        assert_eq!(kind(loss), ErrorKind::SlotTaken);
    }
    assert_eq!(h.clinic.store.appointment_count().await, 1);
}

#[tokio::test]
async fn late_slot_ends_at_midnight() {
    let h = Harness::new().await;
    let owl = h.clinic.add_doctor("Dr. Night Owl", "23:00", "23:59", 30).await;

    let apt = h
        .service
        .create(CreateAppointmentRequest {
            doctor_id: owl.id,
            ..h.request(Uuid::new_v4(), "23:30")
        })
        .await
        .unwrap();

    assert_eq!(apt.end_time.to_string(), "00:00");
    assert_eq!(apt.appointment_date, ClinicFixture::monday());
}

#[tokio::test]
async fn reschedule_onto_own_slot_is_allowed() {
    let mut h = Harness::new().await;
    let apt = h.service.create(h.request(Uuid::new_v4(), "09:00")).await.unwrap();
    h.next_event().await;

    let same = h
        .service
        .reschedule(
            apt.id,
            RescheduleAppointmentRequest {
                start_time: Some("09:00".into()),
                notes: Some("bring results".into()),
                ..RescheduleAppointmentRequest::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(same.start_time, apt.start_time);
    assert_eq!(same.notes.as_deref(), Some("bring results"));
    assert_eq!(h.next_event().await, "updated 09:00");

    let moved = h
        .service
        .reschedule(
            apt.id,
            RescheduleAppointmentRequest {
                start_time: Some("10:30".into()),
                ..RescheduleAppointmentRequest::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(moved.start_time.to_string(), "10:30");
    assert_eq!(moved.end_time.to_string(), "11:00");

    // The old slot is free again.
    h.service.create(h.request(Uuid::new_v4(), "09:00")).await.unwrap();
}

#[tokio::test]
async fn reschedule_revalidates_the_target() {
    let h = Harness::new().await;
    let mine = h.service.create(h.request(Uuid::new_v4(), "09:00")).await.unwrap();
    h.service.create(h.request(Uuid::new_v4(), "09:30")).await.unwrap();

    let onto_taken = RescheduleAppointmentRequest {
        start_time: Some("09:30".into()),
        ..RescheduleAppointmentRequest::default()
    };
    assert_eq!(kind(h.service.reschedule(mine.id, onto_taken).await), ErrorKind::SlotTaken);

    let to_tuesday = RescheduleAppointmentRequest {
        appointment_date: Some(ClinicFixture::tuesday()),
        ..RescheduleAppointmentRequest::default()
    };
    assert_eq!(
        kind(h.service.reschedule(mine.id, to_tuesday).await),
        ErrorKind::NoScheduleForDay
    );

    assert_eq!(
        kind(h.service.reschedule(Uuid::new_v4(), RescheduleAppointmentRequest::default()).await),
        ErrorKind::AppointmentNotFound
    );
}

#[tokio::test]
async fn terminal_appointments_cannot_change() {
    let h = Harness::new().await;
    let apt = h.service.create(h.request(Uuid::new_v4(), "09:00")).await.unwrap();

    let done = h.service.complete(apt.id).await.unwrap();
    assert_eq!(done.status, AppointmentStatus::Completed);

    let err = h.service.cancel(apt.id, CancelAppointmentRequest::default()).await.unwrap_err();
    assert_matches!(
        err,
        BookingError::Rejected { kind: ErrorKind::AlreadyTerminal, ref message }
            if message == "Appointment is already completed"
    );
    assert_eq!(kind(h.service.mark_no_show(apt.id).await), ErrorKind::AlreadyTerminal);
    assert_eq!(
        kind(h.service.reschedule(apt.id, RescheduleAppointmentRequest::default()).await),
        ErrorKind::AlreadyTerminal
    );
}

#[tokio::test]
async fn cancelling_twice_reports_already_cancelled() {
    let mut h = Harness::new().await;
    let apt = h.service.create(h.request(Uuid::new_v4(), "09:00")).await.unwrap();
    h.next_event().await;

    let cancelled = h
        .service
        .cancel(apt.id, CancelAppointmentRequest { reason: Some("flu".into()) })
        .await
        .unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("flu"));
    assert_eq!(h.next_event().await, "cancelled 09:00 flu");

    let err = h.service.cancel(apt.id, CancelAppointmentRequest::default()).await.unwrap_err();
    assert!(err.to_string().contains("already cancelled"));
}

#[tokio::test]
async fn no_show_is_a_terminal_transition() {
    let h = Harness::new().await;
    let apt = h.service.create(h.request(Uuid::new_v4(), "10:00")).await.unwrap();

    let marked = h.service.mark_no_show(apt.id).await.unwrap();
    assert_eq!(marked.status, AppointmentStatus::NoShow);
    assert_eq!(
        kind(h.service.create(h.request(Uuid::new_v4(), "10:00")).await),
        ErrorKind::SlotTaken
    );
}

#[tokio::test]
async fn failing_notifier_does_not_fail_the_booking() {
    let mut h = Harness::with_failing_notifier(true).await;

    let apt = h.service.create(h.request(Uuid::new_v4(), "09:00")).await.unwrap();
    assert_eq!(h.next_event().await, "confirmed 09:00");

    h.service.cancel(apt.id, CancelAppointmentRequest::default()).await.unwrap();
    assert_eq!(h.next_event().await, "cancelled 09:00 -");
    assert_eq!(
        h.service.get(apt.id).await.unwrap().status,
        AppointmentStatus::Cancelled
    );
}
