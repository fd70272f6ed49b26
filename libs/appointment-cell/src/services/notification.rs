// libs/appointment-cell/src/services/notification.rs
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::{Appointment, AppointmentSummary};

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Outbound patient notifications. Delivery is best-effort.
#[async_trait]
pub trait AppointmentNotifier: Send + Sync {
    async fn notify_confirmed(
        &self,
        patient_id: Uuid,
        summary: &AppointmentSummary,
    ) -> Result<(), NotificationError>;

    async fn notify_cancelled(
        &self,
        patient_id: Uuid,
        summary: &AppointmentSummary,
        reason: Option<&str>,
    ) -> Result<(), NotificationError>;

    async fn notify_updated(
        &self,
        patient_id: Uuid,
        summary: &AppointmentSummary,
    ) -> Result<(), NotificationError>;
}

/// Writes notifications to the log instead of sending them anywhere.
#[derive(Debug, Default, Clone)]
pub struct LoggingNotifier;

#[async_trait]
impl AppointmentNotifier for LoggingNotifier {
    async fn notify_confirmed(
        &self,
        patient_id: Uuid,
        summary: &AppointmentSummary,
    ) -> Result<(), NotificationError> {
        info!(
            "Appointment {} confirmed for patient {}: {} {}-{}",
            summary.appointment_id,
            patient_id,
            summary.appointment_date,
            summary.start_time,
            summary.end_time
        );
        Ok(())
    }

    async fn notify_cancelled(
        &self,
        patient_id: Uuid,
        summary: &AppointmentSummary,
        reason: Option<&str>,
    ) -> Result<(), NotificationError> {
        info!(
            "Appointment {} cancelled for patient {} (reason: {})",
            summary.appointment_id,
            patient_id,
            reason.unwrap_or("none given")
        );
        Ok(())
    }

    async fn notify_updated(
        &self,
        patient_id: Uuid,
        summary: &AppointmentSummary,
    ) -> Result<(), NotificationError> {
        info!(
            "Appointment {} moved for patient {}: {} {}-{}",
            summary.appointment_id,
            patient_id,
            summary.appointment_date,
            summary.start_time,
            summary.end_time
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    Confirmed {
        patient_id: Uuid,
        summary: AppointmentSummary,
    },
    Cancelled {
        patient_id: Uuid,
        summary: AppointmentSummary,
        reason: Option<String>,
    },
    Updated {
        patient_id: Uuid,
        summary: AppointmentSummary,
    },
}

impl NotificationEvent {
    fn label(&self) -> &'static str {
        match self {
            NotificationEvent::Confirmed { .. } => "confirmed",
            NotificationEvent::Cancelled { .. } => "cancelled",
            NotificationEvent::Updated { .. } => "updated",
        }
    }

    async fn deliver(&self, notifier: &dyn AppointmentNotifier) -> Result<(), NotificationError> {
        match self {
            NotificationEvent::Confirmed { patient_id, summary } => {
                notifier.notify_confirmed(*patient_id, summary).await
            }
            NotificationEvent::Cancelled {
                patient_id,
                summary,
                reason,
            } => {
                notifier
                    .notify_cancelled(*patient_id, summary, reason.as_deref())
                    .await
            }
            NotificationEvent::Updated { patient_id, summary } => {
                notifier.notify_updated(*patient_id, summary).await
            }
        }
    }
}

/// Queues notification intents on a bounded channel drained by a background task.
///
/// Enqueueing never waits: a full or closed queue drops the intent with a warning.
#[derive(Clone)]
pub struct NotificationDispatcher {
    sender: mpsc::Sender<NotificationEvent>,
}

impl NotificationDispatcher {
    /// Starts the delivery worker on the current tokio runtime.
    pub fn spawn(notifier: Arc<dyn AppointmentNotifier>, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        tokio::spawn(run_worker(notifier, receiver));
        Self { sender }
    }

    pub fn confirmed(&self, appointment: &Appointment) {
        self.enqueue(NotificationEvent::Confirmed {
            patient_id: appointment.patient_id,
            summary: appointment.summary(),
        });
    }

    pub fn cancelled(&self, appointment: &Appointment) {
        self.enqueue(NotificationEvent::Cancelled {
            patient_id: appointment.patient_id,
            summary: appointment.summary(),
            reason: appointment.cancellation_reason.clone(),
        });
    }

    pub fn updated(&self, appointment: &Appointment) {
        self.enqueue(NotificationEvent::Updated {
            patient_id: appointment.patient_id,
            summary: appointment.summary(),
        });
    }

    fn enqueue(&self, event: NotificationEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(
                    "Notification queue full, dropping {} notification for appointment {}",
                    event.label(),
                    summary_of(&event).appointment_id
                );
            }
            Err(TrySendError::Closed(event)) => {
                warn!(
                    "Notification worker stopped, dropping {} notification for appointment {}",
                    event.label(),
                    summary_of(&event).appointment_id
                );
            }
        }
    }
}

fn summary_of(event: &NotificationEvent) -> &AppointmentSummary {
    match event {
        NotificationEvent::Confirmed { summary, .. }
        | NotificationEvent::Cancelled { summary, .. }
        | NotificationEvent::Updated { summary, .. } => summary,
    }
}

async fn run_worker(
    notifier: Arc<dyn AppointmentNotifier>,
    mut receiver: mpsc::Receiver<NotificationEvent>,
) {
    debug!("Notification worker started");
    while let Some(event) = receiver.recv().await {
        if let Err(e) = event.deliver(notifier.as_ref()).await {
            warn!(
                "Failed to deliver {} notification for appointment {}: {}",
                event.label(),
                summary_of(&event).appointment_id,
                e
            );
        }
    }
    debug!("Notification worker stopped");
}
