//! Customer notification on job stage changes.
//!
//! Delivery is fire-and-forget: a failed notification is logged and never
//! fails the stage transition that triggered it.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::models::JobStage;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Send error: {0}")]
    SendFailed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageNotification {
    pub phone: String,
    pub customer_name: String,
    pub stage: JobStage,
    pub vehicle_name: String,
    pub plate: String,
    /// Set once the job's invoices exist; only meaningful for Completed.
    pub invoice_ready: bool,
}

impl StageNotification {
    pub fn message(&self) -> String {
        let vehicle = format!("{} ({})", self.vehicle_name, self.plate);
        match self.stage {
            JobStage::NewLead => format!(
                "Hi {}, thank you for choosing us. We have registered your {} and will be in touch shortly.",
                self.customer_name, vehicle
            ),
            JobStage::InspectionDone => format!(
                "Hi {}, inspection of your {} is complete. We will share the work estimate soon.",
                self.customer_name, vehicle
            ),
            JobStage::WorkInProgress => format!(
                "Hi {}, work on your {} has started.",
                self.customer_name, vehicle
            ),
            JobStage::Completed if self.invoice_ready => format!(
                "Hi {}, your {} is ready for pickup. Your invoice has been generated.",
                self.customer_name, vehicle
            ),
            JobStage::Completed => format!(
                "Hi {}, your {} is ready for pickup.",
                self.customer_name, vehicle
            ),
            JobStage::Cancelled => format!(
                "Hi {}, the service request for your {} has been cancelled.",
                self.customer_name, vehicle
            ),
        }
    }
}

#[async_trait]
pub trait StageNotifier: Send + Sync {
    async fn notify(&self, notification: &StageNotification) -> Result<(), NotifyError>;
}

/// Writes the rendered message to the log instead of sending it.
pub struct LoggingNotifier;

#[async_trait]
impl StageNotifier for LoggingNotifier {
    async fn notify(&self, notification: &StageNotification) -> Result<(), NotifyError> {
        let phone: String = notification
            .phone
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '+')
            .collect();
        if phone.is_empty() {
            return Err(NotifyError::InvalidRecipient(
                "Phone number is empty".to_string(),
            ));
        }

        tracing::info!(
            phone = %phone,
            stage = %notification.stage,
            message = %notification.message(),
            "Stage notification"
        );
        Ok(())
    }
}

/// Keeps every notification in memory.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<StageNotification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<StageNotification> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl StageNotifier for RecordingNotifier {
    async fn notify(&self, notification: &StageNotification) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .map_err(|e| NotifyError::SendFailed(e.to_string()))?
            .push(notification.clone());
        Ok(())
    }
}

/// Send in the background; failures are only logged.
pub fn dispatch(notifier: Arc<dyn StageNotifier>, notification: StageNotification) {
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(&notification).await {
            tracing::warn!(
                error = %e,
                stage = %notification.stage,
                "Failed to send stage notification"
            );
        }
    });
}
