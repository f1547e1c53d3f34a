use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};

use crate::error::NotificationError;
use crate::models::{Notification, NotificationContext, NotificationKind};
use crate::services::{EmailTransport, Notifier};

/// Notifier that keeps every notification in memory, or refuses them all.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `notify` call fails as if the queue were full.
    pub fn failing() -> Self {
        Self { sent: Mutex::new(Vec::new()), failing: true }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn kinds(&self) -> Vec<NotificationKind> {
        self.sent().iter().map(|n| n.kind).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        if self.failing {
            return Err(NotificationError::QueueFull);
        }
        self.sent.lock().unwrap_or_else(|p| p.into_inner()).push(notification);
        Ok(())
    }
}

/// Transport that records deliveries and can be told to fail for one recipient.
#[derive(Default)]
pub struct RecordingTransport {
    delivered: Mutex<Vec<Notification>>,
    fail_for: Option<String>,
}

impl RecordingTransport {
    pub fn failing_for(recipient: &str) -> Self {
        Self { delivered: Mutex::new(Vec::new()), fail_for: Some(recipient.to_string()) }
    }

    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl EmailTransport for RecordingTransport {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        if self.fail_for.as_deref() == Some(notification.recipient_email.as_str()) {
            return Err(NotificationError::Transport("recipient rejected".to_string()));
        }
        self.delivered.lock().unwrap_or_else(|p| p.into_inner()).push(notification.clone());
        Ok(())
    }
}

pub fn sample_notification(kind: NotificationKind, recipient: &str) -> Notification {
    Notification::new(
        kind,
        recipient,
        NotificationContext {
            patient_name: "Jane Roe".to_string(),
            doctor_name: "Ada Smith".to_string(),
            doctor_specialization: Some("Cardiology".to_string()),
            date: NaiveDate::from_ymd_opt(2030, 1, 11).unwrap_or_default(),
            time: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            reason: Some("Checkup".to_string()),
            rejection_reason: None,
            review_link: None,
        },
    )
}
