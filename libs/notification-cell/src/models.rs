use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Received,
    Approved,
    Rejected,
    ReviewRequest,
}

impl NotificationKind {
    pub fn subject(&self) -> &'static str {
        match self {
            NotificationKind::Received => "Appointment Request Received",
            NotificationKind::Approved => "Appointment Confirmed",
            NotificationKind::Rejected => "Appointment Request Update",
            NotificationKind::ReviewRequest => "Share Your Experience - Rate Your Visit",
        }
    }
}

/// Values an email template needs. Rendering happens behind the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationContext {
    pub patient_name: String,
    pub doctor_name: String,
    pub doctor_specialization: Option<String>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub reason: Option<String>,
    pub rejection_reason: Option<String>,
    pub review_link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub recipient_email: String,
    pub context: NotificationContext,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: NotificationKind, recipient_email: impl Into<String>, context: NotificationContext) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            recipient_email: recipient_email.into(),
            context,
            created_at: Utc::now(),
        }
    }

    pub fn subject(&self) -> &'static str {
        self.kind.subject()
    }
}

/// Body posted to the email webhook.
#[derive(Debug, Serialize)]
pub struct EmailPayload<'a> {
    pub id: Uuid,
    pub to: &'a str,
    pub subject: &'static str,
    pub template: NotificationKind,
    pub context: &'a NotificationContext,
}

impl<'a> From<&'a Notification> for EmailPayload<'a> {
    fn from(notification: &'a Notification) -> Self {
        Self {
            id: notification.id,
            to: &notification.recipient_email,
            subject: notification.subject(),
            template: notification.kind,
            context: &notification.context,
        }
    }
}
