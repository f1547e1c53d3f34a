use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::NotificationError;
use crate::models::Notification;
use crate::services::transport::EmailTransport;

/// Fire-and-forget notification sink. `notify` never waits on delivery.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification) -> Result<(), NotificationError>;
}

/// Bounded in-process queue drained by a single delivery task.
#[derive(Clone)]
pub struct QueuedNotifier {
    sender: mpsc::Sender<Notification>,
}

impl QueuedNotifier {
    /// Starts the delivery worker. The worker exits once every
    /// `QueuedNotifier` clone is dropped and the queue is drained, so awaiting
    /// the handle after shutdown flushes pending emails.
    pub fn spawn(transport: Arc<dyn EmailTransport>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(deliver(receiver, transport));
        (Self { sender }, handle)
    }
}

impl Notifier for QueuedNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        debug!("Queueing {:?} notification {}", notification.kind, notification.id);

        self.sender.try_send(notification).map_err(|e| match e {
            TrySendError::Full(dropped) => {
                warn!("Notification queue full, dropping {:?} email to {}", dropped.kind, dropped.recipient_email);
                NotificationError::QueueFull
            }
            TrySendError::Closed(_) => NotificationError::Closed,
        })
    }
}

async fn deliver(mut receiver: mpsc::Receiver<Notification>, transport: Arc<dyn EmailTransport>) {
    info!("Notification worker started");

    while let Some(notification) = receiver.recv().await {
        match transport.send(&notification).await {
            Ok(()) => debug!("Delivered {:?} notification {}", notification.kind, notification.id),
            Err(e) => warn!(
                "Failed to deliver {:?} notification {} to {}: {}",
                notification.kind, notification.id, notification.recipient_email, e
            ),
        }
    }

    info!("Notification worker stopped");
}
