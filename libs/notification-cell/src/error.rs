use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Notification queue is full")]
    QueueFull,

    #[error("Notification queue is closed")]
    Closed,

    #[error("Email transport failed: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for NotificationError {
    fn from(error: reqwest::Error) -> Self {
        NotificationError::Transport(error.to_string())
    }
}
