use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClockError {
    #[error("failed to spawn tick thread: {0}")]
    TickSpawn(#[from] std::io::Error),

    #[error("alarm time must not be empty")]
    EmptyAlarmTime,

    #[error("invalid alarm time '{0}', expected HH:MM")]
    InvalidAlarmTime(String),

    #[error("tone output unavailable: {0}")]
    ToneUnavailable(String),

    #[error("notification failed: {0}")]
    Notification(String),

    #[error("unknown time zone id '{0}'")]
    UnknownZone(String),
}

pub type ClockResult<T> = std::result::Result<T, ClockError>;
