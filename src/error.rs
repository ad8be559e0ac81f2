use std::time::Duration;
use thiserror::Error;

use crate::voice::SessionKey;

/// Failures reported back to the command layer
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("already monitoring {0}")]
    AlreadyMonitoring(SessionKey),

    #[error("no active session for {0}")]
    NoActiveSession(SessionKey),

    #[error("user is not in a voice channel")]
    MissingVoicePresence,

    #[error("missing voice permission: {0}")]
    InsufficientPermission(&'static str),

    #[error("threshold must be between 1 and 100, got {0}")]
    InvalidThreshold(u8),

    #[error("voice connection was not ready after {0:?}")]
    ConnectionTimeout(Duration),

    #[error("session for {0} was stopped while connecting")]
    SessionCancelled(SessionKey),

    #[error("failed to join voice channel")]
    JoinFailed(#[source] anyhow::Error),
}

impl MonitorError {
    /// Errors caused by the caller's request rather than the runtime
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, Self::ConnectionTimeout(_) | Self::JoinFailed(_))
    }
}
