//! Outbound messages: warnings to a text channel and calibration progress

use anyhow::Result;
use tracing::{info, warn};

use crate::monitor::CalibrationProgress;
use crate::voice::{ChannelId, UserId};

/// Sends text messages to a channel
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send_message(
        &self,
        channel_id: ChannelId,
        mention: Option<UserId>,
        content: &str,
    ) -> Result<()>;
}

/// Receives periodic calibration readouts
///
/// Failures are tolerated by the caller; a sink that cannot update its
/// message should simply return the error.
#[async_trait::async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, progress: &CalibrationProgress) -> Result<()>;
}

/// Writes messages to the log instead of Discord
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send_message(
        &self,
        channel_id: ChannelId,
        mention: Option<UserId>,
        content: &str,
    ) -> Result<()> {
        match mention {
            Some(user_id) => warn!("[#{}] @{}: {}", channel_id, user_id, content),
            None => warn!("[#{}] {}", channel_id, content),
        }
        Ok(())
    }
}

/// Writes calibration progress to the log
#[derive(Debug, Default)]
pub struct LogProgress;

#[async_trait::async_trait]
impl ProgressSink for LogProgress {
    async fn report(&self, progress: &CalibrationProgress) -> Result<()> {
        info!(
            "Calibrating {}/{}: {}s/{}s, current {:.1}%, average {:.1}%, peak {:.1}%",
            progress.guild_id,
            progress.user_id,
            progress.elapsed_secs,
            progress.duration_secs,
            progress.current.unwrap_or(0.0),
            progress.average.unwrap_or(0.0),
            progress.peak.unwrap_or(0.0),
        );
        Ok(())
    }
}
