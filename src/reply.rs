//! Text shown to Discord users for each command outcome
//!
//! Errors are ephemeral (only the caller sees them); successful starts, stops
//! and calibration results are posted to the channel.

use serde::{Deserialize, Serialize};

use crate::error::MonitorError;
use crate::monitor::{CalibrationOutcome, SessionSnapshot, StopSummary};
use crate::voice::{ChannelId, UserId};

/// A reply for the command layer to post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub content: String,
    pub ephemeral: bool,
}

impl Reply {
    fn public(content: String) -> Self {
        Self {
            content,
            ephemeral: false,
        }
    }

    fn private(content: String) -> Self {
        Self {
            content,
            ephemeral: true,
        }
    }
}

pub fn mention_user(user_id: UserId) -> String {
    format!("<@{}>", user_id)
}

pub fn mention_channel(channel_id: ChannelId) -> String {
    format!("<#{}>", channel_id)
}

/// Message posted to the text channel when a warning fires
pub fn warning_message(user_id: UserId, loudness: f64, threshold: u8) -> String {
    format!(
        "🔊 {} you're too loud! Volume: {}% (threshold: {}%)",
        mention_user(user_id),
        loudness.round() as u32,
        threshold
    )
}

fn format_elapsed(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    let (minutes, seconds) = (total / 60, total % 60);
    if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

pub fn started(snapshot: &SessionSnapshot) -> Reply {
    Reply::public(format!(
        "🎙️ Now monitoring {} in {}. Threshold: {}%, cooldown: {}s. Warnings go to {}.",
        mention_user(snapshot.user_id),
        mention_channel(snapshot.voice_channel_id),
        snapshot.threshold,
        snapshot.cooldown_secs,
        mention_channel(snapshot.text_channel_id),
    ))
}

pub fn stopped(summary: &StopSummary) -> Reply {
    Reply::public(format!(
        "✅ Stopped monitoring {}. Warnings: {}, monitored for {}.",
        mention_user(summary.user_id),
        summary.warning_count,
        format_elapsed(summary.elapsed_secs),
    ))
}

pub fn status(snapshot: &SessionSnapshot) -> Reply {
    let last = match snapshot.last_warning_at {
        Some(at) => format!("<t:{}:R>", at.timestamp()),
        None => "never".to_string(),
    };

    Reply::private(format!(
        "📊 Monitoring {} in {} for {}.\nThreshold: {}%\nCooldown: {}s\nWarnings: {}\nLast warning: {}",
        mention_user(snapshot.user_id),
        mention_channel(snapshot.voice_channel_id),
        format_elapsed(snapshot.elapsed_secs),
        snapshot.threshold,
        snapshot.cooldown_secs,
        snapshot.warning_count,
        last,
    ))
}

pub fn calibration(user_id: UserId, outcome: &CalibrationOutcome) -> Reply {
    match outcome {
        CalibrationOutcome::Summary(s) => Reply::public(format!(
            "🎚️ Calibration for {} ({} readings over {}s)\nAverage: {:.1}%\nPeak: {:.1}%\nMinimum: {:.1}%\nSuggested thresholds: sensitive {}%, normal {}%, relaxed {}%",
            mention_user(user_id),
            s.readings,
            s.duration_secs,
            s.average,
            s.peak,
            s.min,
            s.sensitive,
            s.normal,
            s.relaxed,
        )),
        CalibrationOutcome::NoAudioDetected { duration_secs } => Reply::private(format!(
            "🤫 No audio detected from {} in {}s. Speak normally during calibration and try again.",
            mention_user(user_id),
            duration_secs,
        )),
    }
}

pub fn error(err: &MonitorError) -> Reply {
    let content = match err {
        MonitorError::AlreadyMonitoring(_) => {
            "⚠️ That user is already being monitored. Stop the current session first.".to_string()
        }
        MonitorError::NoActiveSession(_) => "⚠️ No active monitoring session for that user.".to_string(),
        MonitorError::MissingVoicePresence => "⚠️ The user must be in a voice channel.".to_string(),
        MonitorError::InsufficientPermission(what) => {
            format!("⚠️ I need the {} permission in that voice channel.", what)
        }
        MonitorError::InvalidThreshold(_) => "⚠️ Threshold must be between 1 and 100.".to_string(),
        MonitorError::ConnectionTimeout(_) => {
            "❌ Could not connect to the voice channel in time.".to_string()
        }
        MonitorError::SessionCancelled(_) => "⚠️ Monitoring was stopped while connecting.".to_string(),
        MonitorError::JoinFailed(_) => "❌ Could not join the voice channel.".to_string(),
    };
    Reply::private(content)
}

/// The command arguments could not be understood
pub fn invalid_request(detail: &str) -> Reply {
    Reply::private(format!(
        "⚠️ Invalid command options: {}. Threshold must be 1-100 and durations whole seconds.",
        detail
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::CalibrationSummary;
    use crate::voice::{GuildId, SessionKey};

    #[test]
    fn test_warning_message_rounds_loudness() {
        let msg = warning_message(UserId(9), 84.6, 70);
        assert!(msg.contains("<@9>"));
        assert!(msg.contains("85%"));
        assert!(msg.contains("threshold: 70%"));
    }

    #[test]
    fn test_errors_are_ephemeral() {
        let reply = error(&MonitorError::AlreadyMonitoring(SessionKey::new(1u64, 9u64)));
        assert!(reply.ephemeral);

        let reply = error(&MonitorError::InsufficientPermission("Speak"));
        assert!(reply.content.contains("Speak"));
    }

    #[test]
    fn test_stop_reply() {
        let reply = stopped(&StopSummary {
            guild_id: GuildId(1),
            user_id: UserId(9),
            warning_count: 2,
            elapsed_secs: 192.4,
        });
        assert!(!reply.ephemeral);
        assert!(reply.content.contains("Warnings: 2"));
        assert!(reply.content.contains("3m 12s"));
    }

    #[test]
    fn test_calibration_replies() {
        let summary = CalibrationOutcome::Summary(CalibrationSummary {
            average: 30.0,
            peak: 50.0,
            min: 10.0,
            sensitive: 33,
            normal: 39,
            relaxed: 45,
            readings: 5,
            duration_secs: 10,
        });
        let reply = calibration(UserId(9), &summary);
        assert!(reply.content.contains("sensitive 33%"));
        assert!(reply.content.contains("normal 39%"));
        assert!(reply.content.contains("relaxed 45%"));

        let silent = calibration(UserId(9), &CalibrationOutcome::NoAudioDetected { duration_secs: 10 });
        assert!(silent.ephemeral);
        assert!(silent.content.contains("No audio detected"));
    }
}
