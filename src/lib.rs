pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod monitor;
pub mod nats;
pub mod notify;
pub mod reply;
pub mod voice;

pub use audio::{AlertTone, AudioFile, AudioFrame, LoudnessMeter};
pub use config::Config;
pub use error::MonitorError;
pub use http::{create_router, AppState};
pub use monitor::{
    CalibrationOutcome, CalibrationSummary, MonitorConfig, MonitorOptions, SessionSnapshot,
    StopSummary, VolumeSessionManager,
};
pub use nats::{NatsClient, NatsNotifier, NatsProgress, NatsVoiceGateway};
pub use notify::{LogNotifier, LogProgress, Notifier, ProgressSink};
pub use voice::{
    ChannelId, GuildId, ReplayGateway, SessionKey, UserId, VoiceChannelRef, VoiceGateway,
};
