//! Voice channel collaborators
//!
//! The monitor never talks to Discord directly. It joins channels through a
//! `VoiceGateway`, reads speaking/audio events from the returned link, and
//! plays alerts through an `AudioPlayer` created on the connection.

pub mod disconnect;
pub mod gateway;
pub mod replay;
pub mod speech;
pub mod types;

pub use disconnect::{wait_ready, DisconnectKind, ReconnectGrace, DEFAULT_RECONNECT_GRACE};
pub use gateway::{AudioPlayer, VoiceConnection, VoiceGateway, VoiceLink};
pub use replay::{LogPlayer, ReplayGateway, REPLAY_FRAME_MS};
pub use speech::{SpeechSubscription, DEFAULT_SILENCE_GAP};
pub use types::{
    ChannelId, ConnectionState, GuildId, JoinOptions, SessionKey, UserId, VoiceChannelRef,
    VoiceEvent,
};
