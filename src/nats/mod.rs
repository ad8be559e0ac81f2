//! NATS bridge to the Discord gateway sidecar
//!
//! The sidecar owns the Discord gateway and voice UDP sockets. It reports
//! connection state, speaking events and decoded PCM frames per guild, and
//! accepts join/leave/play/text requests.

pub mod bridge;
pub mod client;
pub mod messages;

pub use bridge::{GuildHandles, NatsNotifier, NatsProgress, NatsVoiceGateway};
pub use client::NatsClient;
pub use messages::{
    ConnectionStateMessage, JoinRequest, LeaveRequest, PlayRequest, SpeakingMessage, TextMessage,
    VoiceFrameMessage,
};
