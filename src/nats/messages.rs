use serde::{Deserialize, Serialize};

use crate::voice::{ChannelId, ConnectionState, GuildId, UserId};

/// Ask the gateway sidecar to join a voice channel
#[derive(Debug, Serialize, Deserialize)]
pub struct JoinRequest {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub self_mute: bool,
    pub self_deaf: bool,
}

/// Ask the gateway sidecar to leave the guild's voice channel
#[derive(Debug, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub guild_id: GuildId,
}

/// Voice connection state change reported by the sidecar
#[derive(Debug, Serialize, Deserialize)]
pub struct ConnectionStateMessage {
    pub guild_id: GuildId,
    pub state: ConnectionState,
}

/// A user started speaking
#[derive(Debug, Serialize, Deserialize)]
pub struct SpeakingMessage {
    pub guild_id: GuildId,
    pub user_id: UserId,
}

/// Decoded voice audio for one user
#[derive(Debug, Serialize, Deserialize)]
pub struct VoiceFrameMessage {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub sequence: u32,
    pub pcm: String,  // Base64-encoded PCM bytes (i16 little-endian, interleaved)
    pub sample_rate: u32,
    pub channels: u16,
    pub timestamp_ms: u64,
}

/// PCM for the sidecar to encode and play on the voice connection
#[derive(Debug, Serialize, Deserialize)]
pub struct PlayRequest {
    pub guild_id: GuildId,
    pub pcm: String,  // Base64-encoded PCM bytes
    pub sample_rate: u32,
    pub channels: u16,
}

/// A text message for the sidecar to post
#[derive(Debug, Serialize, Deserialize)]
pub struct TextMessage {
    pub channel_id: ChannelId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mention: Option<UserId>,
    pub content: String,
}
