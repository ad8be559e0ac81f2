use serde::{Deserialize, Serialize};
use std::fmt;

use crate::audio::AudioFrame;

macro_rules! snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }
    };
}

snowflake!(
    /// Discord guild (server) ID
    GuildId
);
snowflake!(
    /// Discord user ID
    UserId
);
snowflake!(
    /// Discord channel ID (voice or text)
    ChannelId
);

/// The voice channel a user currently occupies, as resolved by the command layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceChannelRef {
    /// Voice channel the user is in
    pub channel_id: ChannelId,
    /// Text channel that warnings are posted to
    pub text_channel_id: ChannelId,
    /// Whether the bot may connect to the voice channel
    pub can_connect: bool,
    /// Whether the bot may speak in the voice channel
    pub can_speak: bool,
}

/// How the bot presents itself when joining
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinOptions {
    pub self_mute: bool,
    pub self_deaf: bool,
}

impl Default for JoinOptions {
    fn default() -> Self {
        // Deafened bots receive no audio
        Self {
            self_mute: true,
            self_deaf: false,
        }
    }
}

/// Voice connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Signalling,
    Connecting,
    Ready,
    Disconnected,
    Destroyed,
}

impl ConnectionState {
    /// States a dropped connection passes through when it is coming back
    pub fn is_reconnecting(self) -> bool {
        matches!(self, Self::Signalling | Self::Connecting)
    }
}

/// Events delivered by a voice connection
#[derive(Debug, Clone)]
pub enum VoiceEvent {
    /// A user started speaking after silence
    Speaking { user_id: UserId },
    /// A decoded audio frame from a user
    Audio { user_id: UserId, frame: AudioFrame },
}

/// Identity of a monitoring session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub guild_id: GuildId,
    pub user_id: UserId,
}

impl SessionKey {
    pub fn new(guild_id: impl Into<GuildId>, user_id: impl Into<UserId>) -> Self {
        Self {
            guild_id: guild_id.into(),
            user_id: user_id.into(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.guild_id, self.user_id)
    }
}
