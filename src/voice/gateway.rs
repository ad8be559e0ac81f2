use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use super::types::{ChannelId, ConnectionState, GuildId, JoinOptions, VoiceEvent};

/// Everything a caller receives from a successful join
pub struct VoiceLink {
    /// Handle used to play audio and to tear the connection down
    pub connection: Arc<dyn VoiceConnection>,
    /// Speaking and audio events, in arrival order
    pub events: mpsc::Receiver<VoiceEvent>,
    /// Current connection state
    pub state: watch::Receiver<ConnectionState>,
}

/// Voice gateway trait
///
/// Implementations:
/// - NATS: talks to a Discord gateway sidecar (see `crate::nats`)
/// - Replay: plays a WAV file as a single speaker (offline runs and tests)
#[async_trait::async_trait]
pub trait VoiceGateway: Send + Sync {
    /// Join a voice channel
    ///
    /// Returns as soon as the join has been issued; readiness is observed
    /// through `VoiceLink::state`.
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        options: JoinOptions,
    ) -> Result<VoiceLink>;

    /// Get gateway name for logging
    fn name(&self) -> &str;
}

/// A live voice channel connection
#[async_trait::async_trait]
pub trait VoiceConnection: Send + Sync {
    /// Create a player that sends PCM into the channel
    async fn create_player(&self) -> Result<Box<dyn AudioPlayer>>;

    /// Leave the channel and release the connection
    async fn destroy(&self) -> Result<()>;
}

/// Plays raw PCM on a voice connection
#[async_trait::async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Whether something is still playing
    fn is_busy(&self) -> bool;

    /// Start playing interleaved 48kHz stereo PCM
    async fn play(&self, pcm: Arc<[i16]>) -> Result<()>;

    /// Stop playback and release the player
    async fn stop(&self) -> Result<()>;
}
