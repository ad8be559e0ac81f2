// WAV replay gateway
//
// Plays a recording into the pipeline as if a single user were speaking in a
// voice channel. Frames are paced in real time. Alerts are not rendered
// anywhere, they are counted and logged.

use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use super::gateway::{AudioPlayer, VoiceConnection, VoiceGateway, VoiceLink};
use super::types::{ChannelId, ConnectionState, GuildId, JoinOptions, UserId, VoiceEvent};
use crate::audio::{AudioFile, AudioFrame};

/// Discord sends 20ms opus packets
pub const REPLAY_FRAME_MS: u64 = 20;

pub struct ReplayGateway {
    speaker: UserId,
    frames: Arc<Vec<AudioFrame>>,
    alerts_played: Arc<AtomicUsize>,
}

impl ReplayGateway {
    pub fn new(file: &AudioFile, speaker: UserId) -> Self {
        Self::from_frames(file.frames(REPLAY_FRAME_MS), speaker)
    }

    pub fn from_frames(frames: Vec<AudioFrame>, speaker: UserId) -> Self {
        Self {
            speaker,
            frames: Arc::new(frames),
            alerts_played: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Total playback length of the recording
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.frames.iter().map(|f| f.duration_ms()).sum())
    }

    /// Number of alerts played across all connections
    pub fn alerts_played(&self) -> usize {
        self.alerts_played.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl VoiceGateway for ReplayGateway {
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        options: JoinOptions,
    ) -> Result<VoiceLink> {
        info!(
            "Replay join: guild {} channel {} (mute={}, deaf={})",
            guild_id, channel_id, options.self_mute, options.self_deaf
        );

        let (state_tx, state_rx) = watch::channel(ConnectionState::Signalling);
        let (event_tx, event_rx) = mpsc::channel(256);
        let state_tx = Arc::new(state_tx);

        let frames = Arc::clone(&self.frames);
        let speaker = self.speaker;
        let pump_state = Arc::clone(&state_tx);

        let pump = tokio::spawn(async move {
            pump_state.send_replace(ConnectionState::Connecting);
            pump_state.send_replace(ConnectionState::Ready);

            if event_tx
                .send(VoiceEvent::Speaking { user_id: speaker })
                .await
                .is_err()
            {
                return;
            }

            for frame in frames.iter() {
                let pace = Duration::from_millis(frame.duration_ms());
                let event = VoiceEvent::Audio {
                    user_id: speaker,
                    frame: frame.clone(),
                };
                if event_tx.send(event).await.is_err() {
                    return;
                }
                tokio::time::sleep(pace).await;
            }

            debug!("Replay finished ({} frames)", frames.len());
        });

        let connection = ReplayConnection {
            state: state_tx,
            pump: Mutex::new(Some(pump)),
            alerts_played: Arc::clone(&self.alerts_played),
        };

        Ok(VoiceLink {
            connection: Arc::new(connection),
            events: event_rx,
            state: state_rx,
        })
    }

    fn name(&self) -> &str {
        "replay"
    }
}

struct ReplayConnection {
    state: Arc<watch::Sender<ConnectionState>>,
    pump: Mutex<Option<JoinHandle<()>>>,
    alerts_played: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl VoiceConnection for ReplayConnection {
    async fn create_player(&self) -> Result<Box<dyn AudioPlayer>> {
        Ok(Box::new(LogPlayer::new(Arc::clone(&self.alerts_played))))
    }

    async fn destroy(&self) -> Result<()> {
        let pump = self
            .pump
            .lock()
            .map_err(|_| anyhow::anyhow!("pump lock poisoned"))?
            .take();
        if let Some(pump) = pump {
            pump.abort();
        }
        self.state.send_replace(ConnectionState::Destroyed);
        Ok(())
    }
}

/// Player that only logs what it would have played
pub struct LogPlayer {
    busy_until: Mutex<Option<Instant>>,
    played: Arc<AtomicUsize>,
}

impl LogPlayer {
    pub fn new(played: Arc<AtomicUsize>) -> Self {
        Self {
            busy_until: Mutex::new(None),
            played,
        }
    }
}

#[async_trait::async_trait]
impl AudioPlayer for LogPlayer {
    fn is_busy(&self) -> bool {
        match self.busy_until.lock() {
            Ok(guard) => guard.map_or(false, |until| Instant::now() < until),
            Err(_) => false,
        }
    }

    async fn play(&self, pcm: Arc<[i16]>) -> Result<()> {
        // 48kHz stereo
        let length = Duration::from_millis(pcm.len() as u64 * 1000 / 96_000);
        *self
            .busy_until
            .lock()
            .map_err(|_| anyhow::anyhow!("player lock poisoned"))? = Some(Instant::now() + length);
        self.played.fetch_add(1, Ordering::SeqCst);
        info!("Playing alert ({} samples, {:?})", pcm.len(), length);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if let Ok(mut guard) = self.busy_until.lock() {
            *guard = None;
        }
        Ok(())
    }
}
