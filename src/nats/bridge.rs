use anyhow::{Context, Result};
use base64::Engine;
use futures::stream::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::client::NatsClient;
use super::messages::{
    ConnectionStateMessage, JoinRequest, LeaveRequest, PlayRequest, SpeakingMessage, TextMessage,
    VoiceFrameMessage,
};
use crate::audio::{AudioFrame, DISCORD_CHANNELS, DISCORD_SAMPLE_RATE};
use crate::monitor::CalibrationProgress;
use crate::notify::{Notifier, ProgressSink};
use crate::voice::{
    AudioPlayer, ChannelId, ConnectionState, GuildId, JoinOptions, UserId, VoiceConnection,
    VoiceEvent, VoiceGateway, VoiceLink,
};

/// Live connection handles per guild
///
/// Discord allows one voice connection per guild, so every session and
/// calibration in a guild shares the sidecar's connection. It is only left
/// once the last handle is gone.
#[derive(Debug, Default)]
pub struct GuildHandles {
    counts: Mutex<HashMap<GuildId, usize>>,
}

impl GuildHandles {
    /// Register a handle; returns how many the guild now has
    pub fn acquire(&self, guild_id: GuildId) -> usize {
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        let count = counts.entry(guild_id).or_insert(0);
        *count += 1;
        *count
    }

    /// Drop a handle; returns true when it was the guild's last
    pub fn release(&self, guild_id: GuildId) -> bool {
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        match counts.get_mut(&guild_id) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            Some(_) => {
                counts.remove(&guild_id);
                true
            }
            None => false,
        }
    }

    pub fn count(&self, guild_id: GuildId) -> usize {
        let counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        counts.get(&guild_id).copied().unwrap_or(0)
    }
}

/// Voice gateway backed by the sidecar
pub struct NatsVoiceGateway {
    client: Arc<NatsClient>,
    handles: Arc<GuildHandles>,
}

impl NatsVoiceGateway {
    pub fn new(client: Arc<NatsClient>) -> Self {
        Self {
            client,
            handles: Arc::new(GuildHandles::default()),
        }
    }
}

#[async_trait::async_trait]
impl VoiceGateway for NatsVoiceGateway {
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        options: JoinOptions,
    ) -> Result<VoiceLink> {
        // Subscribe before joining so the first state change is not missed
        let mut states = self.client.subscribe(&format!("state.{}", guild_id)).await?;
        let mut speaking = self.client.subscribe(&format!("speaking.{}", guild_id)).await?;
        let mut frames = self.client.subscribe(&format!("frame.{}", guild_id)).await?;

        let (state_tx, state_rx) = watch::channel(ConnectionState::Signalling);
        let (event_tx, event_rx) = mpsc::channel(256);
        let state_tx = Arc::new(state_tx);
        let pump_state = Arc::clone(&state_tx);

        let pump = tokio::spawn(async move {
            info!("Voice pump for guild {} started", guild_id);

            loop {
                tokio::select! {
                    msg = states.next() => {
                        let Some(msg) = msg else { break };
                        match serde_json::from_slice::<ConnectionStateMessage>(&msg.payload) {
                            Ok(m) => {
                                debug!("Guild {} voice state: {:?}", guild_id, m.state);
                                pump_state.send_replace(m.state);
                            }
                            Err(e) => warn!("Failed to parse connection state: {}", e),
                        }
                    }
                    msg = speaking.next() => {
                        let Some(msg) = msg else { break };
                        match serde_json::from_slice::<SpeakingMessage>(&msg.payload) {
                            Ok(m) => {
                                let event = VoiceEvent::Speaking { user_id: m.user_id };
                                if event_tx.send(event).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("Failed to parse speaking event: {}", e),
                        }
                    }
                    msg = frames.next() => {
                        let Some(msg) = msg else { break };
                        let event = serde_json::from_slice::<VoiceFrameMessage>(&msg.payload)
                            .context("Failed to parse voice frame")
                            .and_then(decode_frame);
                        match event {
                            Ok(event) => {
                                if event_tx.send(event).await.is_err() {
                                    break;
                                }
                            }
                            // One bad frame never ends the stream
                            Err(e) => warn!("Dropping voice frame: {:#}", e),
                        }
                    }
                }
            }

            info!("Voice pump for guild {} stopped", guild_id);
        });

        let request = JoinRequest {
            guild_id,
            channel_id,
            self_mute: options.self_mute,
            self_deaf: options.self_deaf,
        };
        let live = self.handles.acquire(guild_id);
        if let Err(e) = self.client.publish_json("join", &request).await {
            pump.abort();
            self.handles.release(guild_id);
            return Err(e);
        }

        info!(
            "Requested join of channel {} in guild {} ({} handles)",
            channel_id, guild_id, live
        );

        let connection = NatsVoiceConnection {
            client: Arc::clone(&self.client),
            handles: Arc::clone(&self.handles),
            guild_id,
            state: state_tx,
            pump: Mutex::new(Some(pump)),
            destroyed: AtomicBool::new(false),
        };

        Ok(VoiceLink {
            connection: Arc::new(connection),
            events: event_rx,
            state: state_rx,
        })
    }

    fn name(&self) -> &str {
        "nats"
    }
}

struct NatsVoiceConnection {
    client: Arc<NatsClient>,
    handles: Arc<GuildHandles>,
    guild_id: GuildId,
    state: Arc<watch::Sender<ConnectionState>>,
    pump: Mutex<Option<JoinHandle<()>>>,
    destroyed: AtomicBool,
}

#[async_trait::async_trait]
impl VoiceConnection for NatsVoiceConnection {
    async fn create_player(&self) -> Result<Box<dyn AudioPlayer>> {
        Ok(Box::new(NatsPlayer {
            client: Arc::clone(&self.client),
            guild_id: self.guild_id,
            busy_until: Mutex::new(None),
        }))
    }

    async fn destroy(&self) -> Result<()> {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let pump = self
            .pump
            .lock()
            .map_err(|_| anyhow::anyhow!("pump lock poisoned"))?
            .take();
        if let Some(pump) = pump {
            pump.abort();
        }
        self.state.send_replace(ConnectionState::Destroyed);

        if !self.handles.release(self.guild_id) {
            debug!(
                "Guild {} voice connection still in use, not leaving",
                self.guild_id
            );
            return Ok(());
        }

        self.client
            .publish_json(
                "leave",
                &LeaveRequest {
                    guild_id: self.guild_id,
                },
            )
            .await
    }
}

/// Sends alerts to the sidecar for playback
struct NatsPlayer {
    client: Arc<NatsClient>,
    guild_id: GuildId,
    busy_until: Mutex<Option<Instant>>,
}

#[async_trait::async_trait]
impl AudioPlayer for NatsPlayer {
    fn is_busy(&self) -> bool {
        match self.busy_until.lock() {
            Ok(guard) => guard.map_or(false, |until| Instant::now() < until),
            Err(_) => false,
        }
    }

    async fn play(&self, pcm: Arc<[i16]>) -> Result<()> {
        let bytes: Vec<u8> = pcm.iter().flat_map(|s| s.to_le_bytes()).collect();
        let request = PlayRequest {
            guild_id: self.guild_id,
            pcm: base64::engine::general_purpose::STANDARD.encode(&bytes),
            sample_rate: DISCORD_SAMPLE_RATE,
            channels: DISCORD_CHANNELS,
        };

        self.client
            .publish_json(&format!("play.{}", self.guild_id), &request)
            .await?;

        let per_second = DISCORD_SAMPLE_RATE as u64 * DISCORD_CHANNELS as u64;
        let length = Duration::from_millis(pcm.len() as u64 * 1000 / per_second);
        if let Ok(mut guard) = self.busy_until.lock() {
            *guard = Some(Instant::now() + length);
        }

        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if let Ok(mut guard) = self.busy_until.lock() {
            *guard = None;
        }
        Ok(())
    }
}

/// Posts text messages through the sidecar
pub struct NatsNotifier {
    client: Arc<NatsClient>,
}

impl NatsNotifier {
    pub fn new(client: Arc<NatsClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Notifier for NatsNotifier {
    async fn send_message(
        &self,
        channel_id: ChannelId,
        mention: Option<UserId>,
        content: &str,
    ) -> Result<()> {
        let message = TextMessage {
            channel_id,
            mention,
            content: content.to_string(),
        };
        self.client.publish_json("text", &message).await
    }
}

/// Publishes calibration readouts for the sidecar to edit into its reply
pub struct NatsProgress {
    client: Arc<NatsClient>,
}

impl NatsProgress {
    pub fn new(client: Arc<NatsClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ProgressSink for NatsProgress {
    async fn report(&self, progress: &CalibrationProgress) -> Result<()> {
        self.client
            .publish_json("calibration.progress", progress)
            .await
    }
}

/// Turn a frame message into an audio event
pub fn decode_frame(message: VoiceFrameMessage) -> Result<VoiceEvent> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(&message.pcm)
        .with_context(|| format!("Bad PCM payload in frame {}", message.sequence))?;

    if bytes.len() % 2 != 0 {
        anyhow::bail!("Odd PCM length {} in frame {}", bytes.len(), message.sequence);
    }

    Ok(VoiceEvent::Audio {
        user_id: message.user_id,
        frame: AudioFrame {
            samples: AudioFrame::samples_from_pcm_bytes(&bytes),
            sample_rate: message.sample_rate,
            channels: message.channels,
            timestamp_ms: message.timestamp_ms,
        },
    })
}
