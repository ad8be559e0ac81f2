// Scripted voice gateway and recording collaborators for integration tests

#![allow(dead_code)]

use anyhow::Result;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use volume_monitor::audio::AudioFrame;
use volume_monitor::monitor::CalibrationProgress;
use volume_monitor::notify::{Notifier, ProgressSink};
use volume_monitor::voice::{
    AudioPlayer, ChannelId, ConnectionState, GuildId, JoinOptions, UserId, VoiceChannelRef,
    VoiceConnection, VoiceEvent, VoiceGateway, VoiceLink,
};

pub const VOICE_CHANNEL: ChannelId = ChannelId(100);
pub const TEXT_CHANNEL: ChannelId = ChannelId(200);

pub fn voice_channel() -> VoiceChannelRef {
    VoiceChannelRef {
        channel_id: VOICE_CHANNEL,
        text_channel_id: TEXT_CHANNEL,
        can_connect: true,
        can_speak: true,
    }
}

/// A 20ms Discord frame whose loudness (default meter) is close to `percent`
pub fn frame_at(percent: f64) -> AudioFrame {
    let amplitude = (percent / 300.0 * i16::MAX as f64).round() as i16;
    AudioFrame::discord(vec![amplitude; 1920], 0)
}

pub fn speaking(user: u64) -> VoiceEvent {
    VoiceEvent::Speaking {
        user_id: UserId(user),
    }
}

pub fn audio(user: u64, percent: f64) -> VoiceEvent {
    VoiceEvent::Audio {
        user_id: UserId(user),
        frame: frame_at(percent),
    }
}

/// Test-side controls for one joined connection
#[derive(Clone)]
pub struct MockHandle {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub options: JoinOptions,
    pub events: mpsc::Sender<VoiceEvent>,
    pub state: Arc<watch::Sender<ConnectionState>>,
    pub destroyed: Arc<AtomicBool>,
    pub players_created: Arc<AtomicUsize>,
    pub players_stopped: Arc<AtomicUsize>,
    pub played: Arc<AtomicUsize>,
    pub player_busy: Arc<AtomicBool>,
}

impl MockHandle {
    /// Start of a speech burst followed by one frame
    pub async fn speak(&self, user: u64, percent: f64) {
        self.events.send(speaking(user)).await.unwrap();
        self.events.send(audio(user, percent)).await.unwrap();
    }

    pub fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn played(&self) -> usize {
        self.played.load(Ordering::SeqCst)
    }

    pub fn players_created(&self) -> usize {
        self.players_created.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct MockGateway {
    /// Leave new connections in Signalling instead of Ready
    pub hold_ready: bool,
    /// Fail the join call itself
    pub fail_join: bool,
    /// Fail every create_player call
    pub fail_player: bool,
    handles: Mutex<Vec<MockHandle>>,
}

impl MockGateway {
    pub fn ready() -> Self {
        Self::default()
    }

    pub fn stalled() -> Self {
        Self {
            hold_ready: true,
            ..Self::default()
        }
    }

    pub fn failing_join() -> Self {
        Self {
            fail_join: true,
            ..Self::default()
        }
    }

    pub fn failing_player() -> Self {
        Self {
            fail_player: true,
            ..Self::default()
        }
    }

    pub fn handles(&self) -> Vec<MockHandle> {
        self.handles.lock().unwrap().clone()
    }

    pub fn last(&self) -> MockHandle {
        self.handles.lock().unwrap().last().cloned().expect("no joins yet")
    }

    pub fn joins(&self) -> usize {
        self.handles.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl VoiceGateway for MockGateway {
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        options: JoinOptions,
    ) -> Result<VoiceLink> {
        if self.fail_join {
            anyhow::bail!("gateway unavailable");
        }

        let initial = if self.hold_ready {
            ConnectionState::Signalling
        } else {
            ConnectionState::Ready
        };
        let (state_tx, state_rx) = watch::channel(initial);
        let (event_tx, event_rx) = mpsc::channel(64);

        let handle = MockHandle {
            guild_id,
            channel_id,
            options,
            events: event_tx,
            state: Arc::new(state_tx),
            destroyed: Arc::new(AtomicBool::new(false)),
            players_created: Arc::new(AtomicUsize::new(0)),
            players_stopped: Arc::new(AtomicUsize::new(0)),
            played: Arc::new(AtomicUsize::new(0)),
            player_busy: Arc::new(AtomicBool::new(false)),
        };

        let connection = MockConnection {
            handle: handle.clone(),
            fail_player: self.fail_player,
        };
        self.handles.lock().unwrap().push(handle);

        Ok(VoiceLink {
            connection: Arc::new(connection),
            events: event_rx,
            state: state_rx,
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

struct MockConnection {
    handle: MockHandle,
    fail_player: bool,
}

#[async_trait::async_trait]
impl VoiceConnection for MockConnection {
    async fn create_player(&self) -> Result<Box<dyn AudioPlayer>> {
        if self.fail_player {
            anyhow::bail!("no encoder available");
        }
        self.handle.players_created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockPlayer {
            handle: self.handle.clone(),
        }))
    }

    async fn destroy(&self) -> Result<()> {
        self.handle.destroyed.store(true, Ordering::SeqCst);
        self.handle.state.send_replace(ConnectionState::Destroyed);
        Ok(())
    }
}

struct MockPlayer {
    handle: MockHandle,
}

#[async_trait::async_trait]
impl AudioPlayer for MockPlayer {
    fn is_busy(&self) -> bool {
        self.handle.player_busy.load(Ordering::SeqCst)
    }

    async fn play(&self, pcm: Arc<[i16]>) -> Result<()> {
        assert!(!pcm.is_empty());
        self.handle.played.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.handle.players_stopped.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Keeps every message it is asked to send
#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<(ChannelId, Option<UserId>, String)>>,
}

impl RecordingNotifier {
    pub fn count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn send_message(
        &self,
        channel_id: ChannelId,
        mention: Option<UserId>,
        content: &str,
    ) -> Result<()> {
        self.messages
            .lock()
            .unwrap()
            .push((channel_id, mention, content.to_string()));
        Ok(())
    }
}

/// Counts progress readouts; optionally fails every one
#[derive(Default)]
pub struct RecordingProgress {
    pub fail: bool,
    pub reports: Mutex<Vec<CalibrationProgress>>,
}

impl RecordingProgress {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn count(&self) -> usize {
        self.reports.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl ProgressSink for RecordingProgress {
    async fn report(&self, progress: &CalibrationProgress) -> Result<()> {
        self.reports.lock().unwrap().push(progress.clone());
        if self.fail {
            anyhow::bail!("interaction token expired");
        }
        Ok(())
    }
}
