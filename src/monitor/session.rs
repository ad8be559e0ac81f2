use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::stats::{SessionSnapshot, StopSummary};
use super::warning::WarningState;
use crate::audio::LoudnessMeter;
use crate::notify::Notifier;
use crate::reply;
use crate::voice::{
    AudioPlayer, ChannelId, ConnectionState, DisconnectKind, ReconnectGrace, SessionKey,
    SpeechSubscription, VoiceChannelRef, VoiceConnection, VoiceEvent, VoiceLink,
};

/// Active sessions, keyed by (guild, user)
pub(crate) type SessionMap = Arc<Mutex<HashMap<SessionKey, SessionSlot>>>;

/// A key is occupied from the moment `start` accepts it
pub(crate) enum SessionSlot {
    /// Connection is being established; `stop` flips the flag
    Starting { cancelled: Arc<AtomicBool> },
    Active(MonitorSession),
}

/// One user being monitored in one guild
pub(crate) struct MonitorSession {
    id: Uuid,
    key: SessionKey,
    channel: VoiceChannelRef,
    started_at: DateTime<Utc>,
    started_instant: Instant,
    warnings: Arc<Mutex<WarningState>>,
    live: Arc<AtomicBool>,
    connection: Arc<dyn VoiceConnection>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

/// Shared pieces every session task needs
pub(crate) struct SessionDeps {
    pub meter: LoudnessMeter,
    pub notifier: Arc<dyn Notifier>,
    pub alert: Arc<[i16]>,
    pub reconnect_grace: Duration,
    pub silence_gap: Duration,
    pub sessions: SessionMap,
}

impl MonitorSession {
    /// Build the session and spawn its frame loop
    pub fn spawn(
        key: SessionKey,
        channel: VoiceChannelRef,
        threshold: u8,
        cooldown: Duration,
        link: VoiceLink,
        deps: SessionDeps,
    ) -> Self {
        let VoiceLink {
            connection,
            events,
            state,
        } = link;
        let id = Uuid::new_v4();
        let warnings = Arc::new(Mutex::new(WarningState::new(threshold, cooldown)));
        let live = Arc::new(AtomicBool::new(true));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = SessionTask {
            id,
            key,
            text_channel: channel.text_channel_id,
            meter: deps.meter,
            warnings: Arc::clone(&warnings),
            live: Arc::clone(&live),
            connection: Arc::clone(&connection),
            notifier: deps.notifier,
            alert: deps.alert,
            reconnect_grace: deps.reconnect_grace,
            subscription: SpeechSubscription::new(key.user_id, deps.silence_gap),
            player: None,
            sessions: deps.sessions,
        };

        let handle = tokio::spawn(task.run(events, state, shutdown_rx));

        info!(
            "Session {} started for {} (threshold {}%, cooldown {:?})",
            id, key, threshold, cooldown
        );

        Self {
            id,
            key,
            channel,
            started_at: Utc::now(),
            started_instant: Instant::now(),
            warnings,
            live,
            connection,
            shutdown: Some(shutdown_tx),
            task: Some(handle),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let warnings = self.warnings.lock().await;

        SessionSnapshot {
            session_id: self.id.to_string(),
            guild_id: self.key.guild_id,
            user_id: self.key.user_id,
            voice_channel_id: self.channel.channel_id,
            text_channel_id: self.channel.text_channel_id,
            threshold: warnings.threshold(),
            cooldown_secs: warnings.cooldown().as_secs(),
            warning_count: warnings.warning_count(),
            last_warning_at: warnings.last_warning_wall(),
            started_at: self.started_at,
            elapsed_secs: self.started_instant.elapsed().as_secs_f64(),
        }
    }

    /// Tear the session down; the caller has already removed it from the map
    pub async fn shutdown(mut self) -> StopSummary {
        info!("Stopping session {} for {}", self.id, self.key);

        // Frame callbacks check this before warning
        self.live.store(false, Ordering::SeqCst);

        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Session task panicked: {}", e);
            }
        }

        if let Err(e) = self.connection.destroy().await {
            warn!("Failed to destroy voice connection for {}: {}", self.key, e);
        }

        let warning_count = self.warnings.lock().await.warning_count();

        StopSummary {
            guild_id: self.key.guild_id,
            user_id: self.key.user_id,
            warning_count,
            elapsed_secs: self.started_instant.elapsed().as_secs_f64(),
        }
    }
}

/// The per-session frame loop
struct SessionTask {
    id: Uuid,
    key: SessionKey,
    text_channel: ChannelId,
    meter: LoudnessMeter,
    warnings: Arc<Mutex<WarningState>>,
    live: Arc<AtomicBool>,
    connection: Arc<dyn VoiceConnection>,
    notifier: Arc<dyn Notifier>,
    alert: Arc<[i16]>,
    reconnect_grace: Duration,
    subscription: SpeechSubscription,
    /// Created on the first warning that plays a cue
    player: Option<Box<dyn AudioPlayer>>,
    sessions: SessionMap,
}

impl SessionTask {
    async fn run(
        mut self,
        mut events: mpsc::Receiver<VoiceEvent>,
        mut state: watch::Receiver<ConnectionState>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        debug!("Session task {} running", self.id);
        let mut events_open = true;
        let mut grace = ReconnectGrace::new(self.reconnect_grace);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,

                event = events.recv(), if events_open => match event {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        debug!("Voice events closed for {}", self.key);
                        events_open = false;
                    }
                },

                changed = state.changed() => {
                    let current = match changed {
                        Ok(()) => *state.borrow_and_update(),
                        Err(_) => ConnectionState::Destroyed,
                    };

                    if current == ConnectionState::Disconnected && !grace.is_waiting() {
                        warn!("Voice connection for {} disconnected", self.key);
                    }

                    if grace.on_state(current, Instant::now()) == Some(DisconnectKind::Permanent) {
                        self.end_on_disconnect().await;
                        break;
                    }
                }

                _ = grace.expired() => {
                    self.end_on_disconnect().await;
                    break;
                }
            }
        }

        if let Some(player) = self.player.take() {
            if let Err(e) = player.stop().await {
                warn!("Failed to stop audio player for {}: {}", self.key, e);
            }
        }

        debug!("Session task {} stopped", self.id);
    }

    async fn handle_event(&mut self, event: VoiceEvent) {
        let now = Instant::now();
        let Some(frame) = self.subscription.accept(event, now) else {
            return;
        };

        if !self.live.load(Ordering::SeqCst) {
            return;
        }

        let loudness = self.meter.loudness(&frame.samples);

        let fired = {
            let mut warnings = self.warnings.lock().await;
            warnings
                .observe(loudness, now)
                .then(|| warnings.threshold())
        };

        if let Some(threshold) = fired {
            self.warn_user(loudness, threshold).await;
        }
    }

    async fn warn_user(&mut self, loudness: f64, threshold: u8) {
        if !self.live.load(Ordering::SeqCst) {
            return;
        }

        info!(
            "{} exceeded threshold: {:.1}% > {}%",
            self.key, loudness, threshold
        );

        let content = reply::warning_message(self.key.user_id, loudness, threshold);
        if let Err(e) = self
            .notifier
            .send_message(self.text_channel, Some(self.key.user_id), &content)
            .await
        {
            error!("Failed to send warning for {}: {}", self.key, e);
        }

        self.play_alert().await;
    }

    async fn play_alert(&mut self) {
        if self.player.is_none() {
            match self.connection.create_player().await {
                Ok(player) => self.player = Some(player),
                Err(e) => {
                    warn!("Playback failure for {}: could not create player: {}", self.key, e);
                    return;
                }
            }
        }

        let Some(player) = self.player.as_ref() else {
            return;
        };

        if player.is_busy() {
            debug!("Alert skipped for {}: player busy", self.key);
            return;
        }

        if let Err(e) = player.play(Arc::clone(&self.alert)).await {
            warn!("Playback failure for {}: {}", self.key, e);
        }
    }

    /// Permanent disconnect: release everything and drop out of the map
    async fn end_on_disconnect(&mut self) {
        self.live.store(false, Ordering::SeqCst);

        if let Err(e) = self.connection.destroy().await {
            warn!("Failed to destroy voice connection for {}: {}", self.key, e);
        }

        let mut sessions = self.sessions.lock().await;
        let ours = matches!(
            sessions.get(&self.key),
            Some(SessionSlot::Active(session)) if session.id() == self.id
        );
        if ours {
            sessions.remove(&self.key);
            info!("Session {} for {} ended: voice connection lost", self.id, self.key);
        }
    }
}
