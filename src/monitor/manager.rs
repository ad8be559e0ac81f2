use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::calibration::{clamp_calibration_secs, CalibrationRun};
use super::config::MonitorConfig;
use super::session::{MonitorSession, SessionDeps, SessionMap, SessionSlot};
use super::stats::{CalibrationOutcome, SessionSnapshot, StopSummary};
use crate::error::MonitorError;
use crate::notify::{Notifier, ProgressSink};
use crate::voice::{
    wait_ready, ConnectionState, DisconnectKind, JoinOptions, ReconnectGrace, SessionKey,
    SpeechSubscription, VoiceChannelRef, VoiceGateway, VoiceLink,
};

/// Optional overrides for `start`
#[derive(Debug, Clone, Copy, Default)]
pub struct MonitorOptions {
    /// Loudness percentage that triggers a warning (1-100)
    pub threshold: Option<u8>,
    /// Minimum seconds between warnings
    pub cooldown_secs: Option<u64>,
}

/// Owns every active monitoring session in the process
///
/// Cloning is cheap and every clone sees the same sessions.
#[derive(Clone)]
pub struct VolumeSessionManager {
    config: Arc<MonitorConfig>,
    gateway: Arc<dyn VoiceGateway>,
    notifier: Arc<dyn Notifier>,
    sessions: SessionMap,
    /// Rendered once; every session plays the same alert
    alert: Arc<[i16]>,
}

impl VolumeSessionManager {
    pub fn new(
        config: MonitorConfig,
        gateway: Arc<dyn VoiceGateway>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let alert: Arc<[i16]> = config.alert.synthesize().into();

        info!(
            "Volume session manager ready (gateway: {}, sensitivity x{}, noise floor {}%)",
            gateway.name(),
            config.sensitivity,
            config.noise_floor
        );

        Self {
            config: Arc::new(config),
            gateway,
            notifier,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            alert,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Start monitoring a user in their voice channel
    pub async fn start(
        &self,
        key: SessionKey,
        channel: Option<VoiceChannelRef>,
        options: MonitorOptions,
    ) -> Result<SessionSnapshot, MonitorError> {
        let channel = check_channel(channel)?;

        let threshold = options.threshold.unwrap_or(self.config.default_threshold);
        if !(1..=100).contains(&threshold) {
            return Err(MonitorError::InvalidThreshold(threshold));
        }
        let cooldown = options
            .cooldown_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.config.default_cooldown());

        let cancelled = Arc::new(AtomicBool::new(false));
        {
            let mut sessions = self.sessions.lock().await;
            if sessions.contains_key(&key) {
                return Err(MonitorError::AlreadyMonitoring(key));
            }
            sessions.insert(
                key,
                SessionSlot::Starting {
                    cancelled: Arc::clone(&cancelled),
                },
            );
        }

        info!("Starting monitoring for {} in channel {}", key, channel.channel_id);

        let link = match self.connect(key, channel).await {
            Ok(link) => link,
            Err(e) => {
                self.release_starting_slot(key, &cancelled).await;
                return Err(e);
            }
        };

        let mut sessions = self.sessions.lock().await;
        let still_ours = matches!(
            sessions.get(&key),
            Some(SessionSlot::Starting { cancelled: c }) if Arc::ptr_eq(c, &cancelled)
        );

        if !still_ours || cancelled.load(Ordering::SeqCst) {
            drop(sessions);
            info!("Monitoring for {} was cancelled while connecting", key);
            if let Err(e) = link.connection.destroy().await {
                warn!("Failed to destroy voice connection for {}: {}", key, e);
            }
            return Err(MonitorError::SessionCancelled(key));
        }

        let session = MonitorSession::spawn(
            key,
            channel,
            threshold,
            cooldown,
            link,
            SessionDeps {
                meter: self.config.meter(),
                notifier: Arc::clone(&self.notifier),
                alert: Arc::clone(&self.alert),
                reconnect_grace: self.config.reconnect_grace(),
                silence_gap: self.config.silence_gap(),
                sessions: Arc::clone(&self.sessions),
            },
        );
        let snapshot = session.snapshot().await;
        sessions.insert(key, SessionSlot::Active(session));

        Ok(snapshot)
    }

    /// Stop monitoring and release the voice connection
    pub async fn stop(&self, key: SessionKey) -> Result<StopSummary, MonitorError> {
        let slot = {
            let mut sessions = self.sessions.lock().await;
            sessions.remove(&key)
        };

        match slot {
            Some(SessionSlot::Active(session)) => {
                let summary = session.shutdown().await;
                info!(
                    "Monitoring stopped for {}: {} warnings in {:.1}s",
                    key, summary.warning_count, summary.elapsed_secs
                );
                Ok(summary)
            }
            Some(SessionSlot::Starting { cancelled }) => {
                cancelled.store(true, Ordering::SeqCst);
                info!("Cancelled monitoring for {} before it connected", key);
                Ok(StopSummary {
                    guild_id: key.guild_id,
                    user_id: key.user_id,
                    warning_count: 0,
                    elapsed_secs: 0.0,
                })
            }
            None => Err(MonitorError::NoActiveSession(key)),
        }
    }

    /// Current state of an active session
    pub async fn status(&self, key: SessionKey) -> Result<SessionSnapshot, MonitorError> {
        let sessions = self.sessions.lock().await;
        match sessions.get(&key) {
            Some(SessionSlot::Active(session)) => Ok(session.snapshot().await),
            _ => Err(MonitorError::NoActiveSession(key)),
        }
    }

    /// Snapshots of every active session
    pub async fn active_sessions(&self) -> Vec<SessionSnapshot> {
        let sessions = self.sessions.lock().await;
        let mut snapshots = Vec::with_capacity(sessions.len());
        for slot in sessions.values() {
            if let SessionSlot::Active(session) = slot {
                snapshots.push(session.snapshot().await);
            }
        }
        snapshots
    }

    /// Stop every session, e.g. on process shutdown
    pub async fn stop_all(&self) -> Vec<StopSummary> {
        let keys: Vec<SessionKey> = {
            let sessions = self.sessions.lock().await;
            sessions.keys().copied().collect()
        };

        let mut summaries = Vec::with_capacity(keys.len());
        for key in keys {
            if let Ok(summary) = self.stop(key).await {
                summaries.push(summary);
            }
        }
        summaries
    }

    /// Measure a user's loudness and suggest thresholds
    ///
    /// Runs on its own connection and never touches the session map.
    pub async fn calibrate(
        &self,
        key: SessionKey,
        channel: Option<VoiceChannelRef>,
        duration_secs: Option<u64>,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<CalibrationOutcome, MonitorError> {
        let channel = check_channel(channel)?;
        let duration_secs =
            clamp_calibration_secs(duration_secs.unwrap_or(self.config.default_calibration_secs));

        info!("Calibrating {} for {}s", key, duration_secs);

        let VoiceLink {
            connection,
            mut events,
            mut state,
        } = self.connect(key, channel).await?;

        let meter = self.config.meter();
        let interval = self.config.progress_interval();
        let mut run = CalibrationRun::new(key, Duration::from_secs(duration_secs), Instant::now());
        let mut subscription = SpeechSubscription::new(key.user_id, self.config.silence_gap());

        let mut ticker = tokio::time::interval_at(run.started_at() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let finished = tokio::time::sleep_until(run.deadline());
        tokio::pin!(finished);

        let mut events_open = true;
        let mut grace = ReconnectGrace::new(self.config.reconnect_grace());

        loop {
            tokio::select! {
                _ = &mut finished => break,

                _ = ticker.tick() => {
                    let readout = run.progress(Instant::now());
                    if let Err(e) = progress.report(&readout).await {
                        debug!("Calibration progress update for {} failed: {}", key, e);
                    }
                }

                event = events.recv(), if events_open => match event {
                    Some(event) => {
                        if let Some(frame) = subscription.accept(event, Instant::now()) {
                            let loudness = meter.loudness(&frame.samples);
                            if meter.above_noise_floor(loudness) {
                                run.record(loudness);
                            }
                        }
                    }
                    None => events_open = false,
                },

                changed = state.changed() => {
                    let current = match changed {
                        Ok(()) => *state.borrow_and_update(),
                        Err(_) => ConnectionState::Destroyed,
                    };

                    if grace.on_state(current, Instant::now()) == Some(DisconnectKind::Permanent) {
                        warn!("Calibration for {} ended early: voice connection lost", key);
                        break;
                    }
                }

                _ = grace.expired() => {
                    warn!("Calibration for {} ended early: voice connection lost", key);
                    break;
                }
            }
        }

        // Both timers end with the run
        drop(ticker);

        if let Err(e) = connection.destroy().await {
            warn!("Failed to destroy calibration connection for {}: {}", key, e);
        }

        let readings = run.readings().len();
        let outcome = run.finish();
        info!("Calibration for {} finished with {} readings", key, readings);

        Ok(outcome)
    }

    /// Join and wait for the connection to become ready
    async fn connect(
        &self,
        key: SessionKey,
        channel: VoiceChannelRef,
    ) -> Result<VoiceLink, MonitorError> {
        let mut link = self
            .gateway
            .join(key.guild_id, channel.channel_id, JoinOptions::default())
            .await
            .map_err(MonitorError::JoinFailed)?;

        let limit = self.config.connect_timeout();
        if !wait_ready(&mut link.state, limit).await {
            warn!("Voice connection for {} not ready after {:?}", key, limit);
            if let Err(e) = link.connection.destroy().await {
                warn!("Failed to destroy voice connection for {}: {}", key, e);
            }
            return Err(MonitorError::ConnectionTimeout(limit));
        }

        debug!("Voice connection for {} ready", key);
        Ok(link)
    }

    /// Drop a `Starting` slot after a failed connect, unless someone replaced it
    async fn release_starting_slot(&self, key: SessionKey, cancelled: &Arc<AtomicBool>) {
        let mut sessions = self.sessions.lock().await;
        let ours = matches!(
            sessions.get(&key),
            Some(SessionSlot::Starting { cancelled: c }) if Arc::ptr_eq(c, cancelled)
        );
        if ours {
            sessions.remove(&key);
        }
    }
}

/// Presence and permission preconditions shared by start and calibrate
fn check_channel(channel: Option<VoiceChannelRef>) -> Result<VoiceChannelRef, MonitorError> {
    let channel = channel.ok_or(MonitorError::MissingVoicePresence)?;
    if !channel.can_connect {
        return Err(MonitorError::InsufficientPermission("Connect"));
    }
    if !channel.can_speak {
        return Err(MonitorError::InsufficientPermission("Speak"));
    }
    Ok(channel)
}
