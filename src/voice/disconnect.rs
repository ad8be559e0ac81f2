use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{info, warn};

use super::types::ConnectionState;

/// Default window for a dropped connection to start reconnecting
pub const DEFAULT_RECONNECT_GRACE: Duration = Duration::from_secs(5);

/// How a connection drop resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectKind {
    /// The connection moved back into signalling/connecting in time
    Transient,
    /// The connection is gone for good
    Permanent,
}

/// Grace window for a `Disconnected` connection
///
/// Owners feed every state change through `on_state` and poll `expired`
/// alongside their other work, so a drop never blocks shutdown or deadlines.
/// Reaching `Signalling` or `Connecting` inside the window is transient;
/// `Destroyed` or running out the window is permanent.
#[derive(Debug)]
pub struct ReconnectGrace {
    grace: Duration,
    deadline: Option<Instant>,
}

impl ReconnectGrace {
    pub fn new(grace: Duration) -> Self {
        Self {
            grace,
            deadline: None,
        }
    }

    /// Whether a drop is currently being waited out
    pub fn is_waiting(&self) -> bool {
        self.deadline.is_some()
    }

    /// Feed a state change; returns how a pending drop resolved, if it did
    pub fn on_state(&mut self, state: ConnectionState, now: Instant) -> Option<DisconnectKind> {
        match state {
            ConnectionState::Disconnected => {
                if self.deadline.is_none() {
                    self.deadline = Some(now + self.grace);
                }
                None
            }
            ConnectionState::Destroyed => {
                self.deadline = None;
                Some(DisconnectKind::Permanent)
            }
            ConnectionState::Signalling | ConnectionState::Connecting | ConnectionState::Ready => {
                self.deadline.take().map(|_| {
                    info!("Voice connection is reconnecting ({:?})", state);
                    DisconnectKind::Transient
                })
            }
        }
    }

    /// Resolves when the window runs out; never resolves while connected
    pub async fn expired(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::time::sleep_until(deadline).await;
                warn!("Voice connection did not recover within {:?}", self.grace);
            }
            None => std::future::pending().await,
        }
    }
}

/// Wait until the connection is ready, failing after `limit`
///
/// Returns `false` on timeout or if the connection was destroyed first.
pub async fn wait_ready(state: &mut watch::Receiver<ConnectionState>, limit: Duration) -> bool {
    let outcome = tokio::time::timeout(
        limit,
        state.wait_for(|s| matches!(s, ConnectionState::Ready | ConnectionState::Destroyed)),
    )
    .await;

    matches!(outcome, Ok(Ok(s)) if *s == ConnectionState::Ready)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconnecting_state_is_transient() {
        let mut grace = ReconnectGrace::new(DEFAULT_RECONNECT_GRACE);
        let t0 = Instant::now();

        assert_eq!(grace.on_state(ConnectionState::Disconnected, t0), None);
        assert!(grace.is_waiting());

        let kind = grace.on_state(ConnectionState::Connecting, t0 + Duration::from_secs(2));
        assert_eq!(kind, Some(DisconnectKind::Transient));
        assert!(!grace.is_waiting());

        // Ready after recovering is a no-op
        assert_eq!(grace.on_state(ConnectionState::Ready, t0), None);
    }

    #[test]
    fn test_destroyed_is_permanent() {
        let mut grace = ReconnectGrace::new(DEFAULT_RECONNECT_GRACE);
        let t0 = Instant::now();

        grace.on_state(ConnectionState::Disconnected, t0);
        assert_eq!(
            grace.on_state(ConnectionState::Destroyed, t0),
            Some(DisconnectKind::Permanent)
        );
    }

    #[test]
    fn test_repeated_disconnect_keeps_first_deadline() {
        let mut grace = ReconnectGrace::new(DEFAULT_RECONNECT_GRACE);
        let t0 = Instant::now();

        grace.on_state(ConnectionState::Disconnected, t0);
        grace.on_state(ConnectionState::Disconnected, t0 + Duration::from_secs(3));
        assert_eq!(grace.deadline, Some(t0 + DEFAULT_RECONNECT_GRACE));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_recovery_expires_after_grace() {
        let mut grace = ReconnectGrace::new(DEFAULT_RECONNECT_GRACE);
        let t0 = Instant::now();
        grace.on_state(ConnectionState::Disconnected, t0);

        grace.expired().await;
        let waited = t0.elapsed();
        assert!(waited >= DEFAULT_RECONNECT_GRACE);
        assert!(waited < DEFAULT_RECONNECT_GRACE + Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connected_never_expires() {
        let grace = ReconnectGrace::new(DEFAULT_RECONNECT_GRACE);

        let waited = tokio::time::timeout(Duration::from_secs(60), grace.expired()).await;
        assert!(waited.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_ready_times_out() {
        let (_tx, mut rx) = watch::channel(ConnectionState::Signalling);
        assert!(!wait_ready(&mut rx, Duration::from_secs(30)).await);
    }

    #[tokio::test]
    async fn test_wait_ready_when_already_ready() {
        let (_tx, mut rx) = watch::channel(ConnectionState::Ready);
        assert!(wait_ready(&mut rx, Duration::from_secs(30)).await);
    }
}
