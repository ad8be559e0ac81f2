use std::sync::Arc;

use crate::monitor::VolumeSessionManager;
use crate::notify::ProgressSink;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The single session manager for this process
    pub manager: VolumeSessionManager,

    /// Where calibration progress readouts go
    pub progress: Arc<dyn ProgressSink>,
}

impl AppState {
    pub fn new(manager: VolumeSessionManager, progress: Arc<dyn ProgressSink>) -> Self {
        Self { manager, progress }
    }
}
