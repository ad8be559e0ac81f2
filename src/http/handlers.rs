use super::state::AppState;
use crate::error::MonitorError;
use crate::monitor::{CalibrationOutcome, MonitorOptions, SessionSnapshot, StopSummary};
use crate::reply::{self, Reply};
use crate::voice::{SessionKey, VoiceChannelRef};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct StartMonitorRequest {
    /// The user's current voice channel; absent if they are not in one
    pub voice_channel: Option<VoiceChannelRef>,

    /// Loudness percentage that triggers a warning (default: 70)
    pub threshold: Option<u8>,

    /// Seconds between warnings (default: 30)
    pub cooldown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct CalibrateRequest {
    pub voice_channel: Option<VoiceChannelRef>,

    /// Calibration window, clamped to 5-120 seconds (default: 30)
    pub duration_secs: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub reply: Reply,
    pub session: SessionSnapshot,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub reply: Reply,
    pub summary: StopSummary,
}

#[derive(Debug, Serialize)]
pub struct CalibrateResponse {
    pub reply: Reply,
    pub result: CalibrationOutcome,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub reply: Reply,
}

fn error_response(err: MonitorError) -> Response {
    let status = match &err {
        MonitorError::AlreadyMonitoring(_) | MonitorError::SessionCancelled(_) => {
            StatusCode::CONFLICT
        }
        MonitorError::NoActiveSession(_) => StatusCode::NOT_FOUND,
        MonitorError::MissingVoicePresence | MonitorError::InvalidThreshold(_) => {
            StatusCode::BAD_REQUEST
        }
        MonitorError::InsufficientPermission(_) => StatusCode::FORBIDDEN,
        MonitorError::ConnectionTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        MonitorError::JoinFailed(_) => StatusCode::BAD_GATEWAY,
    };

    match &err {
        MonitorError::JoinFailed(source) => error!("Request failed: {}: {:#}", err, source),
        _ if err.is_user_facing() => info!("Request rejected: {}", err),
        _ => error!("Request failed: {}", err),
    }

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            reply: reply::error(&err),
        }),
    )
        .into_response()
}

/// A body that did not parse gets the same reply shape as any other error
fn rejection_response(rejection: JsonRejection) -> Response {
    let detail = rejection.body_text();
    info!("Request body rejected: {}", detail);

    (
        rejection.status(),
        Json(ErrorResponse {
            reply: reply::invalid_request(&detail),
            error: detail,
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /guilds/:guild_id/users/:user_id/monitor
/// Start monitoring a user
pub async fn start_monitoring(
    State(state): State<AppState>,
    Path((guild_id, user_id)): Path<(u64, u64)>,
    body: Result<Json<StartMonitorRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return rejection_response(rejection),
    };
    let key = SessionKey::new(guild_id, user_id);
    info!("Start monitoring requested for {}", key);

    let options = MonitorOptions {
        threshold: req.threshold,
        cooldown_secs: req.cooldown_secs,
    };

    match state.manager.start(key, req.voice_channel, options).await {
        Ok(session) => (
            StatusCode::OK,
            Json(SessionResponse {
                reply: reply::started(&session),
                session,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// DELETE /guilds/:guild_id/users/:user_id/monitor
/// Stop monitoring a user
pub async fn stop_monitoring(
    State(state): State<AppState>,
    Path((guild_id, user_id)): Path<(u64, u64)>,
) -> impl IntoResponse {
    let key = SessionKey::new(guild_id, user_id);
    info!("Stop monitoring requested for {}", key);

    match state.manager.stop(key).await {
        Ok(summary) => (
            StatusCode::OK,
            Json(StopResponse {
                reply: reply::stopped(&summary),
                summary,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /guilds/:guild_id/users/:user_id/monitor
/// Get status of a monitoring session
pub async fn get_monitor_status(
    State(state): State<AppState>,
    Path((guild_id, user_id)): Path<(u64, u64)>,
) -> impl IntoResponse {
    let key = SessionKey::new(guild_id, user_id);

    match state.manager.status(key).await {
        Ok(session) => (
            StatusCode::OK,
            Json(SessionResponse {
                reply: reply::status(&session),
                session,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /guilds/:guild_id/users/:user_id/calibrate
/// Measure a user's loudness; blocks for the calibration window
pub async fn calibrate(
    State(state): State<AppState>,
    Path((guild_id, user_id)): Path<(u64, u64)>,
    body: Result<Json<CalibrateRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return rejection_response(rejection),
    };
    let key = SessionKey::new(guild_id, user_id);
    info!("Calibration requested for {}", key);

    let progress = Arc::clone(&state.progress);
    match state
        .manager
        .calibrate(key, req.voice_channel, req.duration_secs, progress)
        .await
    {
        Ok(result) => {
            if let CalibrationOutcome::NoAudioDetected { .. } = result {
                warn!("Calibration for {} heard nothing", key);
            }
            (
                StatusCode::OK,
                Json(CalibrateResponse {
                    reply: reply::calibration(key.user_id, &result),
                    result,
                }),
            )
                .into_response()
        }
        Err(e) => error_response(e),
    }
}

/// GET /sessions
/// List active monitoring sessions
pub async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    let sessions = state.manager.active_sessions().await;
    (StatusCode::OK, Json(sessions)).into_response()
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
