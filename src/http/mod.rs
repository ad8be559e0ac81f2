//! HTTP API for the command-dispatch layer
//!
//! The Discord sidecar turns slash commands into these calls and posts the
//! returned reply:
//! - POST /guilds/:guild_id/users/:user_id/monitor - Start monitoring
//! - DELETE /guilds/:guild_id/users/:user_id/monitor - Stop monitoring
//! - GET /guilds/:guild_id/users/:user_id/monitor - Session status
//! - POST /guilds/:guild_id/users/:user_id/calibrate - Run a calibration
//! - GET /sessions - All active sessions
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use handlers::{CalibrateRequest, StartMonitorRequest};
pub use routes::create_router;
pub use state::AppState;
