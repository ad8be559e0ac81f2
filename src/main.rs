use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use volume_monitor::audio::write_wav;
use volume_monitor::{
    create_router, AppState, AudioFile, CalibrationOutcome, ChannelId, Config, LogNotifier,
    LogProgress, MonitorConfig, MonitorOptions, NatsClient, NatsNotifier, NatsProgress,
    NatsVoiceGateway, ReplayGateway, SessionKey, UserId, VoiceChannelRef, VolumeSessionManager,
};

#[derive(Parser)]
#[command(name = "volume-monitor")]
#[command(about = "Voice volume monitor for Discord", long_about = None)]
struct Cli {
    /// Config file (without extension)
    #[arg(short, long, default_value = "config/volume-monitor")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP command API and the NATS voice bridge
    Serve,
    /// Monitor a WAV recording as if a user were speaking it
    Replay {
        file: PathBuf,
        /// Loudness percentage that triggers a warning
        #[arg(short, long, default_value = "70")]
        threshold: u8,
        /// Seconds between warnings
        #[arg(long, default_value = "30")]
        cooldown: u64,
    },
    /// Calibrate against a WAV recording
    Calibrate {
        file: PathBuf,
        /// Calibration window in seconds
        #[arg(short, long, default_value = "30")]
        duration: u64,
    },
    /// Write the warning alert tone to a WAV file
    AlertTone {
        #[arg(default_value = "alert.wav")]
        output: PathBuf,
    },
}

/// Stand-in identities for offline runs
const OFFLINE_GUILD: u64 = 1;
const OFFLINE_USER: u64 = 1;

fn offline_channel() -> VoiceChannelRef {
    VoiceChannelRef {
        channel_id: ChannelId(1),
        text_channel_id: ChannelId(2),
        can_connect: true,
        can_speak: true,
    }
}

/// Config file if present, otherwise built-in monitor defaults
fn monitor_config(path: &str) -> MonitorConfig {
    match Config::load(path) {
        Ok(cfg) => cfg.monitor,
        Err(e) => {
            info!("Using default monitor settings ({:#})", e);
            MonitorConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => serve(&cli.config).await,
        Commands::Replay {
            file,
            threshold,
            cooldown,
        } => replay(&cli.config, file, threshold, cooldown).await,
        Commands::Calibrate { file, duration } => calibrate(&cli.config, file, duration).await,
        Commands::AlertTone { output } => {
            let tone = monitor_config(&cli.config).alert;
            write_wav(&output, &tone.synthesize(), tone.sample_rate, tone.channels)?;
            info!("Alert tone written to {}", output.display());
            Ok(())
        }
    }
}

async fn serve(config_path: &str) -> Result<()> {
    let cfg = Config::load(config_path)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    let client =
        Arc::new(NatsClient::connect(&cfg.nats.url, cfg.nats.subject_prefix.clone()).await?);

    let manager = VolumeSessionManager::new(
        cfg.monitor,
        Arc::new(NatsVoiceGateway::new(Arc::clone(&client))),
        Arc::new(NatsNotifier::new(Arc::clone(&client))),
    );
    let state = AppState::new(manager.clone(), Arc::new(NatsProgress::new(client)));

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP API listening on {}", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down");
        })
        .await
        .context("HTTP server failed")?;

    let stopped = manager.stop_all().await;
    info!("Stopped {} active sessions", stopped.len());

    Ok(())
}

async fn replay(config_path: &str, file: PathBuf, threshold: u8, cooldown: u64) -> Result<()> {
    let audio = AudioFile::open(&file)?;
    let gateway = Arc::new(ReplayGateway::new(&audio, UserId(OFFLINE_USER)));
    let length = gateway.duration();

    let manager = VolumeSessionManager::new(
        monitor_config(config_path),
        gateway.clone(),
        Arc::new(LogNotifier),
    );

    let key = SessionKey::new(OFFLINE_GUILD, OFFLINE_USER);
    let options = MonitorOptions {
        threshold: Some(threshold),
        cooldown_secs: Some(cooldown),
    };
    manager.start(key, Some(offline_channel()), options).await?;

    info!("Replaying {:.1}s of audio", length.as_secs_f64());
    tokio::time::sleep(length + Duration::from_millis(200)).await;

    let summary = manager.stop(key).await?;
    println!(
        "Warnings: {} ({} alerts played) over {:.1}s",
        summary.warning_count,
        gateway.alerts_played(),
        summary.elapsed_secs
    );

    Ok(())
}

async fn calibrate(config_path: &str, file: PathBuf, duration: u64) -> Result<()> {
    let audio = AudioFile::open(&file)?;
    let gateway = Arc::new(ReplayGateway::new(&audio, UserId(OFFLINE_USER)));

    let manager =
        VolumeSessionManager::new(monitor_config(config_path), gateway, Arc::new(LogNotifier));

    let key = SessionKey::new(OFFLINE_GUILD, OFFLINE_USER);
    let outcome = manager
        .calibrate(key, Some(offline_channel()), Some(duration), Arc::new(LogProgress))
        .await?;

    match outcome {
        CalibrationOutcome::Summary(s) => {
            println!("Average: {:.1}%", s.average);
            println!("Peak:    {:.1}%", s.peak);
            println!("Minimum: {:.1}%", s.min);
            println!(
                "Suggested thresholds: sensitive {}%, normal {}%, relaxed {}%",
                s.sensitive, s.normal, s.relaxed
            );
        }
        CalibrationOutcome::NoAudioDetected { duration_secs } => {
            println!("No audio above the noise floor in {}s", duration_secs);
        }
    }

    Ok(())
}
