//! Crosslight Fleet Session Server
//!
//! Accepts one connection per signal-head device, serves each with its
//! own session handler, and runs the single scheduler control loop that
//! turns detected vehicle counts into per-approach output vectors.

use approach_registry::Registry;
use detection::{MockDetector, VehicleDetector};
use phase_scheduler::PhaseEngine;
use reporting::{FsReporter, HttpUploader, ReportSink, SiteLayout, Uploader};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

pub mod config;
mod control;
mod session;

pub use config::ServerConfig;

use control::{ControlCommand, ControlLoop};
use session::SessionContext;

/// Errors that stop the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] ::config::ConfigError),
}

/// Initialize logging
pub fn init_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

/// Bind the configured address and serve forever.
pub async fn run(config: ServerConfig) -> Result<(), ServerError> {
    let listener = TcpListener::bind(&config.listen_addr).await?;
    info!("listening on {}", config.listen_addr);
    run_with_listener(listener, config).await
}

/// Serve device sessions on an already-bound listener.
///
/// Spawns the scheduler control loop and the operator mode-toggle
/// watcher, then accepts connections until the listener fails.
pub async fn run_with_listener(
    listener: TcpListener,
    config: ServerConfig,
) -> Result<(), ServerError> {
    let layout = SiteLayout::new(&config.data_root, &config.site_id);
    layout.ensure().await?;

    let registry = Arc::new(Registry::new());
    let detector: Arc<dyn VehicleDetector> = Arc::new(MockDetector::new());
    let uploader = config
        .report_url
        .as_deref()
        .map(|url| Arc::new(HttpUploader::new(url, &config.site_id)) as Arc<dyn Uploader>);
    let reporter: Arc<dyn ReportSink> = Arc::new(FsReporter::new(layout.clone(), uploader));

    let engine = PhaseEngine::new(config.mode, config.scheduler.clone());
    let (command_tx, command_rx) = mpsc::channel(4);
    let control = ControlLoop::new(
        Arc::clone(&registry),
        detector,
        reporter,
        layout.clone(),
        engine,
        command_rx,
        Duration::from_millis(config.scheduler.tick_interval_ms),
    );
    tokio::spawn(control.run());
    tokio::spawn(watch_mode_toggle(command_tx));

    let ctx = SessionContext {
        registry,
        layout,
        poll_interval: config.poll_interval,
        read_timeout: config.read_timeout(),
    };
    loop {
        let (socket, peer) = listener.accept().await?;
        info!(%peer, "incoming connection");
        let ctx = ctx.clone();
        tokio::spawn(session::handle_session(socket, ctx));
    }
}

/// Operator input: a line containing `1` on stdin flips day/night mode.
async fn watch_mode_toggle(commands: mpsc::Sender<ControlCommand>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim() == "1" && commands.send(ControlCommand::ToggleMode).await.is_err() {
            break;
        }
    }
}
