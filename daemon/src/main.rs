//! satela-daemon: Background daemon for the Satela voice command assistant
//!
//! This daemon provides:
//! - Wake phrase detection on recognized speech
//! - Explicit dialogue state machine (idle, listening, thinking, speaking)
//! - Rule-based command interpretation with spoken replies
//! - In-memory command history
//! - IPC server for session controls and state notifications
//!
//! Speech recognition and synthesis are external: transcripts arrive on
//! stdin or through IPC, and replies are logged or handed to a configured
//! synthesizer program.

mod config;
mod events;
mod history;
mod interpreter;
mod ipc;
mod lifecycle;
mod session;
mod state;
mod synth;
mod transcript;
mod wake;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{Config, SourceKind};
use crate::events::StateEvent;
use crate::ipc::Server;
use crate::lifecycle::ShutdownSignal;
use crate::session::{Session, SessionHandle};
use crate::synth::{CommandSynthesizer, LogSynthesizer, ResponseSynthesizer};
use crate::transcript::{ExternalSource, LineSource, TranscriptSource, UnsupportedSource};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "satela-daemon starting"
    );

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;
    config.ensure_dirs().context("failed to create data directory")?;
    info!(?config.socket_path, source = ?config.source, "configuration loaded");

    // Create shutdown signal handler
    let shutdown = ShutdownSignal::new();
    let cancel = CancellationToken::new();

    // Session -> IPC subscribers and the event log below
    let (event_tx, _event_rx) = broadcast::channel::<StateEvent>(64);

    let session = Session::new(
        config.session_settings(),
        build_source(config.source),
        build_synthesizer(config.synth_command.as_deref()),
        event_tx.clone(),
    )
    .context("invalid session settings")?;

    let (handle, input_rx) = SessionHandle::channel(event_tx.clone());
    let session_task = tokio::spawn(session.run(input_rx, cancel.child_token()));

    if config.auto_start {
        match handle.start_session().await {
            Ok(()) => info!("microphone on"),
            Err(e) => warn!(%e, "continuing with microphone off"),
        }
    }

    let server = Server::new(&config.socket_path, handle.clone())?;

    let mut log_event_rx = event_tx.subscribe();

    info!("daemon initialized, entering main loop");

    tokio::select! {
        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Log state events
        _ = async {
            loop {
                match log_event_rx.recv().await {
                    Ok(event) => info!(%event, "state event"),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "state event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        } => {
            info!("state event logger exited");
        }

        // Wait for shutdown signal
        result = shutdown.wait() => {
            match result {
                Ok(()) => info!("shutdown signal received"),
                Err(e) => error!(?e, "failed to register signal handlers"),
            }
        }
    }

    // Cleanup
    info!("shutting down...");

    cancel.cancel();
    if let Err(e) = session_task.await {
        error!(?e, "session task failed");
    }
    server.shutdown().await;

    info!("satela-daemon stopped");

    Ok(())
}

fn build_source(kind: SourceKind) -> Box<dyn TranscriptSource> {
    match kind {
        SourceKind::Stdin => Box::new(LineSource::stdin()),
        SourceKind::External => Box::new(ExternalSource::new()),
        SourceKind::None => Box::new(UnsupportedSource),
    }
}

fn build_synthesizer(command_line: Option<&str>) -> Box<dyn ResponseSynthesizer> {
    match command_line.and_then(CommandSynthesizer::parse) {
        Some(synth) => {
            info!(
                program = synth.program(),
                args = ?synth.args(),
                "speaking through external synthesizer"
            );
            Box::new(synth)
        }
        None => Box::new(LogSynthesizer),
    }
}
