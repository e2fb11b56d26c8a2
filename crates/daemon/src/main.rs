//! Panorama Daemon
//!
//! Runs the workspace overview against a headless compositor session.
//!
//! Responsibilities:
//! - Load configuration and seed the headless session
//! - Drive frames: tick every overview, then render it
//! - Handle IPC commands from the CLI
//!
//! Everything that touches overview state runs on one event loop; IPC
//! clients and the frame timer only send events to it.

mod config;
mod state;

use anyhow::{Context, Result};
use clap::Parser;
use config::Config;
use panorama_ipc::{socket_path, IpcCommand, IpcResponse, MAX_IPC_MESSAGE_SIZE};
use state::DaemonState;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Events that the daemon event loop processes.
enum DaemonEvent {
    /// An IPC command from a CLI client.
    IpcCommand {
        cmd: IpcCommand,
        responder: oneshot::Sender<IpcResponse>,
    },
    /// Frame timer fired.
    Frame,
    /// Shutdown signal.
    Shutdown,
}

/// IPC read timeout - clients must send within this period.
const IPC_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on the frame delta fed to the animations.
const MAX_FRAME_DELTA: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(name = "panorama")]
#[command(author, version, about = "Workspace overview daemon", long_about = None)]
struct Args {
    /// Configuration file, instead of the standard locations.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Socket path, instead of $PANORAMA_SOCKET or the runtime directory.
    #[arg(long)]
    socket: Option<PathBuf>,
}

/// Run the IPC server, accepting connections and dispatching commands.
async fn run_ipc_server(listener: UnixListener, event_tx: mpsc::Sender<DaemonEvent>) {
    loop {
        let stream = match listener.accept().await {
            Ok((stream, _)) => stream,
            Err(e) => {
                error!("Failed to accept client connection: {}", e);
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
        };
        debug!("Client connected");

        let event_tx = event_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, event_tx).await {
                warn!("Client handler error: {}", e);
            }
        });
    }
}

fn encode_response(response: &IpcResponse) -> String {
    match serde_json::to_string(response) {
        Ok(json) => json + "\n",
        Err(e) => {
            warn!("Failed to serialize IPC response: {}", e);
            "{\"status\":\"error\",\"message\":\"Internal serialization error\"}\n".to_string()
        }
    }
}

/// Handle a single client connection.
async fn handle_client(stream: UnixStream, event_tx: mpsc::Sender<DaemonEvent>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let limited_reader = reader.take(MAX_IPC_MESSAGE_SIZE as u64);
    let mut reader = BufReader::new(limited_reader);
    let mut line = String::new();

    let read_result = tokio::time::timeout(IPC_READ_TIMEOUT, reader.read_line(&mut line)).await;
    let bytes_read = match read_result {
        Ok(Ok(n)) => n,
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => return Ok(()), // Client did not send in time
    };
    if bytes_read == 0 {
        return Ok(()); // Client disconnected
    }

    let line = line.trim();
    debug!("Received command: {}", line);

    let cmd: IpcCommand = match serde_json::from_str(line) {
        Ok(cmd) => cmd,
        Err(e) => {
            let response = IpcResponse::error(format!("Invalid command: {}", e));
            writer.write_all(encode_response(&response).as_bytes()).await?;
            return Ok(());
        }
    };

    let is_stop = matches!(cmd, IpcCommand::Stop);
    let (resp_tx, resp_rx) = oneshot::channel();

    if event_tx
        .send(DaemonEvent::IpcCommand {
            cmd,
            responder: resp_tx,
        })
        .await
        .is_err()
    {
        let response = IpcResponse::error("Daemon is shutting down");
        writer.write_all(encode_response(&response).as_bytes()).await?;
        return Ok(());
    }

    let response = match resp_rx.await {
        Ok(resp) => resp,
        Err(_) => IpcResponse::error("Failed to get response from daemon"),
    };
    writer.write_all(encode_response(&response).as_bytes()).await?;

    if is_stop {
        let _ = event_tx.send(DaemonEvent::Shutdown).await;
    }

    Ok(())
}

/// Check if another daemon instance is already listening on the socket.
async fn check_already_running(socket: &Path) -> bool {
    UnixStream::connect(socket).await.is_ok()
}

fn init_logging(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to install logger")?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration first (needed for log level)
    let loaded = match &args.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    };
    let mut config = loaded.unwrap_or_else(|e| {
        // Can't use tracing yet, fall back to eprintln
        eprintln!("Failed to load configuration: {:#}. Using defaults.", e);
        Config::default()
    });

    let config_warnings = config.validate();
    init_logging(&config.behavior.log_level)?;
    for w in &config_warnings {
        warn!("Config: {} - {}", w.field, w.message);
    }

    info!("Panorama daemon starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let socket = args.socket.clone().unwrap_or_else(socket_path);
    if check_already_running(&socket).await {
        error!("Another panorama daemon is already listening on {}", socket.display());
        return Ok(());
    }
    if socket.exists() {
        std::fs::remove_file(&socket)
            .with_context(|| format!("Failed to remove stale socket {}", socket.display()))?;
    }
    let listener = UnixListener::bind(&socket)
        .with_context(|| format!("Failed to bind {}", socket.display()))?;

    let mut state = DaemonState::new(config, args.config.clone());
    let (event_tx, mut event_rx) = mpsc::channel::<DaemonEvent>(100);

    let ipc_tx = event_tx.clone();
    tokio::spawn(async move {
        run_ipc_server(listener, ipc_tx).await;
    });
    info!("IPC server listening on {}", socket.display());

    // Install Ctrl+C handler so terminal kill triggers graceful shutdown
    {
        let shutdown_tx = event_tx.clone();
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Ctrl+C received, initiating shutdown...");
                let _ = shutdown_tx.send(DaemonEvent::Shutdown).await;
            }
        });
    }

    {
        let frame_tx = event_tx.clone();
        let frame_interval = state.frame_interval();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(frame_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if frame_tx.send(DaemonEvent::Frame).await.is_err() {
                    break; // Channel closed
                }
            }
        });
    }

    info!("Ready. Use panorama-cli to send commands.");

    let mut last_frame = Instant::now();
    while let Some(event) = event_rx.recv().await {
        match event {
            DaemonEvent::IpcCommand { cmd, responder } => {
                let response = state.handle_command(cmd);
                if responder.send(response).is_err() {
                    debug!("Client disconnected before receiving IPC response");
                }
            }
            DaemonEvent::Frame => {
                let now = Instant::now();
                let delta = now.duration_since(last_frame).min(MAX_FRAME_DELTA);
                last_frame = now;
                if state.is_active() {
                    state.frame(delta);
                }
            }
            DaemonEvent::Shutdown => break,
        }
    }

    info!("Shutting down...");
    state.shutdown();
    if let Err(e) = std::fs::remove_file(&socket) {
        debug!("Failed to remove socket {}: {}", socket.display(), e);
    }
    info!("Panorama daemon stopped");
    Ok(())
}
