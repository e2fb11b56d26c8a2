//! Panorama CLI
//!
//! Command-line interface for controlling the Panorama overview.
//!
//! Commands are sent to the daemon as one JSON line over its Unix socket;
//! the daemon's JSON response is printed.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use panorama_ipc::{socket_path, IpcCommand, IpcResponse, MAX_IPC_MESSAGE_SIZE};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "panorama-cli")]
#[command(author, version, about = "Control the Panorama workspace overview")]
struct Cli {
    /// Daemon socket, instead of $PANORAMA_SOCKET or the runtime directory
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the overview, or close it if it is open
    Toggle,
    /// Open the overview
    Activate,
    /// Close the overview
    Deactivate,
    /// Focus a workspace inside the overview
    Navigate {
        /// Row-major workspace index
        workspace: usize,
    },
    /// Switch to a workspace
    Switch {
        /// Row-major workspace index
        workspace: usize,
    },
    /// Synthesize pointer input
    Pointer {
        #[command(subcommand)]
        action: PointerAction,
    },
    /// Query overview state
    Query,
    /// Reload configuration
    Reload,
    /// Stop the daemon
    Stop,
}

#[derive(Subcommand)]
enum PointerAction {
    /// Move the pointer to global coordinates
    Move { x: f64, y: f64 },
    /// Press and release the primary button
    Click { x: f64, y: f64 },
}

/// Requests to send, in order, for a parsed command line.
fn requests(command: &Commands) -> Vec<IpcCommand> {
    match *command {
        Commands::Toggle => vec![IpcCommand::Toggle],
        Commands::Activate => vec![IpcCommand::Activate],
        Commands::Deactivate => vec![IpcCommand::Deactivate],
        Commands::Navigate { workspace } => vec![IpcCommand::NavigateTo { workspace }],
        Commands::Switch { workspace } => vec![IpcCommand::SwitchTo { workspace }],
        Commands::Pointer {
            action: PointerAction::Move { x, y },
        } => vec![IpcCommand::PointerMotion { x, y }],
        Commands::Pointer {
            action: PointerAction::Click { x, y },
        } => vec![
            IpcCommand::PointerMotion { x, y },
            IpcCommand::PointerButton { x, y, pressed: true },
            IpcCommand::PointerButton {
                x,
                y,
                pressed: false,
            },
        ],
        Commands::Query => vec![IpcCommand::QueryState],
        Commands::Reload => vec![IpcCommand::Reload],
        Commands::Stop => vec![IpcCommand::Stop],
    }
}

/// Send one command and read one response line.
async fn send(socket: &Path, cmd: &IpcCommand) -> Result<IpcResponse> {
    let stream = UnixStream::connect(socket).await.with_context(|| {
        format!(
            "Failed to connect to {} (is the panorama daemon running?)",
            socket.display()
        )
    })?;
    let (reader, mut writer) = stream.into_split();

    let request = serde_json::to_string(cmd)? + "\n";
    writer.write_all(request.as_bytes()).await?;

    let mut reader = BufReader::new(reader.take(MAX_IPC_MESSAGE_SIZE as u64));
    let mut line = String::new();
    let n = tokio::time::timeout(RESPONSE_TIMEOUT, reader.read_line(&mut line))
        .await
        .context("Timed out waiting for the daemon")??;
    if n == 0 {
        bail!("Daemon closed the connection without responding");
    }

    serde_json::from_str(line.trim()).context("Malformed response from daemon")
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let socket = cli.socket.clone().unwrap_or_else(socket_path);

    let mut failed = false;
    for cmd in requests(&cli.command) {
        let response = send(&socket, &cmd).await?;
        println!("{}", serde_json::to_string_pretty(&response)?);
        if let IpcResponse::Error { .. } = response {
            failed = true;
            break;
        }
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Vec<IpcCommand> {
        let cli = Cli::try_parse_from(args).unwrap();
        requests(&cli.command)
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(parse(&["panorama-cli", "toggle"]), vec![IpcCommand::Toggle]);
        assert_eq!(parse(&["panorama-cli", "query"]), vec![IpcCommand::QueryState]);
        assert_eq!(
            parse(&["panorama-cli", "navigate", "2"]),
            vec![IpcCommand::NavigateTo { workspace: 2 }]
        );
        assert_eq!(
            parse(&["panorama-cli", "switch", "0"]),
            vec![IpcCommand::SwitchTo { workspace: 0 }]
        );
    }

    #[test]
    fn test_click_is_motion_press_release() {
        let cmds = parse(&["panorama-cli", "pointer", "click", "100", "250.5"]);
        assert_eq!(
            cmds,
            vec![
                IpcCommand::PointerMotion { x: 100.0, y: 250.5 },
                IpcCommand::PointerButton {
                    x: 100.0,
                    y: 250.5,
                    pressed: true
                },
                IpcCommand::PointerButton {
                    x: 100.0,
                    y: 250.5,
                    pressed: false
                },
            ]
        );
    }

    #[test]
    fn test_socket_override() {
        let cli = Cli::try_parse_from(["panorama-cli", "--socket", "/tmp/p.sock", "stop"]).unwrap();
        assert_eq!(cli.socket, Some(PathBuf::from("/tmp/p.sock")));
    }

    #[test]
    fn test_invalid_workspace_rejected() {
        assert!(Cli::try_parse_from(["panorama-cli", "navigate", "-1"]).is_err());
    }
}
