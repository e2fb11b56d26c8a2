//! Panorama IPC Protocol
//!
//! Shared types for daemon-CLI communication over a Unix domain socket.
//! Each request and each response is one JSON object on its own line.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable that overrides the socket location.
pub const SOCKET_ENV: &str = "PANORAMA_SOCKET";

/// File name of the socket inside the runtime directory.
pub const SOCKET_NAME: &str = "panorama.sock";

/// Maximum size of a single IPC message in bytes.
pub const MAX_IPC_MESSAGE_SIZE: usize = 64 * 1024;

/// Resolve the socket path: `$PANORAMA_SOCKET`, else
/// `$XDG_RUNTIME_DIR/panorama.sock`, else the temp dir.
pub fn socket_path() -> PathBuf {
    socket_path_from(
        std::env::var_os(SOCKET_ENV).map(PathBuf::from),
        std::env::var_os("XDG_RUNTIME_DIR").map(PathBuf::from),
    )
}

fn socket_path_from(explicit: Option<PathBuf>, runtime_dir: Option<PathBuf>) -> PathBuf {
    if let Some(path) = explicit.filter(|p| !p.as_os_str().is_empty()) {
        return path;
    }
    runtime_dir
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(std::env::temp_dir)
        .join(SOCKET_NAME)
}

/// Commands that can be sent from the CLI to the daemon.
///
/// Commands act on the primary output (the first one configured); pointer
/// coordinates are global layout coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcCommand {
    /// Open the overview, or close it if it is open.
    Toggle,
    /// Open the overview.
    Activate,
    /// Close the overview, returning to the workspace focused in it.
    Deactivate,
    /// Focus another workspace without leaving the overview.
    NavigateTo {
        /// Row-major workspace index.
        workspace: usize,
    },
    /// Switch to a workspace, through the overview's exit animation if it
    /// is open.
    SwitchTo {
        /// Row-major workspace index.
        workspace: usize,
    },

    /// Move the pointer.
    PointerMotion { x: f64, y: f64 },
    /// Press or release the primary pointer button.
    PointerButton { x: f64, y: f64, pressed: bool },

    /// Query the overview state of every output.
    QueryState,
    /// Reload configuration from file.
    Reload,
    /// Stop the daemon.
    Stop,
}

/// Overview state of one output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputState {
    pub output: u32,
    /// Phase name, e.g. `"active"` or `"deactivating"`.
    pub phase: String,
    pub animating: bool,
    pub dragging: bool,
    /// Row-major index of the host's current workspace.
    pub current_workspace: usize,
    /// Workspace focused in the overview, if it is open.
    pub focused_workspace: Option<usize>,
    pub workspaces: usize,
    /// Window count per workspace while the overview is open.
    pub windows: Vec<usize>,
}

/// Responses from the daemon to the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IpcResponse {
    /// Command executed successfully.
    Ok,
    /// Command failed with an error.
    Error {
        /// Error message describing what went wrong.
        message: String,
    },
    /// State query response.
    OverviewState { outputs: Vec<OutputState> },
}

impl IpcResponse {
    /// Create an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
