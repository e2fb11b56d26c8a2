//! Integration tests for the Panorama daemon.
//!
//! The protocol tests check the wire format shared with the CLI. The
//! end-to-end test starts the real daemon binary on a private socket and
//! drives it the way `panorama-cli` does.

use panorama_ipc::{IpcCommand, IpcResponse, OutputState};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

// ============================================================================
// Protocol
// ============================================================================

#[test]
fn test_all_commands_roundtrip() {
    let commands = vec![
        IpcCommand::Toggle,
        IpcCommand::Activate,
        IpcCommand::Deactivate,
        IpcCommand::NavigateTo { workspace: 1 },
        IpcCommand::SwitchTo { workspace: 3 },
        IpcCommand::PointerMotion { x: 10.0, y: 20.5 },
        IpcCommand::PointerButton {
            x: 1.0,
            y: 2.0,
            pressed: false,
        },
        IpcCommand::QueryState,
        IpcCommand::Reload,
        IpcCommand::Stop,
    ];

    for cmd in commands {
        let json = serde_json::to_string(&cmd).expect("serialize");
        assert!(!json.contains('\n'), "command must fit on one line");
        let parsed: IpcCommand = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, cmd);
    }
}

#[test]
fn test_error_response_shape() {
    let json = serde_json::to_string(&IpcResponse::error("boom")).unwrap();
    assert_eq!(json, r#"{"status":"error","message":"boom"}"#);
}

#[test]
fn test_state_response_from_json() {
    let json = r#"{"status":"overview_state","outputs":[{"output":1,"phase":"inactive",
        "animating":false,"dragging":false,"current_workspace":2,"focused_workspace":null,
        "workspaces":4,"windows":[]}]}"#;
    let parsed: IpcResponse = serde_json::from_str(json).unwrap();
    match parsed {
        IpcResponse::OverviewState { outputs } => {
            assert_eq!(outputs.len(), 1);
            assert_eq!(outputs[0].current_workspace, 2);
            assert_eq!(outputs[0].focused_workspace, None);
        }
        other => panic!("unexpected {:?}", other),
    }
}

// ============================================================================
// End to end
// ============================================================================

/// Kills the daemon if a test fails before stopping it.
struct Daemon {
    child: Child,
    socket: PathBuf,
    config: PathBuf,
}

impl Drop for Daemon {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = std::fs::remove_file(&self.socket);
        let _ = std::fs::remove_file(&self.config);
    }
}

const CONFIG: &str = r#"
[behavior]
log_level = "warn"
frame_interval_ms = 8

[[outputs]]
id = 1
columns = 2
rows = 1

[[windows]]
workspace = [0, 0]
x = 100
y = 100
width = 900
height = 600
app_id = "org.example.Editor"

[[windows]]
workspace = [1, 0]
x = 400
y = 200
app_id = "org.example.Term"
"#;

fn start_daemon(name: &str) -> Daemon {
    let dir = std::env::temp_dir();
    let tag = format!("panorama-test-{}-{}", name, std::process::id());
    let socket = dir.join(format!("{}.sock", tag));
    let config = dir.join(format!("{}.toml", tag));
    std::fs::write(&config, CONFIG).unwrap();

    let child = Command::new(env!("CARGO_BIN_EXE_panorama"))
        .arg("--config")
        .arg(&config)
        .arg("--socket")
        .arg(&socket)
        .env_remove("RUST_LOG")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let daemon = Daemon {
        child,
        socket,
        config,
    };
    let deadline = Instant::now() + Duration::from_secs(10);
    while UnixStream::connect(&daemon.socket).is_err() {
        assert!(Instant::now() < deadline, "daemon did not come up");
        std::thread::sleep(Duration::from_millis(20));
    }
    daemon
}

fn send(socket: &Path, cmd: &IpcCommand) -> IpcResponse {
    let mut stream = UnixStream::connect(socket).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let request = serde_json::to_string(cmd).unwrap() + "\n";
    stream.write_all(request.as_bytes()).unwrap();

    let mut line = String::new();
    BufReader::new(stream).read_line(&mut line).unwrap();
    serde_json::from_str(line.trim()).unwrap()
}

fn query(socket: &Path) -> OutputState {
    match send(socket, &IpcCommand::QueryState) {
        IpcResponse::OverviewState { mut outputs } => outputs.remove(0),
        other => panic!("unexpected {:?}", other),
    }
}

fn wait_for_phase(socket: &Path, phase: &str) -> OutputState {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let state = query(socket);
        if state.phase == phase {
            return state;
        }
        assert!(
            Instant::now() < deadline,
            "stuck in {} waiting for {}",
            state.phase,
            phase
        );
        std::thread::sleep(Duration::from_millis(20));
    }
}

#[test]
fn test_daemon_overview_session() {
    let mut daemon = start_daemon("session");
    let socket = daemon.socket.clone();

    let initial = query(&socket);
    assert_eq!(initial.phase, "inactive");
    assert_eq!(initial.workspaces, 2);

    assert_eq!(send(&socket, &IpcCommand::Toggle), IpcResponse::Ok);
    let active = wait_for_phase(&socket, "active");
    assert_eq!(active.windows, vec![1, 1]);
    assert_eq!(active.focused_workspace, Some(0));

    match send(&socket, &IpcCommand::NavigateTo { workspace: 5 }) {
        IpcResponse::Error { message } => assert!(message.contains("out of range")),
        other => panic!("unexpected {:?}", other),
    }

    assert_eq!(
        send(&socket, &IpcCommand::SwitchTo { workspace: 1 }),
        IpcResponse::Ok
    );
    let closed = wait_for_phase(&socket, "inactive");
    assert_eq!(closed.current_workspace, 1);

    assert_eq!(send(&socket, &IpcCommand::Stop), IpcResponse::Ok);
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if daemon.child.try_wait().unwrap().is_some() {
            break;
        }
        assert!(Instant::now() < deadline, "daemon did not stop");
        std::thread::sleep(Duration::from_millis(20));
    }
    assert!(!socket.exists());
}

#[test]
fn test_daemon_rejects_malformed_requests() {
    let daemon = start_daemon("malformed");

    let mut stream = UnixStream::connect(&daemon.socket).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    stream.write_all(b"{\"type\":\"focus_left\"}\n").unwrap();
    let mut line = String::new();
    BufReader::new(stream).read_line(&mut line).unwrap();

    match serde_json::from_str::<IpcResponse>(line.trim()).unwrap() {
        IpcResponse::Error { message } => assert!(message.starts_with("Invalid command")),
        other => panic!("unexpected {:?}", other),
    }
    // Still serving.
    assert_eq!(query(&daemon.socket).phase, "inactive");
}
