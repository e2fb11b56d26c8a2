//! Daemon state: the headless session, the overview plugin and the GPU
//! context, plus IPC command dispatch.

use crate::config::Config;
use panorama_core::host::Host;
use panorama_core::{
    GpuContext, GridSize, OutputId, OverviewError, OverviewPlugin, Point, Rect, TextureId,
    WorkspaceCoord,
};
use panorama_ipc::{IpcCommand, IpcResponse, OutputState};
use panorama_platform_headless::{HeadlessHost, HeadlessSession, RecordingGpu, StaticPanel};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

pub struct DaemonState {
    pub config: Config,
    /// File the configuration came from, re-read on reload.
    config_path: Option<PathBuf>,
    session: HeadlessSession,
    plugin: OverviewPlugin,
    gpu: RecordingGpu,
    /// Output that commands without coordinates act on.
    primary: OutputId,
    wallpaper: Option<TextureId>,
}

impl DaemonState {
    pub fn new(config: Config, config_path: Option<PathBuf>) -> Self {
        let outputs = config.session_outputs();
        let primary = outputs.first().map_or(1, |o| o.id);

        let mut session = HeadlessSession::new();
        let mut plugin = OverviewPlugin::new(config.overview.clone());
        for output in &outputs {
            let host = HeadlessHost::new(
                output.id,
                Rect::new(output.x, output.y, output.width, output.height),
                GridSize::new(output.columns, output.rows),
            )
            .with_scale(output.scale);
            session.add_output(host);
            plugin.add_output(output.id, Box::new(StaticPanel::new(config.overview.panel_height)));
            info!(
                "Output {}: {}x{} at ({}, {}), {}x{} workspaces",
                output.id, output.width, output.height, output.x, output.y, output.columns, output.rows
            );
        }

        let mut seeded = 0;
        for window in &config.windows {
            let id = window.output.unwrap_or(primary);
            let host = match session.output_mut(id) {
                Ok(host) => host,
                Err(e) => {
                    warn!("Skipping window {:?}: {}", window.title, e);
                    continue;
                }
            };
            let workspace = WorkspaceCoord::new(window.workspace[0], window.workspace[1]);
            let geometry = Rect::new(window.x, window.y, window.width, window.height);
            match host.add_window(workspace, geometry, &window.app_id, &window.title) {
                Ok(_) => seeded += 1,
                Err(e) => warn!("Skipping window {:?}: {}", window.title, e),
            }
        }
        info!("Seeded {} window(s)", seeded);

        let mut state = Self {
            config,
            config_path,
            session,
            plugin,
            gpu: RecordingGpu::new(),
            primary,
            wallpaper: None,
        };
        state.load_wallpaper();
        state
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.config.behavior.frame_interval_ms)
    }

    /// Register the configured wallpaper as a texture the size of the
    /// primary output.
    fn load_wallpaper(&mut self) {
        if let Some(texture) = self.wallpaper.take() {
            self.gpu.release_texture(texture);
        }
        let Some(path) = self.config.appearance.wallpaper.clone() else {
            return;
        };
        if !path.exists() {
            warn!("Wallpaper {} not found, drawing the plain background", path.display());
            return;
        }
        let Ok(host) = self.session.output(self.primary) else {
            return;
        };
        let size = host.output_geometry().size();
        match self.gpu.allocate_texture(size) {
            Ok(texture) => {
                info!("Wallpaper {} registered", path.display());
                self.wallpaper = Some(texture);
            }
            Err(e) => warn!("Wallpaper {} unavailable: {}", path.display(), e),
        }
    }

    /// Whether any output shows an overview.
    pub fn is_active(&self) -> bool {
        self.plugin
            .output_ids()
            .into_iter()
            .filter_map(|id| self.plugin.output(id))
            .any(|o| o.overview().is_active())
    }

    /// Run one frame: tick every output, then render. Returns the number of
    /// frames produced.
    pub fn frame(&mut self, delta: Duration) -> usize {
        self.plugin.pre_render(&mut self.session, delta);
        let frames = self
            .plugin
            .render(&mut self.session, &mut self.gpu, self.wallpaper, None);
        for (id, frame) in &frames {
            trace!("Output {}: {} draw commands", id, frame.commands.len());
        }
        self.gpu.take_ops();
        frames.len()
    }

    pub fn handle_command(&mut self, cmd: IpcCommand) -> IpcResponse {
        debug!("Handling command: {:?}", cmd);
        let primary = self.primary;
        let result = match cmd {
            IpcCommand::Toggle => self
                .plugin
                .with_output(&mut self.session, primary, |o, host| o.toggle(host)),
            IpcCommand::Activate => self
                .plugin
                .with_output(&mut self.session, primary, |o, host| o.activate(host)),
            IpcCommand::Deactivate => self
                .plugin
                .with_output(&mut self.session, primary, |o, host| o.deactivate(host)),
            IpcCommand::NavigateTo { workspace } => self
                .plugin
                .with_output(&mut self.session, primary, |o, host| {
                    o.navigate_to(host, workspace)
                })
                .and_then(|r| r),
            IpcCommand::SwitchTo { workspace } => self
                .plugin
                .with_output(&mut self.session, primary, |o, host| {
                    o.switch_to(host, workspace)
                })
                .and_then(|r| r),
            IpcCommand::PointerMotion { x, y } => {
                self.plugin
                    .handle_motion(&mut self.session, Point::new(x, y));
                Ok(())
            }
            IpcCommand::PointerButton { x, y, pressed } => {
                self.plugin
                    .handle_button(&mut self.session, Point::new(x, y), pressed);
                Ok(())
            }
            IpcCommand::QueryState => return self.query_state(),
            IpcCommand::Reload => return self.reload(),
            IpcCommand::Stop => {
                info!("Stop requested");
                Ok(())
            }
        };

        match result {
            Ok(()) => IpcResponse::Ok,
            Err(e) => command_error(e),
        }
    }

    fn query_state(&self) -> IpcResponse {
        let outputs = self
            .plugin
            .output_ids()
            .into_iter()
            .filter_map(|id| {
                let output = self.plugin.output(id)?;
                let host = self.session.output(id).ok()?;
                let overview = output.overview();
                let grid = host.workspace_grid();
                let active = overview.is_active();
                Some(OutputState {
                    output: id,
                    phase: overview.phase().as_str().to_string(),
                    animating: overview.is_animating(),
                    dragging: overview.is_dragging(),
                    current_workspace: grid.index_of(host.current_workspace()),
                    focused_workspace: active.then(|| overview.focused_workspace()),
                    workspaces: grid.count(),
                    windows: if active {
                        (0..overview.workspace_count())
                            .map(|i| overview.slots(i).len())
                            .collect()
                    } else {
                        Vec::new()
                    },
                })
            })
            .collect();
        IpcResponse::OverviewState { outputs }
    }

    /// Re-read the configuration file and apply the overview options.
    /// Outputs and windows are only read at startup.
    fn reload(&mut self) -> IpcResponse {
        let loaded = match &self.config_path {
            Some(path) => Config::load_from_path(path),
            None => Config::load(),
        };
        let mut config = match loaded {
            Ok(config) => config,
            Err(e) => {
                warn!("Config reload failed: {:#}", e);
                return IpcResponse::error(format!("Failed to reload config: {:#}", e));
            }
        };
        for w in config.validate() {
            warn!("Config: {} - {}", w.field, w.message);
        }

        self.plugin.set_options(config.overview.clone());
        self.config.overview = config.overview;
        self.config.appearance = config.appearance;
        self.load_wallpaper();
        info!("Configuration reloaded");
        IpcResponse::Ok
    }

    /// Tear every output down and release all textures.
    pub fn shutdown(&mut self) {
        for id in self.plugin.output_ids() {
            self.plugin.remove_output(&mut self.session, id);
        }
        self.plugin.render(&mut self.session, &mut self.gpu, None, None);
        if let Some(texture) = self.wallpaper.take() {
            self.gpu.release_texture(texture);
        }
        let leaked = self.gpu.live_textures();
        if !leaked.is_empty() {
            warn!("{} texture(s) still allocated at shutdown", leaked.len());
        }
    }
}

fn command_error(e: OverviewError) -> IpcResponse {
    warn!("Command failed: {}", e);
    IpcResponse::error(e.to_string())
}
