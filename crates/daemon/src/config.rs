//! Configuration management for the Panorama daemon.
//!
//! Configuration is loaded from TOML files in the following locations (in order):
//! 1. the platform config dir (`~/.config/panorama/config.toml` on Linux,
//!    via `directories::ProjectDirs`)
//! 2. `~/.config/panorama/config.toml`
//! 3. `./config.toml` (current directory, for development)

use anyhow::{Context, Result};
use directories::ProjectDirs;
use panorama_core::OverviewOptions;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure for Panorama.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Overview appearance and timing.
    pub overview: OverviewOptions,
    /// Appearance configuration.
    pub appearance: AppearanceConfig,
    /// Behavior configuration.
    pub behavior: BehaviorConfig,
    /// Outputs of the headless session. One default output when empty.
    pub outputs: Vec<OutputConfig>,
    /// Windows mapped into the headless session at startup.
    pub windows: Vec<WindowConfig>,
}

/// Appearance-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppearanceConfig {
    /// Wallpaper drawn behind the overview. Decoding happens outside the
    /// daemon; the file only has to exist.
    pub wallpaper: Option<PathBuf>,
}

/// Behavior-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Interval between frames in milliseconds.
    #[serde(default = "default_frame_interval")]
    pub frame_interval_ms: u64,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            frame_interval_ms: default_frame_interval(),
        }
    }
}

/// One output of the headless session.
///
/// ```toml
/// [[outputs]]
/// id = 1
/// width = 2560
/// height = 1440
/// columns = 3
/// rows = 1
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub id: u32,

    /// Position in the global layout.
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,

    #[serde(default = "default_output_width")]
    pub width: i32,
    #[serde(default = "default_output_height")]
    pub height: i32,

    /// Output scale factor.
    #[serde(default = "default_scale")]
    pub scale: f64,

    /// Workspace grid columns.
    #[serde(default = "default_grid_side")]
    pub columns: usize,
    /// Workspace grid rows.
    #[serde(default = "default_grid_side")]
    pub rows: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            id: 1,
            x: 0,
            y: 0,
            width: default_output_width(),
            height: default_output_height(),
            scale: default_scale(),
            columns: default_grid_side(),
            rows: default_grid_side(),
        }
    }
}

/// A window mapped at startup.
///
/// ```toml
/// [[windows]]
/// workspace = [1, 0]
/// x = 100
/// y = 80
/// width = 1200
/// height = 800
/// app_id = "org.example.Editor"
/// title = "notes.txt"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Output id; the first output when omitted.
    #[serde(default)]
    pub output: Option<u32>,

    /// Workspace column and row.
    #[serde(default)]
    pub workspace: [usize; 2],

    /// Geometry relative to the workspace's top-left corner.
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    #[serde(default = "default_window_width")]
    pub width: i32,
    #[serde(default = "default_window_height")]
    pub height: i32,

    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub title: String,
}

// Default value functions for serde
fn default_log_level() -> String {
    "info".to_string()
}

fn default_frame_interval() -> u64 {
    16
}

fn default_output_width() -> i32 {
    1920
}

fn default_output_height() -> i32 {
    1080
}

fn default_scale() -> f64 {
    1.0
}

fn default_grid_side() -> usize {
    2
}

fn default_window_width() -> i32 {
    800
}

fn default_window_height() -> i32 {
    600
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const MAX_FRAME_INTERVAL_MS: u64 = 1000;

/// A value that was out of range and has been replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
}

impl ConfigWarning {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl Config {
    /// Load configuration from standard locations.
    ///
    /// Returns default config if no file is found.
    pub fn load() -> Result<Self> {
        let paths = config_paths();

        for path in &paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific path.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Outputs to create, falling back to a single default output.
    pub fn session_outputs(&self) -> Vec<OutputConfig> {
        if self.outputs.is_empty() {
            vec![OutputConfig::default()]
        } else {
            self.outputs.clone()
        }
    }

    /// Clamp out-of-range values in place and report each fix.
    pub fn validate(&mut self) -> Vec<ConfigWarning> {
        let mut warnings: Vec<ConfigWarning> = self
            .overview
            .validate()
            .into_iter()
            .map(|message| ConfigWarning::new("overview", message))
            .collect();

        let level = self.behavior.log_level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            warnings.push(ConfigWarning::new(
                "behavior.log_level",
                format!("unknown level {:?}, using \"info\"", self.behavior.log_level),
            ));
            self.behavior.log_level = default_log_level();
        } else {
            self.behavior.log_level = level;
        }

        let interval = self.behavior.frame_interval_ms;
        if !(1..=MAX_FRAME_INTERVAL_MS).contains(&interval) {
            let clamped = interval.clamp(1, MAX_FRAME_INTERVAL_MS);
            warnings.push(ConfigWarning::new(
                "behavior.frame_interval_ms",
                format!("{} out of range, using {}", interval, clamped),
            ));
            self.behavior.frame_interval_ms = clamped;
        }

        let mut seen = HashSet::new();
        let before = self.outputs.len();
        self.outputs.retain(|o| seen.insert(o.id));
        if self.outputs.len() != before {
            warnings.push(ConfigWarning::new(
                "outputs",
                format!("{} duplicate output id(s) dropped", before - self.outputs.len()),
            ));
        }

        for output in &mut self.outputs {
            let field = format!("outputs[{}]", output.id);
            if output.width <= 0 || output.height <= 0 {
                warnings.push(ConfigWarning::new(
                    &field,
                    format!(
                        "size {}x{} is invalid, using {}x{}",
                        output.width,
                        output.height,
                        default_output_width(),
                        default_output_height()
                    ),
                ));
                output.width = default_output_width();
                output.height = default_output_height();
            }
            if !(output.scale.is_finite() && output.scale > 0.0) {
                warnings.push(ConfigWarning::new(
                    &field,
                    format!("scale {} is invalid, using 1", output.scale),
                ));
                output.scale = default_scale();
            }
            if output.columns == 0 || output.rows == 0 {
                warnings.push(ConfigWarning::new(
                    &field,
                    format!(
                        "workspace grid {}x{} is empty, using at least 1x1",
                        output.columns, output.rows
                    ),
                ));
                output.columns = output.columns.max(1);
                output.rows = output.rows.max(1);
            }
        }

        warnings
    }
}

/// Get all possible config file paths in priority order.
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(proj_dirs) = ProjectDirs::from("org", "panorama", "panorama") {
        paths.push(proj_dirs.config_dir().join("config.toml"));
    }

    if let Some(home) = dirs_home() {
        let unix_style = home.join(".config").join("panorama").join("config.toml");
        if !paths.contains(&unix_style) {
            paths.push(unix_style);
        }
    }

    paths.push(PathBuf::from("config.toml"));

    paths
}

/// Get the user's home directory.
fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use panorama_core::LayoutMode;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.overview.spacing, 20);
        assert_eq!(config.overview.animation_duration_ms, 300);
        assert_eq!(config.behavior.log_level, "info");
        assert_eq!(config.behavior.frame_interval_ms, 16);
        assert!(config.appearance.wallpaper.is_none());
        assert_eq!(config.session_outputs(), vec![OutputConfig::default()]);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.overview, config.overview);
        assert_eq!(parsed.behavior.frame_interval_ms, config.behavior.frame_interval_ms);
    }

    #[test]
    fn test_config_partial_parse() {
        let toml_str = r#"
            [overview]
            spacing = 32
            layout = "carousel"

            [behavior]
            log_level = "debug"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.overview.spacing, 32);
        assert_eq!(config.overview.layout, LayoutMode::Carousel);
        assert_eq!(config.overview.preview_scale, 0.95); // default
        assert_eq!(config.behavior.log_level, "debug");
        assert_eq!(config.behavior.frame_interval_ms, 16); // default
    }

    #[test]
    fn test_outputs_and_windows_parse() {
        let toml_str = r#"
            [[outputs]]
            id = 3
            width = 2560
            height = 1440
            columns = 3
            rows = 1

            [[windows]]
            workspace = [2, 0]
            x = 40
            y = 60
            app_id = "org.example.Term"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.outputs[0].id, 3);
        assert_eq!(config.outputs[0].scale, 1.0);
        assert_eq!(config.outputs[0].columns, 3);

        let window = &config.windows[0];
        assert_eq!(window.output, None);
        assert_eq!(window.workspace, [2, 0]);
        assert_eq!((window.width, window.height), (800, 600));
        assert_eq!(window.title, "");
    }

    #[test]
    fn test_validate_clamps_and_warns() {
        let mut config = Config::default();
        config.overview.preview_scale = 3.0;
        config.behavior.log_level = "LOUD".to_string();
        config.behavior.frame_interval_ms = 0;
        config.outputs = vec![
            OutputConfig {
                width: 0,
                columns: 0,
                ..Default::default()
            },
            OutputConfig::default(),
        ];

        let warnings = config.validate();
        let fields: Vec<&str> = warnings.iter().map(|w| w.field.as_str()).collect();
        assert!(fields.contains(&"overview"));
        assert!(fields.contains(&"behavior.log_level"));
        assert!(fields.contains(&"behavior.frame_interval_ms"));
        assert!(fields.contains(&"outputs"));
        assert!(fields.contains(&"outputs[1]"));

        assert_eq!(config.overview.preview_scale, 1.0);
        assert_eq!(config.behavior.log_level, "info");
        assert_eq!(config.behavior.frame_interval_ms, 1);
        assert_eq!(config.outputs.len(), 1);
        assert_eq!(config.outputs[0].width, 1920);
        assert_eq!(config.outputs[0].columns, 1);
    }

    #[test]
    fn test_valid_config_has_no_warnings() {
        let mut config = Config::default();
        config.behavior.log_level = "WARN".to_string();
        assert!(config.validate().is_empty());
        assert_eq!(config.behavior.log_level, "warn");
    }

    #[test]
    fn test_load_from_missing_path_fails() {
        let err = Config::load_from_path(Path::new("/nonexistent/panorama.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_config_paths_not_empty() {
        let paths = config_paths();
        assert!(!paths.is_empty());
        assert_eq!(paths.last(), Some(&PathBuf::from("config.toml")));
    }
}
