//! Platform-agnostic workspace overview for a compositor.
//!
//! On activation every window of every workspace animates into a grid; the
//! user can browse workspaces through thumbnails or a carousel of large
//! previews, drag windows between workspaces, and click to leave. This crate
//! holds the state machine and the off-screen compositing pipeline; the host
//! compositor plugs in through the traits in [`host`] and [`gpu`].
//!
//! Everything here is single-threaded: input handlers and the per-frame
//! [`OutputOverview::pre_render`] mutate state, the render pass reads it.

pub mod animation;
pub mod capture;
pub mod compositor;
pub mod drag;
pub mod geometry;
pub mod gpu;
pub mod host;
pub mod layout;
pub mod options;
pub mod output;
pub mod overview;
pub mod plugin;
pub mod scene;
pub mod slot;

pub use animation::{AnimatedRect, AnimatedScalar, BezierCurve, Easing, Timing};
pub use capture::{CaptureSet, WorkspaceCapture};
pub use compositor::{compose, Color, DrawCommand, Frame, FrameResources};
pub use drag::{DragSession, DropTarget};
pub use geometry::{Point, Rect, Region, Size};
pub use gpu::{GpuContext, GpuError, TextureId};
pub use host::{
    GridSize, Host, IconProvider, NodeId, OutputId, OutputLayout, StatusPanel, TransformHandle,
    VisualTransform, WindowId, WindowInfo, WorkspaceCoord,
};
pub use layout::{choose_grid, GridShape, ScreenLayout, ScreenMapping};
pub use options::{LayoutMode, OverviewOptions};
pub use output::OutputOverview;
pub use overview::{Overview, Phase};
pub use plugin::OverviewPlugin;
pub use scene::{RenderInstance, RenderInstruction};
pub use slot::{SlotDragState, WindowSlot};

use thiserror::Error;

/// Errors returned by overview operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OverviewError {
    #[error("workspace {index} out of range ({count} workspaces)")]
    WorkspaceOutOfRange { index: usize, count: usize },

    #[error("unknown output {0}")]
    UnknownOutput(OutputId),

    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),
}
