//! Top-level registry of per-output overview controllers.

use crate::compositor::{Frame, FrameResources};
use crate::geometry::Point;
use crate::gpu::{GpuContext, TextureId};
use crate::host::{Host, IconProvider, OutputId, OutputLayout, StatusPanel};
use crate::options::OverviewOptions;
use crate::output::OutputOverview;
use crate::OverviewError;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};

/// Owns one [`OutputOverview`] per output. Outputs come and go through
/// [`OverviewPlugin::add_output`] and [`OverviewPlugin::remove_output`].
pub struct OverviewPlugin {
    options: OverviewOptions,
    outputs: BTreeMap<OutputId, OutputOverview>,
    /// Textures of removed outputs, released on the next render pass.
    orphaned: Vec<TextureId>,
}

impl OverviewPlugin {
    pub fn new(options: OverviewOptions) -> Self {
        Self {
            options,
            outputs: BTreeMap::new(),
            orphaned: Vec::new(),
        }
    }

    pub fn options(&self) -> &OverviewOptions {
        &self.options
    }

    /// Apply new options to every output.
    pub fn set_options(&mut self, options: OverviewOptions) {
        for output in self.outputs.values_mut() {
            output.set_options(options.clone());
        }
        self.options = options;
    }

    pub fn add_output(&mut self, id: OutputId, panel: Box<dyn StatusPanel>) {
        if self.outputs.contains_key(&id) {
            warn!("Output {} added twice, keeping the existing overview", id);
            return;
        }
        self.outputs
            .insert(id, OutputOverview::new(id, self.options.clone(), panel));
        info!("Overview attached to output {}", id);
    }

    /// Tear down the overview of an output. `layout` must still know the
    /// output so that transforms and scene nodes can be cleaned up.
    pub fn remove_output(&mut self, layout: &mut dyn OutputLayout, id: OutputId) -> bool {
        let Some(mut output) = self.outputs.remove(&id) else {
            return false;
        };
        match layout.host_mut(id) {
            Some(host) => self.orphaned.extend(output.shutdown(host)),
            None => warn!("Output {} removed without a host, skipping cleanup", id),
        }
        info!("Overview detached from output {}", id);
        true
    }

    pub fn output(&self, id: OutputId) -> Option<&OutputOverview> {
        self.outputs.get(&id)
    }

    pub fn output_ids(&self) -> Vec<OutputId> {
        self.outputs.keys().copied().collect()
    }

    /// Run `f` against an output's controller and its host.
    pub fn with_output<R>(
        &mut self,
        layout: &mut dyn OutputLayout,
        id: OutputId,
        f: impl FnOnce(&mut OutputOverview, &mut dyn Host) -> R,
    ) -> Result<R, OverviewError> {
        let output = self
            .outputs
            .get_mut(&id)
            .ok_or(OverviewError::UnknownOutput(id))?;
        let host = layout
            .host_mut(id)
            .ok_or(OverviewError::UnknownOutput(id))?;
        Ok(f(output, host))
    }

    pub fn toggle(&mut self, layout: &mut dyn OutputLayout, id: OutputId) -> Result<(), OverviewError> {
        self.with_output(layout, id, |output, host| output.toggle(host))
    }

    /// Output that should receive a pointer event at `point`: the one
    /// holding a press or drag, else the one under the pointer.
    fn pointer_target(&self, layout: &dyn OutputLayout, point: Point) -> Option<OutputId> {
        self.outputs
            .values()
            .find(|o| o.has_pointer_grab())
            .map(OutputOverview::id)
            .or_else(|| layout.output_at(point))
            .filter(|id| self.outputs.contains_key(id))
    }

    /// Pointer motion in global coordinates.
    pub fn handle_motion(&mut self, layout: &mut dyn OutputLayout, point: Point) -> bool {
        let Some(id) = self.pointer_target(layout, point) else {
            return false;
        };
        self.with_output(layout, id, |output, host| {
            let origin = host.output_geometry();
            let local = Point::new(point.x - origin.x as f64, point.y - origin.y as f64);
            output.handle_motion(host, local)
        })
        .unwrap_or(false)
    }

    /// Pointer button in global coordinates.
    pub fn handle_button(&mut self, layout: &mut dyn OutputLayout, point: Point, pressed: bool) -> bool {
        let Some(id) = self.pointer_target(layout, point) else {
            return false;
        };
        self.with_output(layout, id, |output, host| {
            let origin = host.output_geometry();
            let local = Point::new(point.x - origin.x as f64, point.y - origin.y as f64);
            output.handle_button(host, local, pressed)
        })
        .unwrap_or(false)
    }

    /// Tick every output. Returns whether any output wants another frame.
    pub fn pre_render(&mut self, layout: &mut dyn OutputLayout, delta: Duration) -> bool {
        let mut wants_frame = false;
        for (id, output) in self.outputs.iter_mut() {
            if let Some(host) = layout.host_mut(*id) {
                wants_frame |= output.pre_render(host, delta);
            }
        }
        wants_frame
    }

    /// Render every output with a visible overview.
    pub fn render(
        &mut self,
        layout: &mut dyn OutputLayout,
        ctx: &mut dyn GpuContext,
        wallpaper: Option<TextureId>,
        icons: Option<&dyn IconProvider>,
    ) -> Vec<(OutputId, Frame)> {
        for texture in self.orphaned.drain(..) {
            ctx.release_texture(texture);
        }

        let mut frames = Vec::new();
        for (id, output) in self.outputs.iter_mut() {
            let Some(host) = layout.host_mut(*id) else {
                continue;
            };
            let resources = FrameResources {
                wallpaper,
                panel: None,
                icons,
            };
            if let Some(frame) = output.render(host, ctx, resources) {
                frames.push((*id, frame));
            }
        }
        frames
    }
}
