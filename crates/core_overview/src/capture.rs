//! Off-screen workspace captures.
//!
//! Each workspace of the grid gets a texture that is redrawn every frame the
//! overview is visible, so thumbnails and carousel previews always show live
//! content. Windows are drawn with whatever visual transform the host has
//! attached to them, which is how the slot layout ends up inside the texture.

use crate::geometry::{Rect, Region, Size};
use crate::gpu::{ensure_texture, GpuContext, GpuError, TextureId};
use crate::host::{GridSize, Host, WindowId, WorkspaceCoord};
use crate::scene::{RenderInstance, RenderInstruction};
use tracing::{trace, warn};

/// Bounds of a workspace relative to the origin of `current`.
pub fn workspace_bounds(
    grid: GridSize,
    current: WorkspaceCoord,
    index: usize,
    output: Size,
) -> Rect {
    let coord = grid.coord_of(index);
    Rect::new(
        (coord.x as i32 - current.x as i32) * output.width,
        (coord.y as i32 - current.y as i32) * output.height,
        output.width,
        output.height,
    )
}

#[derive(Debug)]
pub struct WorkspaceCapture {
    workspace: usize,
    /// Logical bounds relative to the current workspace origin.
    bounds: Rect,
    texture: Option<TextureId>,
    /// Pending damage, relative to `bounds`.
    damage: Region,
    /// Windows drawn into this capture, bottom first.
    content: Vec<WindowId>,
}

impl WorkspaceCapture {
    pub fn new(workspace: usize, bounds: Rect) -> Self {
        Self {
            workspace,
            bounds,
            texture: None,
            damage: Region::from_rect(Rect::from_size(bounds.size())),
            content: Vec::new(),
        }
    }

    pub fn workspace(&self) -> usize {
        self.workspace
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn texture(&self) -> Option<TextureId> {
        self.texture
    }

    pub fn damage(&self) -> &Region {
        &self.damage
    }

    pub fn content(&self) -> &[WindowId] {
        &self.content
    }

    /// Accumulate damage given relative to the current workspace origin.
    pub fn push_damage(&mut self, region: &Region) {
        for rect in region.intersect(&self.bounds).rects() {
            self.damage.add(rect.offset(-self.bounds.x, -self.bounds.y));
        }
    }

    /// Rebuild the list of windows whose centre lies in this workspace.
    pub fn refresh_content(&mut self, host: &dyn Host) {
        self.content = host
            .windows()
            .into_iter()
            .filter(|w| w.is_visible() && self.bounds.contains(w.geometry.center()))
            .map(|w| w.id)
            .collect();
    }

    /// Redraw the capture. With `full`, the whole texture is repainted;
    /// otherwise only pending damage is, and nothing happens without any.
    /// Returns whether anything was drawn.
    pub fn run(
        &mut self,
        ctx: &mut dyn GpuContext,
        host: &dyn Host,
        scale: f64,
        full: bool,
    ) -> Result<bool, GpuError> {
        let local = Rect::from_size(self.bounds.size());
        let texture = ensure_texture(ctx, &mut self.texture, local.size().to_physical(scale))?;

        let damage = if full {
            Region::from_rect(local)
        } else {
            self.damage.intersect(&local)
        };
        if damage.is_empty() {
            return Ok(false);
        }

        ctx.clear(texture, &damage)?;

        for &id in &self.content {
            let Some(info) = host.window(id) else {
                continue;
            };
            if !info.is_visible() {
                continue;
            }

            let transform = host.window_transform(id).unwrap_or_default();
            let drawn = transform
                .apply(info.geometry)
                .offset(-self.bounds.x, -self.bounds.y);
            if !damage.rects().iter().any(|r| r.intersects(&drawn)) {
                continue;
            }

            ctx.draw_window(texture, id, to_physical(drawn, scale), transform.alpha)?;
        }

        trace!(
            "Captured workspace {} ({} windows, full={})",
            self.workspace,
            self.content.len(),
            full
        );
        self.damage.clear();
        Ok(true)
    }

    pub fn release(&mut self, ctx: &mut dyn GpuContext) {
        if let Some(texture) = self.texture.take() {
            ctx.release_texture(texture);
        }
    }
}

fn to_physical(rect: Rect, scale: f64) -> Rect {
    Rect::new(
        (rect.x as f64 * scale).round() as i32,
        (rect.y as f64 * scale).round() as i32,
        (rect.width as f64 * scale).round() as i32,
        (rect.height as f64 * scale).round() as i32,
    )
}

/// Render instance of the overview scene node: one capture per workspace.
#[derive(Debug, Default)]
pub struct CaptureSet {
    captures: Vec<WorkspaceCapture>,
    /// Damage queued by the overview, taken with the host's on the next
    /// schedule.
    pending: Region,
    full_repaint: bool,
    visible: bool,
}

impl CaptureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create one capture per workspace of the grid.
    pub fn build(&mut self, grid: GridSize, current: WorkspaceCoord, output: Size) {
        self.captures = (0..grid.count())
            .map(|i| WorkspaceCapture::new(i, workspace_bounds(grid, current, i, output)))
            .collect();
        self.visible = true;
    }

    pub fn is_empty(&self) -> bool {
        self.captures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.captures.len()
    }

    pub fn get(&self, workspace: usize) -> Option<&WorkspaceCapture> {
        self.captures.get(workspace)
    }

    pub fn texture(&self, workspace: usize) -> Option<TextureId> {
        self.captures.get(workspace).and_then(|c| c.texture())
    }

    /// Queue damage relative to the entry workspace origin.
    pub fn push_damage(&mut self, region: &Region) {
        self.pending.merge(region);
    }

    /// Repaint every capture in full on the next pass, regardless of damage.
    pub fn set_full_repaint(&mut self, full: bool) {
        self.full_repaint = full;
    }

    /// Release every texture and drop the captures.
    pub fn release(&mut self, ctx: &mut dyn GpuContext) {
        for capture in &mut self.captures {
            capture.release(ctx);
        }
        self.captures.clear();
        self.pending.clear();
    }

    /// Hand back every texture without releasing it, for when the graphics
    /// context is not available.
    pub fn take_textures(&mut self) -> Vec<TextureId> {
        let textures = self
            .captures
            .iter_mut()
            .filter_map(|c| c.texture.take())
            .collect();
        self.captures.clear();
        textures
    }

    /// Run every queued instruction, logging failures instead of aborting
    /// the frame. Returns the number of captures drawn.
    pub fn render_all(
        &mut self,
        ctx: &mut dyn GpuContext,
        host: &dyn Host,
        instructions: &[RenderInstruction],
    ) -> usize {
        let mut drawn = 0;
        for instruction in instructions {
            match self.render(ctx, host, instruction) {
                Ok(()) => drawn += 1,
                Err(e) => warn!("Workspace {} capture failed: {}", instruction.target, e),
            }
        }
        drawn
    }
}

impl RenderInstance for CaptureSet {
    fn schedule_instructions(
        &mut self,
        host: &mut dyn Host,
        _output_damage: &Region,
    ) -> Vec<RenderInstruction> {
        let mut content_damage = host.take_damage();
        content_damage.merge(&std::mem::take(&mut self.pending));
        if !self.visible {
            for capture in &mut self.captures {
                capture.push_damage(&content_damage);
            }
            return Vec::new();
        }

        let mut instructions = Vec::with_capacity(self.captures.len());
        for capture in &mut self.captures {
            capture.push_damage(&content_damage);
            capture.refresh_content(host);

            let damage = if self.full_repaint {
                Region::from_rect(Rect::from_size(capture.bounds().size()))
            } else {
                capture.damage().clone()
            };
            if !damage.is_empty() {
                instructions.push(RenderInstruction {
                    target: capture.workspace(),
                    damage,
                });
            }
        }
        instructions
    }

    fn render(
        &mut self,
        ctx: &mut dyn GpuContext,
        host: &dyn Host,
        instruction: &RenderInstruction,
    ) -> Result<(), GpuError> {
        let full = self.full_repaint;
        let scale = host.output_scale();
        match self.captures.get_mut(instruction.target) {
            Some(capture) => capture.run(ctx, host, scale, full).map(|_| ()),
            None => Ok(()),
        }
    }

    fn compute_visibility(&mut self, visible: &Region) {
        self.visible = !visible.is_empty();
    }
}
