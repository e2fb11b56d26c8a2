//! GPU primitives available inside the host's graphics context.
//!
//! A `&mut dyn GpuContext` only exists for the duration of a render pass, so
//! any code path that needs to touch textures has to be reached from there.
//! Code running on input events queues its texture work instead.

use crate::geometry::{Rect, Region, Size};
use crate::host::WindowId;
use thiserror::Error;

/// Handle to a texture owned by the GPU context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GpuError {
    #[error("texture allocation failed for {width}x{height}")]
    Allocation { width: i32, height: i32 },

    #[error("unknown texture {0:?}")]
    UnknownTexture(TextureId),

    #[error("draw failed: {0}")]
    Draw(String),
}

/// Texture and draw primitives of the host renderer.
pub trait GpuContext {
    fn allocate_texture(&mut self, size: Size) -> Result<TextureId, GpuError>;

    fn resize_texture(&mut self, texture: TextureId, size: Size) -> Result<(), GpuError>;

    fn texture_size(&self, texture: TextureId) -> Option<Size>;

    fn release_texture(&mut self, texture: TextureId);

    /// Clear the damaged part of a texture before redrawing it.
    fn clear(&mut self, target: TextureId, damage: &Region) -> Result<(), GpuError>;

    /// Draw a window's content into `target` at `dest` (physical pixels of
    /// the target) with the given opacity.
    fn draw_window(
        &mut self,
        target: TextureId,
        window: WindowId,
        dest: Rect,
        alpha: f64,
    ) -> Result<(), GpuError>;
}

/// Make sure `slot` holds a texture of exactly `size`, allocating or
/// resizing as needed.
pub fn ensure_texture(
    ctx: &mut dyn GpuContext,
    slot: &mut Option<TextureId>,
    size: Size,
) -> Result<TextureId, GpuError> {
    match *slot {
        Some(texture) if ctx.texture_size(texture) == Some(size) => Ok(texture),
        Some(texture) if ctx.texture_size(texture).is_some() => {
            ctx.resize_texture(texture, size)?;
            Ok(texture)
        }
        _ => {
            let texture = ctx.allocate_texture(size)?;
            *slot = Some(texture);
            Ok(texture)
        }
    }
}
