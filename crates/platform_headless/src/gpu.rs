//! A GPU context that keeps texture bookkeeping and records every call.

use panorama_core::{GpuContext, GpuError, Rect, Region, Size, TextureId, WindowId};
use std::collections::BTreeMap;
use tracing::trace;

/// One recorded GPU call.
#[derive(Debug, Clone, PartialEq)]
pub enum GpuOp {
    Allocate { texture: TextureId, size: Size },
    Resize { texture: TextureId, size: Size },
    Release(TextureId),
    Clear { target: TextureId, damage: Region },
    DrawWindow {
        target: TextureId,
        window: WindowId,
        dest: Rect,
        alpha: f64,
    },
}

#[derive(Debug, Default)]
pub struct RecordingGpu {
    textures: BTreeMap<TextureId, Size>,
    next_texture: u64,
    ops: Vec<GpuOp>,
    /// Make every allocation fail, to exercise degraded paths.
    pub fail_allocations: bool,
}

impl RecordingGpu {
    pub fn new() -> Self {
        Self {
            next_texture: 1,
            ..Default::default()
        }
    }

    /// Textures allocated and not yet released.
    pub fn live_textures(&self) -> Vec<TextureId> {
        self.textures.keys().copied().collect()
    }

    pub fn ops(&self) -> &[GpuOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<GpuOp> {
        std::mem::take(&mut self.ops)
    }

    /// Every window draw into `target`, in order.
    pub fn draws_into(&self, target: TextureId) -> Vec<(WindowId, Rect, f64)> {
        self.ops
            .iter()
            .filter_map(|op| match *op {
                GpuOp::DrawWindow {
                    target: t,
                    window,
                    dest,
                    alpha,
                } if t == target => Some((window, dest, alpha)),
                _ => None,
            })
            .collect()
    }

    fn check(&self, texture: TextureId) -> Result<(), GpuError> {
        if self.textures.contains_key(&texture) {
            Ok(())
        } else {
            Err(GpuError::UnknownTexture(texture))
        }
    }
}

impl GpuContext for RecordingGpu {
    fn allocate_texture(&mut self, size: Size) -> Result<TextureId, GpuError> {
        if self.fail_allocations || size.width <= 0 || size.height <= 0 {
            return Err(GpuError::Allocation {
                width: size.width,
                height: size.height,
            });
        }
        let texture = TextureId(self.next_texture.max(1));
        self.next_texture = texture.0 + 1;
        self.textures.insert(texture, size);
        self.ops.push(GpuOp::Allocate { texture, size });
        trace!("Allocated {:?} {}x{}", texture, size.width, size.height);
        Ok(texture)
    }

    fn resize_texture(&mut self, texture: TextureId, size: Size) -> Result<(), GpuError> {
        self.check(texture)?;
        self.textures.insert(texture, size);
        self.ops.push(GpuOp::Resize { texture, size });
        Ok(())
    }

    fn texture_size(&self, texture: TextureId) -> Option<Size> {
        self.textures.get(&texture).copied()
    }

    fn release_texture(&mut self, texture: TextureId) {
        if self.textures.remove(&texture).is_some() {
            self.ops.push(GpuOp::Release(texture));
        }
    }

    fn clear(&mut self, target: TextureId, damage: &Region) -> Result<(), GpuError> {
        self.check(target)?;
        self.ops.push(GpuOp::Clear {
            target,
            damage: damage.clone(),
        });
        Ok(())
    }

    fn draw_window(
        &mut self,
        target: TextureId,
        window: WindowId,
        dest: Rect,
        alpha: f64,
    ) -> Result<(), GpuError> {
        self.check(target)?;
        self.ops.push(GpuOp::DrawWindow {
            target,
            window,
            dest,
            alpha,
        });
        Ok(())
    }
}
