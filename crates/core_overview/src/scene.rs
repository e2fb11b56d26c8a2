//! Render-instance protocol used by the host's render-pass scheduler.
//!
//! A scene node owns exactly one render instance. The scheduler calls
//! [`RenderInstance::compute_visibility`] first, then
//! [`RenderInstance::schedule_instructions`] to learn what needs drawing, and
//! finally [`RenderInstance::render`] once per returned instruction while the
//! graphics context is current.

use crate::geometry::Region;
use crate::gpu::{GpuContext, GpuError};
use crate::host::Host;

/// One unit of work queued by a render instance for the current pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderInstruction {
    /// Index of the sub-instance the work belongs to.
    pub target: usize,
    /// Region to repaint, in the coordinate space of that sub-instance.
    pub damage: Region,
}

pub trait RenderInstance {
    /// Queue work for this pass. `output_damage` is the output-local region
    /// the scheduler is about to repaint.
    fn schedule_instructions(
        &mut self,
        host: &mut dyn Host,
        output_damage: &Region,
    ) -> Vec<RenderInstruction>;

    /// Execute one queued instruction inside the graphics context.
    fn render(
        &mut self,
        ctx: &mut dyn GpuContext,
        host: &dyn Host,
        instruction: &RenderInstruction,
    ) -> Result<(), GpuError>;

    /// Tell the instance which output-local region of it is visible.
    fn compute_visibility(&mut self, visible: &Region);
}
