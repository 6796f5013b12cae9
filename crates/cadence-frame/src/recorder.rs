//! Command recording for one frame.

use crate::registry::ResourceRegistry;
use cadence_gpu::{CommandEncoder, HostBuffer, Result};
use ash::vk;

/// Records the fixed draw sequence for a frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CommandRecorder {
    /// Clear value for the color attachment.
    pub clear_color: [f32; 4],
}

impl Default for CommandRecorder {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl CommandRecorder {
    /// Record the frame into `cmd`, targeting `image_index` and reading slot
    /// `slot_index`'s descriptor set.
    ///
    /// # Safety
    /// `cmd` must be in the initial state (its pool reset) and every registry
    /// handle must be live.
    pub unsafe fn record<E: CommandEncoder, B: HostBuffer>(
        &self,
        encoder: &E,
        cmd: vk::CommandBuffer,
        registry: &ResourceRegistry<B>,
        image_index: u32,
        slot_index: usize,
    ) -> Result<()> {
        let framebuffer = registry.framebuffers[image_index as usize];
        let descriptor_set = registry.descriptor_sets[slot_index];
        let geometry = &registry.geometry;

        encoder.begin_commands(cmd)?;
        encoder.begin_render_pass(
            cmd,
            registry.render_pass,
            framebuffer,
            registry.extent,
            self.clear_color,
        );
        encoder.set_viewport(cmd, registry.extent);
        encoder.bind_graphics_pipeline(cmd, registry.pipeline);
        encoder.bind_vertex_buffer(cmd, geometry.buffer, geometry.layout.vertex_offset);
        encoder.bind_index_buffer(
            cmd,
            geometry.buffer,
            geometry.layout.index_offset,
            geometry.layout.index_type,
        );
        encoder.bind_descriptor_set(cmd, registry.pipeline_layout, descriptor_set);
        encoder.draw_indexed(cmd, geometry.layout.index_count);
        encoder.end_render_pass(cmd);
        encoder.end_commands(cmd)
    }

    /// Record a staging-to-device copy into `cmd`.
    ///
    /// # Safety
    /// `cmd` must be in the initial state and both buffers must be live.
    pub unsafe fn record_upload<E: CommandEncoder>(
        &self,
        encoder: &E,
        cmd: vk::CommandBuffer,
        staging: vk::Buffer,
        destination: vk::Buffer,
        regions: &[vk::BufferCopy],
    ) -> Result<()> {
        encoder.begin_commands(cmd)?;
        encoder.copy_buffer(cmd, staging, destination, regions);
        encoder.end_commands(cmd)
    }
}
