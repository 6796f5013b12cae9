//! Long-lived GPU handles consumed by the frame loop.

use crate::error::{FrameError, Result};
use crate::geometry::GeometryBuffer;
use crate::uniforms::UniformRing;
use ash::vk;

/// Handles created at setup and read by every frame.
///
/// The registry is built once by the host. The driver only borrows it during
/// frames; nothing in it changes between setup and teardown except the
/// contents of the uniform ring.
pub struct ResourceRegistry<B> {
    pub render_pass: vk::RenderPass,
    /// One framebuffer per swapchain image, indexed by image index.
    pub framebuffers: Vec<vk::Framebuffer>,
    pub extent: vk::Extent2D,
    pub pipeline: vk::Pipeline,
    pub pipeline_layout: vk::PipelineLayout,
    /// One descriptor set per frame slot, each bound to that slot's uniform sub-range.
    pub descriptor_sets: Vec<vk::DescriptorSet>,
    pub geometry: GeometryBuffer,
    pub uniforms: UniformRing<B>,
}

impl<B: cadence_gpu::HostBuffer> ResourceRegistry<B> {
    /// Check the registry is sized for `frames_in_flight` slots and `image_count` images.
    pub fn validate(&self, frames_in_flight: usize, image_count: u32) -> Result<()> {
        if self.framebuffers.len() != image_count as usize {
            return Err(FrameError::Setup(format!(
                "{} framebuffers for {image_count} swapchain images",
                self.framebuffers.len()
            )));
        }
        if self.descriptor_sets.len() != frames_in_flight {
            return Err(FrameError::Setup(format!(
                "{} descriptor sets for {frames_in_flight} frame slots",
                self.descriptor_sets.len()
            )));
        }
        if self.uniforms.slots() != frames_in_flight {
            return Err(FrameError::Setup(format!(
                "uniform ring has {} slots for {frames_in_flight} frame slots",
                self.uniforms.slots()
            )));
        }
        if self.geometry.layout.index_count == 0 {
            return Err(FrameError::Setup("geometry has no indices".to_string()));
        }
        Ok(())
    }

    /// Width over height of the render extent.
    pub fn aspect(&self) -> f32 {
        if self.extent.height == 0 {
            return 1.0;
        }
        self.extent.width as f32 / self.extent.height as f32
    }
}
