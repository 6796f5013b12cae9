//! Vulkan implementation of the frame-loop collaborator traits.

use crate::context::{GpuContext, QueueFamilyIndices};
use crate::error::{GpuError, Result};
use crate::layer::{CommandEncoder, DeviceLayer, QueueKind, SubmitInfo};
use ash::vk;
use std::sync::Arc;

/// Logical device view handed to the frame driver.
///
/// Shares the device with the [`GpuContext`] it was created from and must be
/// dropped before that context.
pub struct VulkanDevice {
    device: Arc<ash::Device>,
    queue_families: QueueFamilyIndices,
    queues: [vk::Queue; QueueKind::COUNT],
    min_uniform_alignment: u64,
}

impl VulkanDevice {
    /// Create a device view from a GPU context.
    pub fn new(gpu: &GpuContext) -> Self {
        Self {
            device: gpu.device.clone(),
            queue_families: gpu.queue_families,
            queues: QueueKind::ALL.map(|kind| gpu.queue(kind)),
            min_uniform_alignment: gpu
                .capabilities()
                .min_uniform_buffer_offset_alignment
                .max(1),
        }
    }

    /// Raw ash device.
    pub fn raw(&self) -> &ash::Device {
        &self.device
    }
}

impl DeviceLayer for VulkanDevice {
    fn graphics_queue(&self) -> vk::Queue {
        self.queues[QueueKind::Graphics.index()]
    }

    fn present_queue(&self) -> vk::Queue {
        // Presentation support is checked on the graphics family at surface creation
        self.queues[QueueKind::Graphics.index()]
    }

    fn queue(&self, kind: QueueKind) -> vk::Queue {
        self.queues[kind.index()]
    }

    fn min_uniform_alignment(&self) -> u64 {
        self.min_uniform_alignment
    }

    unsafe fn create_semaphore(&self) -> Result<vk::Semaphore> {
        Ok(self
            .device
            .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)?)
    }

    unsafe fn create_fence(&self, signaled: bool) -> Result<vk::Fence> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        Ok(self
            .device
            .create_fence(&vk::FenceCreateInfo::default().flags(flags), None)?)
    }

    unsafe fn create_command_pool(&self, kind: QueueKind) -> Result<vk::CommandPool> {
        // Buffers are re-recorded every frame and reset through their pool
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(self.queue_families.get(kind))
            .flags(vk::CommandPoolCreateFlags::TRANSIENT);
        Ok(self.device.create_command_pool(&create_info, None)?)
    }

    unsafe fn allocate_command_buffer(&self, pool: vk::CommandPool) -> Result<vk::CommandBuffer> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        self.device
            .allocate_command_buffers(&alloc_info)?
            .pop()
            .ok_or_else(|| GpuError::InvalidState("No command buffer allocated".to_string()))
    }

    unsafe fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> Result<()> {
        self.device.wait_for_fences(&[fence], true, timeout_ns)?;
        Ok(())
    }

    unsafe fn fence_signaled(&self, fence: vk::Fence) -> Result<bool> {
        Ok(self.device.get_fence_status(fence)?)
    }

    unsafe fn reset_fence(&self, fence: vk::Fence) -> Result<()> {
        self.device.reset_fences(&[fence])?;
        Ok(())
    }

    unsafe fn reset_command_pool(&self, pool: vk::CommandPool) -> Result<()> {
        self.device
            .reset_command_pool(pool, vk::CommandPoolResetFlags::empty())?;
        Ok(())
    }

    unsafe fn submit(&self, queue: vk::Queue, info: &SubmitInfo<'_>) -> Result<()> {
        let (wait_semaphores, wait_stages): (Vec<_>, Vec<_>) = info.wait.into_iter().unzip();
        let signal_semaphores: Vec<_> = info.signal.into_iter().collect();

        let submit_info = vk::SubmitInfo::default()
            .command_buffers(info.command_buffers)
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .signal_semaphores(&signal_semaphores);

        self.device.queue_submit(queue, &[submit_info], info.fence)?;
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.device.device_wait_idle()?;
        }
        Ok(())
    }

    unsafe fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        self.device.destroy_semaphore(semaphore, None);
    }

    unsafe fn destroy_fence(&self, fence: vk::Fence) {
        self.device.destroy_fence(fence, None);
    }

    unsafe fn destroy_command_pool(&self, pool: vk::CommandPool) {
        self.device.destroy_command_pool(pool, None);
    }
}

impl CommandEncoder for VulkanDevice {
    unsafe fn begin_commands(&self, cmd: vk::CommandBuffer) -> Result<()> {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        self.device.begin_command_buffer(cmd, &begin_info)?;
        Ok(())
    }

    unsafe fn end_commands(&self, cmd: vk::CommandBuffer) -> Result<()> {
        self.device.end_command_buffer(cmd)?;
        Ok(())
    }

    unsafe fn begin_render_pass(
        &self,
        cmd: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_color: [f32; 4],
    ) {
        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: clear_color,
            },
        }];

        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(&clear_values);

        self.device
            .cmd_begin_render_pass(cmd, &begin_info, vk::SubpassContents::INLINE);
    }

    unsafe fn set_viewport(&self, cmd: vk::CommandBuffer, extent: vk::Extent2D) {
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };

        self.device.cmd_set_viewport(cmd, 0, &[viewport]);
        self.device.cmd_set_scissor(cmd, 0, &[scissor]);
    }

    unsafe fn bind_graphics_pipeline(&self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline) {
        self.device
            .cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline);
    }

    unsafe fn bind_vertex_buffer(&self, cmd: vk::CommandBuffer, buffer: vk::Buffer, offset: u64) {
        self.device
            .cmd_bind_vertex_buffers(cmd, 0, &[buffer], &[offset]);
    }

    unsafe fn bind_index_buffer(
        &self,
        cmd: vk::CommandBuffer,
        buffer: vk::Buffer,
        offset: u64,
        index_type: vk::IndexType,
    ) {
        self.device
            .cmd_bind_index_buffer(cmd, buffer, offset, index_type);
    }

    unsafe fn bind_descriptor_set(
        &self,
        cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        set: vk::DescriptorSet,
    ) {
        self.device.cmd_bind_descriptor_sets(
            cmd,
            vk::PipelineBindPoint::GRAPHICS,
            layout,
            0,
            &[set],
            &[],
        );
    }

    unsafe fn draw_indexed(&self, cmd: vk::CommandBuffer, index_count: u32) {
        self.device.cmd_draw_indexed(cmd, index_count, 1, 0, 0, 0);
    }

    unsafe fn end_render_pass(&self, cmd: vk::CommandBuffer) {
        self.device.cmd_end_render_pass(cmd);
    }

    unsafe fn copy_buffer(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: &[vk::BufferCopy],
    ) {
        self.device.cmd_copy_buffer(cmd, src, dst, regions);
    }
}
