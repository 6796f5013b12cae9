//! Collaborator traits consumed by the frame-orchestration core.
//!
//! The core never calls Vulkan directly. It drives a [`DeviceLayer`] for sync
//! objects, command pools and queue submission, a [`CommandEncoder`] for
//! recording, and a [`PresentationLayer`] for image acquisition and
//! presentation. [`crate::VulkanDevice`] and [`crate::swapchain::Swapchain`]
//! implement them on top of ash; tests substitute a simulated GPU.
//!
//! All handle-taking methods are `unsafe`: handles must have been created by
//! the same layer (or the same logical device) and must not have been destroyed.

use crate::error::Result;
use ash::vk;
use std::sync::Arc;

/// Queue a command pool or submission targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueueKind {
    Graphics,
    Transfer,
    Compute,
}

impl QueueKind {
    /// Number of queue kinds.
    pub const COUNT: usize = 3;

    /// All queue kinds, in index order.
    pub const ALL: [Self; Self::COUNT] = [Self::Graphics, Self::Transfer, Self::Compute];

    /// Dense index for per-kind arrays.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Self::Graphics => 0,
            Self::Transfer => 1,
            Self::Compute => 2,
        }
    }
}

/// One batch handed to [`DeviceLayer::submit`].
#[derive(Clone, Copy, Debug)]
pub struct SubmitInfo<'a> {
    /// Command buffers executed in order.
    pub command_buffers: &'a [vk::CommandBuffer],
    /// Semaphore to wait on, and the stage at which the wait applies.
    pub wait: Option<(vk::Semaphore, vk::PipelineStageFlags)>,
    /// Semaphore signaled when the batch completes.
    pub signal: Option<vk::Semaphore>,
    /// Fence signaled when the batch completes (may be null).
    pub fence: vk::Fence,
}

/// Logical device operations used by the frame loop.
pub trait DeviceLayer {
    /// Queue that receives frame submissions.
    fn graphics_queue(&self) -> vk::Queue;

    /// Queue that receives present requests.
    fn present_queue(&self) -> vk::Queue;

    /// Queue for the given kind.
    fn queue(&self, kind: QueueKind) -> vk::Queue;

    /// Minimum alignment for uniform buffer offsets.
    fn min_uniform_alignment(&self) -> u64;

    /// Create a binary semaphore.
    ///
    /// # Safety
    /// The device must be live.
    unsafe fn create_semaphore(&self) -> Result<vk::Semaphore>;

    /// Create a fence, optionally already signaled.
    ///
    /// # Safety
    /// The device must be live.
    unsafe fn create_fence(&self, signaled: bool) -> Result<vk::Fence>;

    /// Create a command pool whose buffers are reset together.
    ///
    /// # Safety
    /// The device must be live.
    unsafe fn create_command_pool(&self, kind: QueueKind) -> Result<vk::CommandPool>;

    /// Allocate one primary command buffer from `pool`.
    ///
    /// # Safety
    /// `pool` must belong to this device.
    unsafe fn allocate_command_buffer(&self, pool: vk::CommandPool) -> Result<vk::CommandBuffer>;

    /// Block until `fence` is signaled or the timeout elapses.
    ///
    /// # Safety
    /// `fence` must belong to this device.
    unsafe fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> Result<()>;

    /// Non-blocking fence status query.
    ///
    /// # Safety
    /// `fence` must belong to this device.
    unsafe fn fence_signaled(&self, fence: vk::Fence) -> Result<bool>;

    /// Return `fence` to the unsignaled state.
    ///
    /// # Safety
    /// `fence` must belong to this device and must not be pending.
    unsafe fn reset_fence(&self, fence: vk::Fence) -> Result<()>;

    /// Reset every command buffer allocated from `pool`.
    ///
    /// # Safety
    /// No command buffer from `pool` may be pending execution.
    unsafe fn reset_command_pool(&self, pool: vk::CommandPool) -> Result<()>;

    /// Submit one batch to `queue`.
    ///
    /// # Safety
    /// All handles in `info` must belong to this device; command buffers must
    /// be in the executable state.
    unsafe fn submit(&self, queue: vk::Queue, info: &SubmitInfo<'_>) -> Result<()>;

    /// Block until the whole device is idle.
    fn wait_idle(&self) -> Result<()>;

    /// # Safety
    /// The semaphore must not be in use.
    unsafe fn destroy_semaphore(&self, semaphore: vk::Semaphore);

    /// # Safety
    /// The fence must not be in use.
    unsafe fn destroy_fence(&self, fence: vk::Fence);

    /// # Safety
    /// No command buffer from the pool may be pending execution.
    unsafe fn destroy_command_pool(&self, pool: vk::CommandPool);
}

/// Command recording operations.
///
/// # Safety
/// Every method requires `cmd` to be a command buffer of this device in the
/// recording state (except `begin_commands`, which requires the initial state).
pub trait CommandEncoder {
    /// Begin a one-time-submit recording.
    ///
    /// # Safety
    /// See trait docs.
    unsafe fn begin_commands(&self, cmd: vk::CommandBuffer) -> Result<()>;

    /// Finish recording.
    ///
    /// # Safety
    /// See trait docs.
    unsafe fn end_commands(&self, cmd: vk::CommandBuffer) -> Result<()>;

    /// Begin `render_pass` on `framebuffer`, clearing the color attachment.
    ///
    /// # Safety
    /// See trait docs.
    unsafe fn begin_render_pass(
        &self,
        cmd: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_color: [f32; 4],
    );

    /// Set the dynamic viewport and scissor to cover `extent`.
    ///
    /// # Safety
    /// See trait docs.
    unsafe fn set_viewport(&self, cmd: vk::CommandBuffer, extent: vk::Extent2D);

    /// # Safety
    /// See trait docs.
    unsafe fn bind_graphics_pipeline(&self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline);

    /// # Safety
    /// See trait docs.
    unsafe fn bind_vertex_buffer(&self, cmd: vk::CommandBuffer, buffer: vk::Buffer, offset: u64);

    /// # Safety
    /// See trait docs.
    unsafe fn bind_index_buffer(
        &self,
        cmd: vk::CommandBuffer,
        buffer: vk::Buffer,
        offset: u64,
        index_type: vk::IndexType,
    );

    /// Bind `set` at set index 0 of `layout`.
    ///
    /// # Safety
    /// See trait docs.
    unsafe fn bind_descriptor_set(
        &self,
        cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        set: vk::DescriptorSet,
    );

    /// # Safety
    /// See trait docs.
    unsafe fn draw_indexed(&self, cmd: vk::CommandBuffer, index_count: u32);

    /// # Safety
    /// See trait docs.
    unsafe fn end_render_pass(&self, cmd: vk::CommandBuffer);

    /// # Safety
    /// See trait docs.
    unsafe fn copy_buffer(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: &[vk::BufferCopy],
    );
}

/// Presentation engine operations.
pub trait PresentationLayer {
    /// Number of presentable images.
    fn image_count(&self) -> u32;

    /// Size of the presentable images.
    fn extent(&self) -> vk::Extent2D;

    /// Acquire the next image, signaling `semaphore` when it is ready.
    ///
    /// # Safety
    /// `semaphore` must belong to the presenting device and be unsignaled.
    /// Vulkan also requires it to have no uncompleted wait pending
    /// (VUID-vkAcquireNextImageKHR-semaphore-01779). The frame driver
    /// acquires before waiting on the slot fence, so the submission that last
    /// waited on this semaphore may still be executing. Validation layers can
    /// report that; drivers in practice order the wait before the new signal.
    unsafe fn acquire_next_image(&self, semaphore: vk::Semaphore, timeout_ns: u64) -> Result<u32>;

    /// Queue `image_index` for presentation after `wait_semaphore` is signaled.
    ///
    /// # Safety
    /// `queue` must support presentation; `image_index` must have been acquired.
    unsafe fn present(
        &self,
        queue: vk::Queue,
        wait_semaphore: vk::Semaphore,
        image_index: u32,
    ) -> Result<()>;
}

impl<T: PresentationLayer + ?Sized> PresentationLayer for Arc<T> {
    fn image_count(&self) -> u32 {
        (**self).image_count()
    }

    fn extent(&self) -> vk::Extent2D {
        (**self).extent()
    }

    unsafe fn acquire_next_image(&self, semaphore: vk::Semaphore, timeout_ns: u64) -> Result<u32> {
        (**self).acquire_next_image(semaphore, timeout_ns)
    }

    unsafe fn present(
        &self,
        queue: vk::Queue,
        wait_semaphore: vk::Semaphore,
        image_index: u32,
    ) -> Result<()> {
        (**self).present(queue, wait_semaphore, image_index)
    }
}

/// Host-visible buffer the CPU writes directly.
pub trait HostBuffer {
    /// Raw buffer handle.
    fn handle(&self) -> vk::Buffer;

    /// Copy `data` into the buffer at `offset`.
    fn write_bytes(&self, offset: u64, data: &[u8]) -> Result<()>;
}
