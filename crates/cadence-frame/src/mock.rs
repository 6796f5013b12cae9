//! Simulated GPU for exercising the frame loop without a device.
//!
//! Submissions stay pending until a fence covering them is waited on or the
//! device is idled. Work on one queue completes in submission order. Misuse
//! that a real driver would turn into corruption or validation errors is
//! recorded in `hazards` instead.

use cadence_gpu::{
    CommandEncoder, DeviceLayer, GpuError, HostBuffer, PresentationLayer, QueueKind, SubmitInfo,
};
use ash::vk::{self, Handle};
use hashbrown::{HashMap, HashSet};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

type GpuResult<T> = cadence_gpu::Result<T>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    CreateSemaphore(vk::Semaphore),
    CreateFence(vk::Fence),
    CreateCommandPool(vk::CommandPool, QueueKind),
    AllocateCommandBuffer(vk::CommandBuffer),
    WaitFence(vk::Fence),
    FenceStatus(vk::Fence),
    ResetFence(vk::Fence),
    ResetPool(vk::CommandPool),
    Submit {
        queue: vk::Queue,
        buffers: Vec<vk::CommandBuffer>,
        fence: vk::Fence,
    },
    WaitIdle,
    DestroySemaphore(vk::Semaphore),
    DestroyFence(vk::Fence),
    DestroyCommandPool(vk::CommandPool),
    Begin(vk::CommandBuffer),
    End(vk::CommandBuffer),
    BeginRenderPass {
        cmd: vk::CommandBuffer,
        framebuffer: vk::Framebuffer,
        clear_color: [u32; 4],
    },
    SetViewport(vk::CommandBuffer),
    BindPipeline(vk::CommandBuffer, vk::Pipeline),
    BindVertexBuffer(vk::CommandBuffer, vk::Buffer, u64),
    BindIndexBuffer(vk::CommandBuffer, vk::Buffer, u64),
    BindDescriptorSet(vk::CommandBuffer, vk::DescriptorSet),
    DrawIndexed(vk::CommandBuffer, u32),
    EndRenderPass(vk::CommandBuffer),
    CopyBuffer {
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: usize,
    },
    Acquire {
        semaphore: vk::Semaphore,
        image: u32,
    },
    Present {
        wait_semaphore: vk::Semaphore,
        image: u32,
    },
}

impl Call {
    /// Short name used when checking ordering.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateSemaphore(_) => "create_semaphore",
            Self::CreateFence(_) => "create_fence",
            Self::CreateCommandPool(..) => "create_command_pool",
            Self::AllocateCommandBuffer(_) => "allocate_command_buffer",
            Self::WaitFence(_) => "wait_fence",
            Self::FenceStatus(_) => "fence_status",
            Self::ResetFence(_) => "reset_fence",
            Self::ResetPool(_) => "reset_pool",
            Self::Submit { .. } => "submit",
            Self::WaitIdle => "wait_idle",
            Self::DestroySemaphore(_) => "destroy_semaphore",
            Self::DestroyFence(_) => "destroy_fence",
            Self::DestroyCommandPool(_) => "destroy_command_pool",
            Self::Begin(_) => "begin",
            Self::End(_) => "end",
            Self::BeginRenderPass { .. } => "begin_render_pass",
            Self::SetViewport(_) => "set_viewport",
            Self::BindPipeline(..) => "bind_pipeline",
            Self::BindVertexBuffer(..) => "bind_vertex_buffer",
            Self::BindIndexBuffer(..) => "bind_index_buffer",
            Self::BindDescriptorSet(..) => "bind_descriptor_set",
            Self::DrawIndexed(..) => "draw_indexed",
            Self::EndRenderPass(_) => "end_render_pass",
            Self::CopyBuffer { .. } => "copy_buffer",
            Self::Acquire { .. } => "acquire",
            Self::Present { .. } => "present",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FenceState {
    Signaled,
    Unsignaled,
    Pending(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BufferState {
    Initial,
    Recording,
    Executable,
}

#[derive(Debug)]
struct CommandBufferState {
    pool: vk::CommandPool,
    state: BufferState,
    framebuffer: Option<vk::Framebuffer>,
    last_submission: Option<usize>,
}

#[derive(Debug)]
struct Submission {
    queue: vk::Queue,
    fence: vk::Fence,
    complete: bool,
}

/// Failure injection points, counted from 1.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailAt {
    pub create: Option<usize>,
    pub acquire: Option<usize>,
    pub submit: Option<usize>,
    pub present: Option<usize>,
}

#[derive(Debug)]
struct MockState {
    next_handle: u64,
    calls: Vec<Call>,
    hazards: Vec<String>,
    live: HashSet<u64>,
    fences: HashMap<vk::Fence, FenceState>,
    pools: HashMap<vk::CommandPool, QueueKind>,
    buffers: HashMap<vk::CommandBuffer, CommandBufferState>,
    framebuffer_last: HashMap<vk::Framebuffer, usize>,
    submissions: Vec<Submission>,
    max_pending: usize,
    image_count: u32,
    image_script: VecDeque<u32>,
    next_image: u32,
    fail: FailAt,
    creates: usize,
    acquires: usize,
    submits: usize,
    presents: usize,
    alignment: u64,
}

impl MockState {
    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.live.insert(self.next_handle);
        self.next_handle
    }

    fn create(&mut self) -> GpuResult<u64> {
        self.creates += 1;
        if self.fail.create == Some(self.creates) {
            return Err(GpuError::Vulkan(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
        }
        Ok(self.handle())
    }

    fn pending(&self) -> usize {
        self.submissions.iter().filter(|s| !s.complete).count()
    }

    fn is_pending(&self, submission: Option<usize>) -> bool {
        submission.is_some_and(|id| !self.submissions[id].complete)
    }

    /// Complete `id` and everything submitted before it on the same queue.
    fn complete_through(&mut self, id: usize) {
        let queue = self.submissions[id].queue;
        for i in 0..=id {
            if self.submissions[i].queue == queue && !self.submissions[i].complete {
                self.submissions[i].complete = true;
                let fence = self.submissions[i].fence;
                if fence != vk::Fence::null() {
                    self.fences.insert(fence, FenceState::Signaled);
                }
            }
        }
    }

    fn complete_all(&mut self) {
        for id in 0..self.submissions.len() {
            self.complete_through(id);
        }
    }
}

/// Simulated device, encoder and presentation engine.
#[derive(Clone, Debug)]
pub struct MockGpu {
    state: Arc<Mutex<MockState>>,
}

pub const GRAPHICS_QUEUE: u64 = 0x9000;
pub const TRANSFER_QUEUE: u64 = 0x9001;
pub const COMPUTE_QUEUE: u64 = 0x9002;

impl MockGpu {
    pub fn new(image_count: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                next_handle: 0x100,
                calls: Vec::new(),
                hazards: Vec::new(),
                live: HashSet::new(),
                fences: HashMap::new(),
                pools: HashMap::new(),
                buffers: HashMap::new(),
                framebuffer_last: HashMap::new(),
                submissions: Vec::new(),
                max_pending: 0,
                image_count,
                image_script: VecDeque::new(),
                next_image: 0,
                fail: FailAt::default(),
                creates: 0,
                acquires: 0,
                submits: 0,
                presents: 0,
                alignment: 256,
            })),
        }
    }

    pub fn with_failures(self, fail: FailAt) -> Self {
        self.state.lock().fail = fail;
        self
    }

    /// Return these image indices from acquire before falling back to round-robin.
    pub fn script_images(&self, images: &[u32]) {
        self.state.lock().image_script.extend(images.iter().copied());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn hazards(&self) -> Vec<String> {
        self.state.lock().hazards.clone()
    }

    /// Handles created and not yet destroyed (semaphores, fences, pools, buffers).
    pub fn live_objects(&self) -> usize {
        self.state.lock().live.len()
    }

    pub fn pending_submissions(&self) -> usize {
        self.state.lock().pending()
    }

    /// Highest number of submissions pending at once.
    pub fn max_pending(&self) -> usize {
        self.state.lock().max_pending
    }

    pub fn submit_count(&self) -> usize {
        self.state.lock().submits
    }

    pub fn acquire_count(&self) -> usize {
        self.state.lock().acquires
    }

    pub fn present_count(&self) -> usize {
        self.state.lock().presents
    }

    /// Fabricate an unrelated handle (render pass, framebuffer, buffer).
    pub fn raw_handle<T: Handle>(&self) -> T {
        let mut state = self.state.lock();
        state.next_handle += 1;
        T::from_raw(state.next_handle)
    }

    pub fn buffer(&self, size: usize) -> MockBuffer {
        MockBuffer {
            handle: self.raw_handle(),
            data: Mutex::new(vec![0; size]),
            writes: Mutex::new(Vec::new()),
        }
    }

    fn log(&self, call: Call) {
        self.state.lock().calls.push(call);
    }
}

impl DeviceLayer for MockGpu {
    fn graphics_queue(&self) -> vk::Queue {
        vk::Queue::from_raw(GRAPHICS_QUEUE)
    }

    fn present_queue(&self) -> vk::Queue {
        vk::Queue::from_raw(GRAPHICS_QUEUE)
    }

    fn queue(&self, kind: QueueKind) -> vk::Queue {
        vk::Queue::from_raw(match kind {
            QueueKind::Graphics => GRAPHICS_QUEUE,
            QueueKind::Transfer => TRANSFER_QUEUE,
            QueueKind::Compute => COMPUTE_QUEUE,
        })
    }

    fn min_uniform_alignment(&self) -> u64 {
        self.state.lock().alignment
    }

    unsafe fn create_semaphore(&self) -> GpuResult<vk::Semaphore> {
        let semaphore = vk::Semaphore::from_raw(self.state.lock().create()?);
        self.log(Call::CreateSemaphore(semaphore));
        Ok(semaphore)
    }

    unsafe fn create_fence(&self, signaled: bool) -> GpuResult<vk::Fence> {
        let mut state = self.state.lock();
        let fence = vk::Fence::from_raw(state.create()?);
        let initial = if signaled {
            FenceState::Signaled
        } else {
            FenceState::Unsignaled
        };
        state.fences.insert(fence, initial);
        state.calls.push(Call::CreateFence(fence));
        Ok(fence)
    }

    unsafe fn create_command_pool(&self, kind: QueueKind) -> GpuResult<vk::CommandPool> {
        let mut state = self.state.lock();
        let pool = vk::CommandPool::from_raw(state.create()?);
        state.pools.insert(pool, kind);
        state.calls.push(Call::CreateCommandPool(pool, kind));
        Ok(pool)
    }

    unsafe fn allocate_command_buffer(
        &self,
        pool: vk::CommandPool,
    ) -> GpuResult<vk::CommandBuffer> {
        let mut state = self.state.lock();
        let cmd = vk::CommandBuffer::from_raw(state.create()?);
        state.buffers.insert(
            cmd,
            CommandBufferState {
                pool,
                state: BufferState::Initial,
                framebuffer: None,
                last_submission: None,
            },
        );
        state.calls.push(Call::AllocateCommandBuffer(cmd));
        Ok(cmd)
    }

    unsafe fn wait_for_fence(&self, fence: vk::Fence, _timeout_ns: u64) -> GpuResult<()> {
        let mut state = self.state.lock();
        state.calls.push(Call::WaitFence(fence));
        match state.fences.get(&fence).copied() {
            Some(FenceState::Signaled) => Ok(()),
            Some(FenceState::Pending(id)) => {
                state.complete_through(id);
                Ok(())
            }
            Some(FenceState::Unsignaled) => {
                state
                    .hazards
                    .push(format!("wait on fence {fence:?} with no pending work"));
                Err(GpuError::Vulkan(vk::Result::TIMEOUT))
            }
            None => {
                state.hazards.push(format!("wait on unknown fence {fence:?}"));
                Err(GpuError::Vulkan(vk::Result::ERROR_UNKNOWN))
            }
        }
    }

    unsafe fn fence_signaled(&self, fence: vk::Fence) -> GpuResult<bool> {
        let mut state = self.state.lock();
        state.calls.push(Call::FenceStatus(fence));
        Ok(state.fences.get(&fence) == Some(&FenceState::Signaled))
    }

    unsafe fn reset_fence(&self, fence: vk::Fence) -> GpuResult<()> {
        let mut state = self.state.lock();
        state.calls.push(Call::ResetFence(fence));
        if let Some(FenceState::Pending(_)) = state.fences.get(&fence) {
            state.hazards.push(format!("reset of pending fence {fence:?}"));
        }
        state.fences.insert(fence, FenceState::Unsignaled);
        Ok(())
    }

    unsafe fn reset_command_pool(&self, pool: vk::CommandPool) -> GpuResult<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.calls.push(Call::ResetPool(pool));
        let busy = state
            .buffers
            .values()
            .any(|b| b.pool == pool && state.is_pending(b.last_submission));
        if busy {
            state
                .hazards
                .push(format!("command pool {pool:?} reset while its work is pending"));
        }
        for buffer in state.buffers.values_mut().filter(|b| b.pool == pool) {
            buffer.state = BufferState::Initial;
            buffer.framebuffer = None;
        }
        Ok(())
    }

    unsafe fn submit(&self, queue: vk::Queue, info: &SubmitInfo<'_>) -> GpuResult<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.submits += 1;
        state.calls.push(Call::Submit {
            queue,
            buffers: info.command_buffers.to_vec(),
            fence: info.fence,
        });
        if state.fail.submit == Some(state.submits) {
            return Err(GpuError::Vulkan(vk::Result::ERROR_DEVICE_LOST));
        }

        let id = state.submissions.len();
        for cmd in info.command_buffers {
            let framebuffer = match state.buffers.get_mut(cmd) {
                Some(buffer) => {
                    if buffer.state != BufferState::Executable {
                        let msg = format!("submit of non-executable command buffer {cmd:?}");
                        state.hazards.push(msg);
                        continue;
                    }
                    buffer.last_submission = Some(id);
                    buffer.framebuffer
                }
                None => {
                    state.hazards.push(format!("submit of unknown command buffer {cmd:?}"));
                    continue;
                }
            };
            if let Some(fb) = framebuffer {
                state.framebuffer_last.insert(fb, id);
            }
        }

        if info.fence != vk::Fence::null() {
            if state.fences.get(&info.fence) != Some(&FenceState::Unsignaled) {
                let msg = format!("submit with fence {:?} not unsignaled", info.fence);
                state.hazards.push(msg);
            }
            state.fences.insert(info.fence, FenceState::Pending(id));
        }

        state.submissions.push(Submission {
            queue,
            fence: info.fence,
            complete: false,
        });
        state.max_pending = state.max_pending.max(state.pending());
        Ok(())
    }

    fn wait_idle(&self) -> GpuResult<()> {
        let mut state = self.state.lock();
        state.calls.push(Call::WaitIdle);
        state.complete_all();
        Ok(())
    }

    unsafe fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        let mut state = self.state.lock();
        state.live.remove(&semaphore.as_raw());
        state.calls.push(Call::DestroySemaphore(semaphore));
    }

    unsafe fn destroy_fence(&self, fence: vk::Fence) {
        let mut state = self.state.lock();
        if let Some(FenceState::Pending(_)) = state.fences.remove(&fence) {
            state.hazards.push(format!("destroy of pending fence {fence:?}"));
        }
        state.live.remove(&fence.as_raw());
        state.calls.push(Call::DestroyFence(fence));
    }

    unsafe fn destroy_command_pool(&self, pool: vk::CommandPool) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.pools.remove(&pool);
        let owned: Vec<vk::CommandBuffer> = state
            .buffers
            .iter()
            .filter(|(_, b)| b.pool == pool)
            .map(|(cmd, _)| *cmd)
            .collect();
        for cmd in owned {
            state.buffers.remove(&cmd);
            state.live.remove(&cmd.as_raw());
        }
        state.live.remove(&pool.as_raw());
        state.calls.push(Call::DestroyCommandPool(pool));
    }
}

impl CommandEncoder for MockGpu {
    unsafe fn begin_commands(&self, cmd: vk::CommandBuffer) -> GpuResult<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.calls.push(Call::Begin(cmd));
        let initial = state.buffers.get(&cmd).map(|b| b.state) == Some(BufferState::Initial);
        if !initial {
            state
                .hazards
                .push(format!("begin on command buffer {cmd:?} that was not reset"));
        }
        if let Some(buffer) = state.buffers.get_mut(&cmd) {
            buffer.state = BufferState::Recording;
        }
        Ok(())
    }

    unsafe fn end_commands(&self, cmd: vk::CommandBuffer) -> GpuResult<()> {
        let mut state = self.state.lock();
        state.calls.push(Call::End(cmd));
        if let Some(buffer) = state.buffers.get_mut(&cmd) {
            buffer.state = BufferState::Executable;
        }
        Ok(())
    }

    unsafe fn begin_render_pass(
        &self,
        cmd: vk::CommandBuffer,
        _render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        _extent: vk::Extent2D,
        clear_color: [f32; 4],
    ) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.calls.push(Call::BeginRenderPass {
            cmd,
            framebuffer,
            clear_color: clear_color.map(f32::to_bits),
        });
        let last = state.framebuffer_last.get(&framebuffer).copied();
        if state.is_pending(last) {
            state.hazards.push(format!(
                "recording into framebuffer {framebuffer:?} while it is in flight"
            ));
        }
        if let Some(buffer) = state.buffers.get_mut(&cmd) {
            buffer.framebuffer = Some(framebuffer);
        }
    }

    unsafe fn set_viewport(&self, cmd: vk::CommandBuffer, _extent: vk::Extent2D) {
        self.log(Call::SetViewport(cmd));
    }

    unsafe fn bind_graphics_pipeline(&self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline) {
        self.log(Call::BindPipeline(cmd, pipeline));
    }

    unsafe fn bind_vertex_buffer(&self, cmd: vk::CommandBuffer, buffer: vk::Buffer, offset: u64) {
        self.log(Call::BindVertexBuffer(cmd, buffer, offset));
    }

    unsafe fn bind_index_buffer(
        &self,
        cmd: vk::CommandBuffer,
        buffer: vk::Buffer,
        offset: u64,
        _index_type: vk::IndexType,
    ) {
        self.log(Call::BindIndexBuffer(cmd, buffer, offset));
    }

    unsafe fn bind_descriptor_set(
        &self,
        cmd: vk::CommandBuffer,
        _layout: vk::PipelineLayout,
        set: vk::DescriptorSet,
    ) {
        self.log(Call::BindDescriptorSet(cmd, set));
    }

    unsafe fn draw_indexed(&self, cmd: vk::CommandBuffer, index_count: u32) {
        self.log(Call::DrawIndexed(cmd, index_count));
    }

    unsafe fn end_render_pass(&self, cmd: vk::CommandBuffer) {
        self.log(Call::EndRenderPass(cmd));
    }

    unsafe fn copy_buffer(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: &[vk::BufferCopy],
    ) {
        self.log(Call::CopyBuffer {
            cmd,
            src,
            dst,
            regions: regions.len(),
        });
    }
}

impl PresentationLayer for MockGpu {
    fn image_count(&self) -> u32 {
        self.state.lock().image_count
    }

    fn extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: 800,
            height: 600,
        }
    }

    unsafe fn acquire_next_image(
        &self,
        semaphore: vk::Semaphore,
        _timeout_ns: u64,
    ) -> GpuResult<u32> {
        let mut state = self.state.lock();
        state.acquires += 1;
        if state.fail.acquire == Some(state.acquires) {
            return Err(GpuError::SwapchainOutOfDate);
        }
        let image = match state.image_script.pop_front() {
            Some(image) => image,
            None => {
                let image = state.next_image;
                state.next_image = (image + 1) % state.image_count;
                image
            }
        };
        state.calls.push(Call::Acquire { semaphore, image });
        Ok(image)
    }

    unsafe fn present(
        &self,
        _queue: vk::Queue,
        wait_semaphore: vk::Semaphore,
        image_index: u32,
    ) -> GpuResult<()> {
        let mut state = self.state.lock();
        state.presents += 1;
        state.calls.push(Call::Present {
            wait_semaphore,
            image: image_index,
        });
        if state.fail.present == Some(state.presents) {
            return Err(GpuError::SwapchainOutOfDate);
        }
        Ok(())
    }
}

/// Host buffer backed by a byte vector.
#[derive(Debug)]
pub struct MockBuffer {
    handle: vk::Buffer,
    data: Mutex<Vec<u8>>,
    writes: Mutex<Vec<(u64, usize)>>,
}

impl MockBuffer {
    pub fn bytes(&self, offset: usize, len: usize) -> Vec<u8> {
        self.data.lock()[offset..offset + len].to_vec()
    }

    /// `(offset, len)` of every write, in order.
    pub fn writes(&self) -> Vec<(u64, usize)> {
        self.writes.lock().clone()
    }
}

impl HostBuffer for MockBuffer {
    fn handle(&self) -> vk::Buffer {
        self.handle
    }

    fn write_bytes(&self, offset: u64, bytes: &[u8]) -> GpuResult<()> {
        let mut data = self.data.lock();
        let start = offset as usize;
        let end = start + bytes.len();
        if end > data.len() {
            return Err(GpuError::InvalidState(format!(
                "write of {} bytes at {offset} overflows {}",
                bytes.len(),
                data.len()
            )));
        }
        data[start..end].copy_from_slice(bytes);
        self.writes.lock().push((offset, bytes.len()));
        Ok(())
    }
}
