//! The per-frame state machine.
//!
//! Each call to [`FrameDriver::draw_next_frame`] walks one frame through
//! acquire, fence wait, image hazard check, record, submit and present, then
//! advances the slot cursor. Any GPU failure along the way is fatal: the
//! driver moves to [`FrameStage::Halted`] and refuses further frames.

use crate::error::{FrameError, FrameStage, Result};
use crate::geometry::GeometryBuffer;
use crate::pool::{FrameSlotPool, PoolConfig, SlotCommands};
use crate::recorder::CommandRecorder;
use crate::registry::ResourceRegistry;
use crate::tracker::ImageTracker;
use crate::uniforms::FrameUniforms;
use ash::vk;
use cadence_gpu::{
    CommandEncoder, DeviceLayer, GpuError, HostBuffer, PresentationLayer, QueueKind, SubmitInfo,
};

/// Frame driver configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriverConfig {
    pub pool: PoolConfig,
    /// Timeout for every fence wait.
    pub fence_timeout_ns: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            fence_timeout_ns: u64::MAX,
        }
    }
}

/// Counters accumulated over the driver's lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frames presented.
    pub frames: u64,
    /// Slot fence waits that found the fence unsignaled.
    pub fence_waits: u64,
    /// Frames that had to wait for another slot still rendering their image.
    pub image_waits: u64,
}

/// What a completed frame used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameInfo {
    pub frame_number: u64,
    pub slot: usize,
    pub image_index: u32,
    /// Whether the image hazard check had to block.
    pub waited_on_image: bool,
}

/// Drives frames through a device, an encoder and a presentation engine.
pub struct FrameDriver<D, P> {
    device: D,
    presenter: P,
    pool: FrameSlotPool,
    tracker: ImageTracker,
    recorder: CommandRecorder,
    upload_fence: vk::Fence,
    cursor: usize,
    frame_number: u64,
    stage: FrameStage,
    stats: FrameStats,
    fence_timeout_ns: u64,
}

impl<D, P> FrameDriver<D, P>
where
    D: DeviceLayer + CommandEncoder,
    P: PresentationLayer,
{
    /// Create the slot pool and image tracker.
    ///
    /// # Safety
    /// `device` must be live and `presenter` must present on it.
    pub unsafe fn new(device: D, presenter: P, config: &DriverConfig) -> Result<Self> {
        let image_count = presenter.image_count();
        if image_count == 0 {
            return Err(FrameError::Setup(
                "presentation engine reports no images".to_string(),
            ));
        }

        let mut pool = FrameSlotPool::new(&device, &config.pool)?;
        let upload_fence = match device.create_fence(true) {
            Ok(fence) => fence,
            Err(e) => {
                pool.destroy(&device);
                return Err(e.into());
            }
        };

        if usize::from(config.pool.frames_in_flight) > image_count as usize {
            tracing::debug!(
                "{} frames in flight over {image_count} images; image waits will occur",
                config.pool.frames_in_flight
            );
        }

        Ok(Self {
            device,
            presenter,
            pool,
            tracker: ImageTracker::new(image_count),
            recorder: CommandRecorder::default(),
            upload_fence,
            cursor: 0,
            frame_number: 0,
            stage: FrameStage::Idle,
            stats: FrameStats::default(),
            fence_timeout_ns: config.fence_timeout_ns,
        })
    }

    /// Check a registry matches this driver's slot and image counts.
    pub fn check_registry<B: HostBuffer>(&self, registry: &ResourceRegistry<B>) -> Result<()> {
        registry.validate(self.pool.len(), self.presenter.image_count())
    }

    /// Draw one frame at `elapsed` seconds.
    ///
    /// # Safety
    /// `registry` must hold live handles sized for this driver.
    pub unsafe fn draw_next_frame<B: HostBuffer>(
        &mut self,
        registry: &ResourceRegistry<B>,
        elapsed: f32,
    ) -> Result<FrameInfo> {
        if self.stage == FrameStage::Halted {
            return Err(FrameError::Halted);
        }

        let span = tracing::trace_span!("frame", number = self.frame_number, slot = self.cursor);
        let _enter = span.enter();

        match self.run_frame(registry, elapsed) {
            Ok(info) => Ok(info),
            Err(source) => {
                let stage = self.stage;
                self.stage = FrameStage::Halted;
                tracing::debug!("Frame {} halted while {stage}", self.frame_number);
                Err(FrameError::Fatal { stage, source })
            }
        }
    }

    unsafe fn run_frame<B: HostBuffer>(
        &mut self,
        registry: &ResourceRegistry<B>,
        elapsed: f32,
    ) -> std::result::Result<FrameInfo, GpuError> {
        let slot_index = self.cursor;
        let slot = *self.pool.slot(slot_index);
        let fence = slot.in_flight_fence;

        // 1. Acquire
        self.stage = FrameStage::Acquiring;
        let image_index = self
            .presenter
            .acquire_next_image(slot.acquire_semaphore, self.fence_timeout_ns)?;
        tracing::trace!("Acquired image {image_index}");

        // 2. Wait for this slot's previous submission
        self.stage = FrameStage::WaitingFence;
        if !self.device.fence_signaled(fence)? {
            self.stats.fence_waits += 1;
        }
        self.device.wait_for_fence(fence, self.fence_timeout_ns)?;
        self.tracker.retire_fence(fence);
        self.pool.reset_fence(&self.device, slot_index)?;

        // 3. Image hazard check
        let waited_on_image =
            self.tracker
                .wait_if_in_flight(&self.device, image_index, self.fence_timeout_ns)?;
        if waited_on_image {
            self.stats.image_waits += 1;
            tracing::debug!("Waited on image {image_index} held by another slot");
        }
        self.tracker.record_in_flight(image_index, fence);

        // 4. Record
        self.stage = FrameStage::Recording;
        for pool in slot.command_pools() {
            self.device.reset_command_pool(pool)?;
        }
        let uniforms = FrameUniforms::at(elapsed, registry.aspect());
        registry
            .uniforms
            .write(slot_index, bytemuck::bytes_of(&uniforms))?;
        let cmd = slot.graphics().buffer;
        self.recorder
            .record(&self.device, cmd, registry, image_index, slot_index)?;

        // 5. Submit
        self.stage = FrameStage::Submitting;
        let command_buffers = [cmd];
        let submit = SubmitInfo {
            command_buffers: &command_buffers,
            wait: Some((
                slot.acquire_semaphore,
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            )),
            signal: Some(slot.submit_semaphore),
            fence,
        };
        self.device.submit(self.device.graphics_queue(), &submit)?;
        self.pool.mark_submitted(slot_index);

        // 6. Present
        self.stage = FrameStage::Presenting;
        self.presenter
            .present(self.device.present_queue(), slot.submit_semaphore, image_index)?;

        // 7. Advance
        let info = FrameInfo {
            frame_number: self.frame_number,
            slot: slot_index,
            image_index,
            waited_on_image,
        };
        self.cursor = (self.cursor + 1) % self.pool.len();
        self.frame_number += 1;
        self.stats.frames += 1;
        self.stage = FrameStage::Idle;

        Ok(info)
    }

    /// Copy staged geometry into the device-local geometry buffer on the
    /// transfer queue and block until the copy completes.
    ///
    /// A missing transfer pool is a setup error. Any GPU failure halts the
    /// driver like a failed frame.
    ///
    /// # Safety
    /// `staging` must hold the data at `geometry.layout` and both buffers must be live.
    pub unsafe fn upload_geometry(
        &mut self,
        staging: vk::Buffer,
        geometry: &GeometryBuffer,
    ) -> Result<()> {
        if self.stage == FrameStage::Halted {
            return Err(FrameError::Halted);
        }
        let transfer = self
            .pool
            .slot(0)
            .commands(QueueKind::Transfer)
            .ok_or_else(|| FrameError::Setup("no transfer command pool".to_string()))?;

        match self.run_upload(transfer, staging, geometry) {
            Ok(()) => {
                self.stage = FrameStage::Idle;
                tracing::info!(
                    "Uploaded geometry: {} bytes, {} indices",
                    geometry.layout.total_size(),
                    geometry.layout.index_count
                );
                Ok(())
            }
            Err(source) => {
                let stage = self.stage;
                self.stage = FrameStage::Halted;
                tracing::debug!("Geometry upload halted while {stage}");
                Err(FrameError::Fatal { stage, source })
            }
        }
    }

    // The upload fence is signaled on entry. A failed upload halts the
    // driver, so a reset but unsubmitted fence is never waited on.
    unsafe fn run_upload(
        &mut self,
        transfer: SlotCommands,
        staging: vk::Buffer,
        geometry: &GeometryBuffer,
    ) -> std::result::Result<(), GpuError> {
        // The copy replaces data earlier frames may still be reading
        self.stage = FrameStage::WaitingFence;
        self.wait_slot_fences()?;

        self.stage = FrameStage::Recording;
        self.device.reset_command_pool(transfer.pool)?;
        let regions = geometry.layout.copy_regions();
        self.recorder.record_upload(
            &self.device,
            transfer.buffer,
            staging,
            geometry.buffer,
            &regions,
        )?;

        self.stage = FrameStage::Submitting;
        let command_buffers = [transfer.buffer];
        let submit = SubmitInfo {
            command_buffers: &command_buffers,
            wait: None,
            signal: None,
            fence: self.upload_fence,
        };
        self.device.reset_fence(self.upload_fence)?;
        self.device
            .submit(self.device.queue(QueueKind::Transfer), &submit)?;
        self.device
            .wait_for_fence(self.upload_fence, self.fence_timeout_ns)
    }

    /// Block until every submitted slot fence is signaled.
    ///
    /// # Safety
    /// The device must be live.
    pub unsafe fn wait_all_in_flight(&self) -> Result<()> {
        Ok(self.wait_slot_fences()?)
    }

    unsafe fn wait_slot_fences(&self) -> std::result::Result<(), GpuError> {
        for fence in self.pool.live_fences() {
            self.device.wait_for_fence(fence, self.fence_timeout_ns)?;
        }
        Ok(())
    }

    /// Idle the device, then destroy the slot pool and the upload fence.
    ///
    /// # Safety
    /// No other thread may be submitting to the device.
    pub unsafe fn destroy(mut self) -> FrameStats {
        if let Err(e) = self.device.wait_idle() {
            tracing::warn!("Device wait idle failed during frame teardown: {e}");
        }
        self.pool.destroy(&self.device);
        self.device.destroy_fence(self.upload_fence);
        self.tracker.clear();

        tracing::info!(
            "Frame driver destroyed: {} frames, {} blocking fence waits, {} image waits",
            self.stats.frames,
            self.stats.fence_waits,
            self.stats.image_waits
        );
        self.stats
    }

    /// Slot the next frame will use.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn stage(&self) -> FrameStage {
        self.stage
    }

    pub fn frames_in_flight(&self) -> usize {
        self.pool.len()
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }
}
