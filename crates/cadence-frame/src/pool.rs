//! Per-frame synchronization and command resources.
//!
//! A [`FrameSlotPool`] is a fixed ring of [`FrameSlot`]s. The driver cycles
//! through it one slot per frame, so up to `frames_in_flight` frames can be
//! queued on the GPU while the CPU records the next one. Slots are indexed by
//! frame, never by swapchain image.

use crate::error::{FrameError, Result};
use cadence_core::constants::{DEFAULT_FRAMES_IN_FLIGHT, MAX_FRAMES_IN_FLIGHT};
use cadence_gpu::{DeviceLayer, QueueKind};
use ash::vk;

/// Frame-slot pool configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of slots.
    pub frames_in_flight: u16,
    /// Queue kinds that get a command pool in every slot. Graphics is required.
    pub queues: Vec<QueueKind>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: DEFAULT_FRAMES_IN_FLIGHT,
            queues: vec![QueueKind::Graphics, QueueKind::Transfer],
        }
    }
}

impl PoolConfig {
    /// Default queues with the given slot count.
    pub fn new(frames_in_flight: u16) -> Self {
        Self {
            frames_in_flight,
            ..Self::default()
        }
    }

    /// Replace the queue kinds.
    pub fn with_queues(mut self, queues: &[QueueKind]) -> Self {
        self.queues = queues.to_vec();
        self
    }

    fn validate(&self) -> Result<Vec<QueueKind>> {
        if self.frames_in_flight == 0 {
            return Err(FrameError::Setup(
                "frames_in_flight must be at least 1".to_string(),
            ));
        }
        if self.frames_in_flight > MAX_FRAMES_IN_FLIGHT {
            return Err(FrameError::Setup(format!(
                "frames_in_flight {} exceeds the maximum of {MAX_FRAMES_IN_FLIGHT}",
                self.frames_in_flight
            )));
        }

        let mut kinds = Vec::with_capacity(QueueKind::COUNT);
        for &kind in &self.queues {
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        if !kinds.contains(&QueueKind::Graphics) {
            return Err(FrameError::Setup(
                "a graphics command pool is required".to_string(),
            ));
        }
        Ok(kinds)
    }
}

/// Command pool and its single primary buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotCommands {
    pub pool: vk::CommandPool,
    pub buffer: vk::CommandBuffer,
}

/// Synchronization and command resources for one in-flight frame.
#[derive(Clone, Copy, Debug)]
pub struct FrameSlot {
    /// Signaled by the presentation engine when the acquired image is ready.
    pub acquire_semaphore: vk::Semaphore,
    /// Signaled by the frame's submission; presentation waits on it.
    pub submit_semaphore: vk::Semaphore,
    /// Signaled when the frame's submission completes.
    pub in_flight_fence: vk::Fence,
    graphics: SlotCommands,
    transfer: Option<SlotCommands>,
    compute: Option<SlotCommands>,
}

impl FrameSlot {
    /// Graphics command pool and buffer.
    pub fn graphics(&self) -> SlotCommands {
        self.graphics
    }

    /// Commands for a queue kind, if the pool was configured with it.
    pub fn commands(&self, kind: QueueKind) -> Option<SlotCommands> {
        match kind {
            QueueKind::Graphics => Some(self.graphics),
            QueueKind::Transfer => self.transfer,
            QueueKind::Compute => self.compute,
        }
    }

    /// Every command pool of the slot.
    pub fn command_pools(&self) -> impl Iterator<Item = vk::CommandPool> {
        [Some(self.graphics), self.transfer, self.compute]
            .into_iter()
            .flatten()
            .map(|c| c.pool)
    }
}

/// Objects created so far, released in reverse on a failed construction.
#[derive(Default)]
struct Created {
    semaphores: Vec<vk::Semaphore>,
    fences: Vec<vk::Fence>,
    pools: Vec<vk::CommandPool>,
}

impl Created {
    unsafe fn create_slot<D: DeviceLayer>(
        &mut self,
        device: &D,
        kinds: &[QueueKind],
    ) -> cadence_gpu::Result<FrameSlot> {
        let acquire_semaphore = device.create_semaphore()?;
        self.semaphores.push(acquire_semaphore);
        let submit_semaphore = device.create_semaphore()?;
        self.semaphores.push(submit_semaphore);

        // Signaled so the first wait on each slot returns immediately
        let in_flight_fence = device.create_fence(true)?;
        self.fences.push(in_flight_fence);

        let mut commands: [Option<SlotCommands>; QueueKind::COUNT] = [None; QueueKind::COUNT];
        for &kind in kinds {
            let pool = device.create_command_pool(kind)?;
            self.pools.push(pool);
            let buffer = device.allocate_command_buffer(pool)?;
            commands[kind.index()] = Some(SlotCommands { pool, buffer });
        }

        let graphics = commands[QueueKind::Graphics.index()].ok_or_else(|| {
            cadence_gpu::GpuError::InvalidState("graphics commands missing".to_string())
        })?;

        Ok(FrameSlot {
            acquire_semaphore,
            submit_semaphore,
            in_flight_fence,
            graphics,
            transfer: commands[QueueKind::Transfer.index()],
            compute: commands[QueueKind::Compute.index()],
        })
    }

    unsafe fn release<D: DeviceLayer>(self, device: &D) {
        for semaphore in self.semaphores {
            device.destroy_semaphore(semaphore);
        }
        for fence in self.fences {
            device.destroy_fence(fence);
        }
        for pool in self.pools {
            device.destroy_command_pool(pool);
        }
    }
}

/// Fixed ring of frame slots.
pub struct FrameSlotPool {
    slots: Vec<FrameSlot>,
    /// Slots whose fence was reset and whose submission has not been made yet.
    awaiting_submit: Vec<bool>,
}

impl FrameSlotPool {
    /// Create `frames_in_flight` slots.
    ///
    /// Fences start signaled. If any creation fails, everything created so
    /// far is destroyed before the error is returned.
    ///
    /// # Safety
    /// The device must be live.
    pub unsafe fn new<D: DeviceLayer>(device: &D, config: &PoolConfig) -> Result<Self> {
        let kinds = config.validate()?;
        let count = usize::from(config.frames_in_flight);

        let mut created = Created::default();
        let mut slots = Vec::with_capacity(count);
        for _ in 0..count {
            match created.create_slot(device, &kinds) {
                Ok(slot) => slots.push(slot),
                Err(e) => {
                    created.release(device);
                    return Err(e.into());
                }
            }
        }

        tracing::info!("Frame-slot pool created: {count} slots, queues {kinds:?}");

        Ok(Self {
            slots,
            awaiting_submit: vec![false; count],
        })
    }

    /// Slot `index`.
    ///
    /// # Panics
    /// If `index >= self.len()`.
    pub fn slot(&self, index: usize) -> &FrameSlot {
        assert!(
            index < self.slots.len(),
            "frame slot {index} out of range (pool has {})",
            self.slots.len()
        );
        &self.slots[index]
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the pool holds no slots (only after `destroy`).
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameSlot> {
        self.slots.iter()
    }

    /// Reset slot `index`'s fence ahead of a new submission.
    ///
    /// # Safety
    /// The fence must have been observed signaled.
    pub unsafe fn reset_fence<D: DeviceLayer>(
        &mut self,
        device: &D,
        index: usize,
    ) -> cadence_gpu::Result<()> {
        let fence = self.slot(index).in_flight_fence;
        device.reset_fence(fence)?;
        self.awaiting_submit[index] = true;
        Ok(())
    }

    /// Record that slot `index`'s fence now belongs to a submission.
    pub fn mark_submitted(&mut self, index: usize) {
        self.awaiting_submit[index] = false;
    }

    /// Fences that will eventually signal: every slot except those reset but
    /// never submitted.
    pub fn live_fences(&self) -> impl Iterator<Item = vk::Fence> + '_ {
        self.slots
            .iter()
            .zip(&self.awaiting_submit)
            .filter(|(_, waiting)| !**waiting)
            .map(|(slot, _)| slot.in_flight_fence)
    }

    /// Destroy every slot: semaphores and fences first, then command pools.
    ///
    /// # Safety
    /// The device must be idle.
    ///
    /// # Panics
    /// If a submitted slot's fence is not signaled.
    pub unsafe fn destroy<D: DeviceLayer>(&mut self, device: &D) {
        for (index, slot) in self.slots.iter().enumerate() {
            if self.awaiting_submit[index] {
                tracing::warn!("Frame slot {index} was reset but never submitted");
                continue;
            }
            match device.fence_signaled(slot.in_flight_fence) {
                Ok(signaled) => assert!(
                    signaled,
                    "frame slot {index} destroyed while its fence is unsignaled"
                ),
                Err(e) => tracing::warn!("Fence status query failed for slot {index}: {e}"),
            }
        }

        for slot in &self.slots {
            device.destroy_semaphore(slot.acquire_semaphore);
            device.destroy_semaphore(slot.submit_semaphore);
            device.destroy_fence(slot.in_flight_fence);
        }
        for slot in &self.slots {
            for pool in slot.command_pools() {
                device.destroy_command_pool(pool);
            }
        }

        self.slots.clear();
        self.awaiting_submit.clear();
    }
}
