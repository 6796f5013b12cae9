//! Swapchain image to in-flight fence tracking.
//!
//! The presentation engine may hand back an image whose previous frame is
//! still executing, either because there are more frame slots than images or
//! because images come back out of order. The tracker remembers which slot
//! fence last targeted each image so the driver can wait for it before
//! recording into that image again.

use cadence_gpu::{DeviceLayer, Result};
use ash::vk;

/// Per-image record of the fence guarding the image's latest frame.
#[derive(Debug, Clone)]
pub struct ImageTracker {
    fences: Vec<Option<vk::Fence>>,
}

impl ImageTracker {
    pub fn new(image_count: u32) -> Self {
        Self {
            fences: vec![None; image_count as usize],
        }
    }

    /// Number of tracked images.
    pub fn len(&self) -> usize {
        self.fences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fences.is_empty()
    }

    fn entry(&mut self, image_index: u32) -> &mut Option<vk::Fence> {
        let count = self.fences.len();
        self.fences
            .get_mut(image_index as usize)
            .unwrap_or_else(|| panic!("image index {image_index} out of range ({count} images)"))
    }

    /// Associate `fence` with `image_index`, replacing any previous fence.
    pub fn record_in_flight(&mut self, image_index: u32, fence: vk::Fence) {
        *self.entry(image_index) = Some(fence);
    }

    /// Block until the fence recorded for `image_index` (if any) is signaled,
    /// then clear the entry.
    ///
    /// Returns whether the call had to block.
    ///
    /// # Safety
    /// Recorded fences must belong to `device` and be live.
    pub unsafe fn wait_if_in_flight<D: DeviceLayer>(
        &mut self,
        device: &D,
        image_index: u32,
        timeout_ns: u64,
    ) -> Result<bool> {
        let Some(fence) = *self.entry(image_index) else {
            return Ok(false);
        };

        let blocked = if device.fence_signaled(fence)? {
            false
        } else {
            tracing::trace!("Image {image_index} still in flight, waiting on {fence:?}");
            device.wait_for_fence(fence, timeout_ns)?;
            true
        };

        *self.entry(image_index) = None;
        Ok(blocked)
    }

    /// Fence currently recorded for `image_index`.
    pub fn in_flight(&self, image_index: u32) -> Option<vk::Fence> {
        assert!(
            (image_index as usize) < self.fences.len(),
            "image index {image_index} out of range ({} images)",
            self.fences.len()
        );
        self.fences[image_index as usize]
    }

    /// Drop every entry holding `fence`, after it was observed signaled.
    pub fn retire_fence(&mut self, fence: vk::Fence) {
        for entry in &mut self.fences {
            if *entry == Some(fence) {
                *entry = None;
            }
        }
    }

    pub fn clear(&mut self) {
        self.fences.fill(None);
    }
}
