//! Per-frame uniform data and its slot-partitioned buffer.

use crate::geometry::align_up;
use bytemuck::{Pod, Zeroable};
use cadence_core::math::OrbitParams;
use cadence_gpu::{GpuError, HostBuffer, Result};
use glam::Mat4;

/// Uniform block read by the vertex shader.
///
/// Matches `layout(set = 0, binding = 0) uniform Frame { mat4 model; mat4 view; mat4 projection; }`.
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct FrameUniforms {
    pub model: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
}

impl FrameUniforms {
    /// Transforms at `elapsed` seconds with the default orbit.
    pub fn at(elapsed: f32, aspect: f32) -> Self {
        Self::from_orbit(&OrbitParams::default(), elapsed, aspect)
    }

    pub fn from_orbit(orbit: &OrbitParams, elapsed: f32, aspect: f32) -> Self {
        Self {
            model: orbit.model(elapsed),
            view: orbit.view(elapsed),
            projection: orbit.projection(aspect),
        }
    }
}

/// Host-visible buffer split into one aligned sub-range per frame slot.
///
/// Slot `s` only ever writes sub-range `s`, so rewriting it after the slot's
/// fence wait cannot race the GPU reading another slot's data.
pub struct UniformRing<B> {
    buffer: B,
    payload_size: u64,
    slice_size: u64,
    slots: usize,
}

impl<B: HostBuffer> UniformRing<B> {
    /// Stride between sub-ranges for a payload and offset alignment.
    pub fn slice_size_for(payload_size: u64, alignment: u64) -> u64 {
        align_up(payload_size, alignment)
    }

    /// Buffer size needed for `slots` sub-ranges.
    pub fn required_size(payload_size: u64, alignment: u64, slots: usize) -> u64 {
        Self::slice_size_for(payload_size, alignment) * slots as u64
    }

    /// Wrap a buffer of at least [`Self::required_size`] bytes.
    pub fn new(buffer: B, payload_size: u64, alignment: u64, slots: usize) -> Self {
        Self {
            buffer,
            payload_size,
            slice_size: Self::slice_size_for(payload_size, alignment),
            slots,
        }
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    pub fn slice_size(&self) -> u64 {
        self.slice_size
    }

    /// Start of slot `slot`'s sub-range.
    ///
    /// # Panics
    /// If `slot` is out of range.
    pub fn offset(&self, slot: usize) -> u64 {
        assert!(
            slot < self.slots,
            "uniform slot {slot} out of range ({} slots)",
            self.slots
        );
        slot as u64 * self.slice_size
    }

    /// Bytes a descriptor covers per slot.
    pub fn range(&self) -> u64 {
        self.payload_size
    }

    /// Overwrite slot `slot`'s sub-range.
    pub fn write(&self, slot: usize, bytes: &[u8]) -> Result<()> {
        if bytes.len() as u64 > self.payload_size {
            return Err(GpuError::InvalidState(format!(
                "uniform payload of {} bytes exceeds slice payload {}",
                bytes.len(),
                self.payload_size
            )));
        }
        self.buffer.write_bytes(self.offset(slot), bytes)
    }

    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    pub fn into_inner(self) -> B {
        self.buffer
    }
}
