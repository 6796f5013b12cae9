//! Frame orchestration for the Cadence engine.
//!
//! Given fully initialized GPU handles, this crate decides when to acquire a
//! swapchain image, what to record, how CPU and GPU work are synchronized
//! across several in-flight frames, and when a resource is safe to reuse.
//!
//! - [`FrameSlotPool`]: per-frame semaphores, fences and command pools
//! - [`ImageTracker`]: which fence last targeted each swapchain image
//! - [`CommandRecorder`]: the command sequence of one frame
//! - [`FrameDriver`]: the acquire → wait → record → submit → present loop
//!
//! Everything is generic over the [`cadence_gpu::layer`] traits, so the loop
//! runs unchanged against Vulkan or a simulated device.

pub mod driver;
pub mod error;
pub mod geometry;
pub mod pool;
pub mod recorder;
pub mod registry;
pub mod tracker;
pub mod uniforms;

#[cfg(test)]
mod mock;

pub use driver::{DriverConfig, FrameDriver, FrameInfo, FrameStats};
pub use error::{FrameError, FrameStage, Result};
pub use geometry::{GeometryBuffer, GeometryLayout};
pub use pool::{FrameSlot, FrameSlotPool, PoolConfig, SlotCommands};
pub use recorder::CommandRecorder;
pub use registry::ResourceRegistry;
pub use tracker::ImageTracker;
pub use uniforms::{FrameUniforms, UniformRing};
