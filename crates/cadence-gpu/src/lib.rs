//! Vulkan abstraction layer for the Cadence engine.
//!
//! This crate provides:
//! - Vulkan instance and device management
//! - GPU capability detection
//! - Memory allocation via gpu-allocator
//! - Swapchain, render pass and pipeline creation
//! - The collaborator traits the frame loop is written against, and their
//!   Vulkan implementations

pub mod capabilities;
pub mod context;
pub mod descriptors;
pub mod device;
pub mod error;
pub mod instance;
pub mod layer;
pub mod memory;
pub mod pipeline;
pub mod render_pass;
pub mod surface;
pub mod swapchain;

pub use ash::vk;
pub use capabilities::{GpuCapabilities, GpuVendor};
pub use context::{GpuContext, GpuContextBuilder, QueueFamilyIndices};
pub use descriptors::{write_uniform_buffer, DescriptorPool, DescriptorSetLayoutBuilder};
pub use device::VulkanDevice;
pub use error::{GpuError, Result};
pub use layer::{CommandEncoder, DeviceLayer, HostBuffer, PresentationLayer, QueueKind, SubmitInfo};
pub use memory::{GpuAllocator, GpuBuffer};
pub use pipeline::{GraphicsPipeline, GraphicsPipelineConfig};
pub use surface::{SurfaceCapabilities, SurfaceContext};
pub use swapchain::Swapchain;

/// Re-exported so callers can name memory locations without a direct dependency.
pub use gpu_allocator::MemoryLocation;
