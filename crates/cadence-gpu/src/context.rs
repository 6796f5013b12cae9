//! GPU context management.

use crate::capabilities::GpuCapabilities;
use crate::error::{GpuError, Result};
use crate::instance::{create_instance, select_physical_device};
use crate::layer::QueueKind;
use crate::memory::GpuAllocator;
use ash::vk;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Main GPU context holding the instance, logical device, queues and allocator.
///
/// Dropping the context is the last step of engine teardown: it waits for the
/// device, shuts the allocator down, then destroys the device and the instance.
pub struct GpuContext {
    pub(crate) entry: ash::Entry,
    pub(crate) instance: ash::Instance,
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) device: Arc<ash::Device>,
    pub(crate) capabilities: GpuCapabilities,
    pub(crate) allocator: Mutex<GpuAllocator>,

    pub(crate) queue_families: QueueFamilyIndices,
    pub(crate) graphics_queue: vk::Queue,
    pub(crate) compute_queue: vk::Queue,
    pub(crate) transfer_queue: vk::Queue,
}

impl GpuContext {
    /// Get the Vulkan entry point.
    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    /// Get the Vulkan instance handle.
    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// Get the Vulkan device handle.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Get the physical device handle.
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Get GPU capabilities.
    pub fn capabilities(&self) -> &GpuCapabilities {
        &self.capabilities
    }

    /// Get access to the GPU allocator.
    pub fn allocator(&self) -> &Mutex<GpuAllocator> {
        &self.allocator
    }

    /// Get the graphics queue.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Get the queue for a queue kind.
    pub fn queue(&self, kind: QueueKind) -> vk::Queue {
        match kind {
            QueueKind::Graphics => self.graphics_queue,
            QueueKind::Transfer => self.transfer_queue,
            QueueKind::Compute => self.compute_queue,
        }
    }

    /// Get the graphics queue family index.
    pub fn graphics_queue_family(&self) -> u32 {
        self.queue_families.graphics
    }

    /// Get the queue family index for a queue kind.
    pub fn queue_family(&self, kind: QueueKind) -> u32 {
        self.queue_families.get(kind)
    }

    /// Distinct queue families used by this context.
    pub fn unique_queue_families(&self) -> Vec<u32> {
        self.queue_families.unique()
    }

    /// Wait for device to be idle.
    pub fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.device.device_wait_idle()?;
        }
        Ok(())
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            // Shutdown allocator BEFORE destroying device
            self.allocator.lock().shutdown();

            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}

/// Builder for creating a GPU context.
pub struct GpuContextBuilder {
    app_name: String,
    enable_validation: bool,
}

impl Default for GpuContextBuilder {
    fn default() -> Self {
        Self {
            app_name: "Cadence".to_string(),
            enable_validation: cfg!(debug_assertions),
        }
    }
}

impl GpuContextBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Enable or disable validation layers.
    pub fn validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Build the GPU context.
    pub fn build(self) -> Result<GpuContext> {
        let entry = unsafe { ash::Entry::load() }
            .map_err(|e| GpuError::Other(format!("Failed to load Vulkan: {e}")))?;

        let instance = unsafe { create_instance(&entry, &self.app_name, self.enable_validation) }?;

        // Everything below must release the instance on failure.
        match unsafe { Self::create_device_objects(&instance) } {
            Ok((physical_device, capabilities, queue_families, device, queues)) => {
                let device = Arc::new(device);
                let allocator =
                    match unsafe { GpuAllocator::new(&instance, device.clone(), physical_device) } {
                        Ok(allocator) => allocator,
                        Err(e) => {
                            unsafe {
                                device.destroy_device(None);
                                instance.destroy_instance(None);
                            }
                            return Err(e);
                        }
                    };

                Ok(GpuContext {
                    entry,
                    instance,
                    physical_device,
                    device,
                    capabilities,
                    allocator: Mutex::new(allocator),
                    queue_families,
                    graphics_queue: queues[0],
                    transfer_queue: queues[1],
                    compute_queue: queues[2],
                })
            }
            Err(e) => {
                unsafe { instance.destroy_instance(None) };
                Err(e)
            }
        }
    }

    unsafe fn create_device_objects(
        instance: &ash::Instance,
    ) -> Result<(
        vk::PhysicalDevice,
        GpuCapabilities,
        QueueFamilyIndices,
        ash::Device,
        [vk::Queue; QueueKind::COUNT],
    )> {
        let physical_device = select_physical_device(instance)?;

        let capabilities = GpuCapabilities::query(instance, physical_device);
        if !capabilities.meets_requirements() {
            return Err(GpuError::NoSuitableDevice);
        }

        tracing::info!("Selected GPU: {}", capabilities.summary());

        let families = instance.get_physical_device_queue_family_properties(physical_device);
        let queue_families = QueueFamilyIndices::select(&families)?;
        tracing::debug!(
            "Queue families: graphics={} transfer={} compute={}",
            queue_families.graphics,
            queue_families.transfer,
            queue_families.compute
        );

        let (device, queues) = create_device(instance, physical_device, &queue_families)?;

        Ok((physical_device, capabilities, queue_families, device, queues))
    }
}

/// Queue family indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: u32,
    pub transfer: u32,
    pub compute: u32,
}

impl QueueFamilyIndices {
    /// Pick queue families, preferring dedicated transfer and compute families.
    ///
    /// Compute falls back to graphics; transfer falls back to compute.
    pub fn select(families: &[vk::QueueFamilyProperties]) -> Result<Self> {
        let mut graphics = None;
        let mut compute = None;
        let mut transfer = None;

        for (i, family) in families.iter().enumerate() {
            let i = i as u32;
            let flags = family.queue_flags;
            if family.queue_count == 0 {
                continue;
            }

            if flags.contains(vk::QueueFlags::COMPUTE)
                && !flags.contains(vk::QueueFlags::GRAPHICS)
                && compute.is_none()
            {
                compute = Some(i);
            }

            if flags.contains(vk::QueueFlags::TRANSFER)
                && !flags.contains(vk::QueueFlags::GRAPHICS)
                && !flags.contains(vk::QueueFlags::COMPUTE)
                && transfer.is_none()
            {
                transfer = Some(i);
            }

            if flags.contains(vk::QueueFlags::GRAPHICS) && graphics.is_none() {
                graphics = Some(i);
            }
        }

        let graphics = graphics.ok_or(GpuError::NoSuitableDevice)?;
        let compute = compute.unwrap_or(graphics);
        let transfer = transfer.unwrap_or(compute);

        Ok(Self {
            graphics,
            transfer,
            compute,
        })
    }

    /// Family for a queue kind.
    pub fn get(&self, kind: QueueKind) -> u32 {
        match kind {
            QueueKind::Graphics => self.graphics,
            QueueKind::Transfer => self.transfer,
            QueueKind::Compute => self.compute,
        }
    }

    /// Distinct family indices, ascending.
    pub fn unique(&self) -> Vec<u32> {
        let set: BTreeSet<u32> = [self.graphics, self.transfer, self.compute]
            .into_iter()
            .collect();
        set.into_iter().collect()
    }
}

/// Create the logical device and retrieve one queue per kind.
///
/// # Safety
/// The instance and physical device must be valid.
unsafe fn create_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    queue_families: &QueueFamilyIndices,
) -> Result<(ash::Device, [vk::Queue; QueueKind::COUNT])> {
    let queue_priority = 1.0_f32;
    let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = queue_families
        .unique()
        .into_iter()
        .map(|family| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(family)
                .queue_priorities(std::slice::from_ref(&queue_priority))
        })
        .collect();

    let extension_names = [ash::khr::swapchain::NAME.as_ptr()];
    let features = vk::PhysicalDeviceFeatures::default();

    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_names)
        .enabled_features(&features);

    let device = instance.create_device(physical_device, &device_create_info, None)?;

    let queues = QueueKind::ALL.map(|kind| device.get_device_queue(queue_families.get(kind), 0));

    Ok((device, queues))
}
