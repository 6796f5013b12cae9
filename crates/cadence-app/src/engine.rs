//! Engine assembly and teardown.
//!
//! The [`Engine`] owns every long-lived GPU object of the demo: the context,
//! surface, swapchain, render pass, pipeline, descriptors and buffers. It hands
//! the frame driver a [`ResourceRegistry`] of borrowed handles and destroys
//! everything in a fixed order when shut down.

use std::fs::File;
use std::mem::{offset_of, size_of};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use ash::vk;
use cadence_core::{FrameClock, Mesh, Vertex};
use cadence_frame::{
    DriverConfig, FrameDriver, FrameInfo, FrameStats, FrameUniforms, GeometryBuffer,
    GeometryLayout, PoolConfig, ResourceRegistry, UniformRing,
};
use cadence_gpu::render_pass::{create_framebuffers, create_render_pass, destroy_framebuffers};
use cadence_gpu::{
    write_uniform_buffer, DescriptorPool, DescriptorSetLayoutBuilder, DeviceLayer, GpuBuffer,
    GpuContext, GpuContextBuilder, GraphicsPipeline, GraphicsPipelineConfig, MemoryLocation,
    QueueKind, SurfaceContext, Swapchain, VulkanDevice,
};
use tracing::{error, info, warn};
use winit::window::Window;

use crate::config::AppConfig;

const VERTEX_SHADER: &str = "cube.vert.spv";
const FRAGMENT_SHADER: &str = "cube.frag.spv";

type Driver = FrameDriver<VulkanDevice, Arc<Swapchain>>;

/// Every GPU object of a running demo.
///
/// Optional fields are filled in during [`Engine::new`]; if setup fails part
/// way, dropping the engine destroys whatever had been created.
pub struct Engine {
    clock: FrameClock,
    driver: Option<Driver>,
    registry: Option<ResourceRegistry<GpuBuffer>>,
    geometry_buffer: Option<GpuBuffer>,
    pipeline: Option<GraphicsPipeline>,
    descriptor_pool: Option<DescriptorPool>,
    set_layout: vk::DescriptorSetLayout,
    framebuffers: Vec<vk::Framebuffer>,
    render_pass: vk::RenderPass,
    swapchain: Option<Arc<Swapchain>>,
    surface: Option<SurfaceContext>,
    stats: FrameStats,
    shut_down: bool,
    // Dropped after every handle above; the window outlives the surface.
    gpu: GpuContext,
    window: Arc<Window>,
}

impl Engine {
    /// Build the GPU stack for `window` and upload `mesh`.
    pub fn new(window: Arc<Window>, config: &AppConfig, mesh: &Mesh) -> anyhow::Result<Self> {
        config.validate()?;

        let gpu = GpuContextBuilder::new()
            .app_name(&config.title)
            .validation(config.validation)
            .build()?;

        info!("GPU: {}", gpu.capabilities().summary());

        let mut engine = Self {
            clock: FrameClock::new(),
            driver: None,
            registry: None,
            geometry_buffer: None,
            pipeline: None,
            descriptor_pool: None,
            set_layout: vk::DescriptorSetLayout::null(),
            framebuffers: Vec::new(),
            render_pass: vk::RenderPass::null(),
            swapchain: None,
            surface: None,
            stats: FrameStats::default(),
            shut_down: false,
            gpu,
            window,
        };
        engine.init(config, mesh)?;
        Ok(engine)
    }

    fn init(&mut self, config: &AppConfig, mesh: &Mesh) -> anyhow::Result<()> {
        let size = self.window.inner_size();

        // SAFETY: the engine keeps the window alive until the surface is destroyed.
        let surface = unsafe { SurfaceContext::from_window(&self.gpu, self.window.as_ref())? };
        let surface = self.surface.insert(surface);

        // SAFETY: the surface was created from this context.
        let swapchain = unsafe {
            surface.create_swapchain(&self.gpu, size.width, size.height, config.vsync)?
        };
        let swapchain = Arc::clone(self.swapchain.insert(Arc::new(swapchain)));

        let device = self.gpu.device();

        // SAFETY: the device is live and the image views belong to the swapchain.
        unsafe {
            self.render_pass = create_render_pass(device, swapchain.format)?;
            self.framebuffers = create_framebuffers(
                device,
                self.render_pass,
                &swapchain.image_views,
                swapchain.extent,
            )?;
        }

        let pipeline_config = GraphicsPipelineConfig {
            vertex_shader: load_spirv(&config.shader_dir.join(VERTEX_SHADER))?,
            fragment_shader: load_spirv(&config.shader_dir.join(FRAGMENT_SHADER))?,
            vertex_bindings: vec![vk::VertexInputBindingDescription {
                binding: 0,
                stride: size_of::<Vertex>() as u32,
                input_rate: vk::VertexInputRate::VERTEX,
            }],
            vertex_attributes: vec![
                vk::VertexInputAttributeDescription {
                    location: 0,
                    binding: 0,
                    format: vk::Format::R32G32B32_SFLOAT,
                    offset: offset_of!(Vertex, position) as u32,
                },
                vk::VertexInputAttributeDescription {
                    location: 1,
                    binding: 0,
                    format: vk::Format::R32G32B32_SFLOAT,
                    offset: offset_of!(Vertex, color) as u32,
                },
            ],
            ..Default::default()
        };

        // SAFETY: the render pass is live and the shader code was read as SPIR-V words.
        unsafe {
            self.set_layout = DescriptorSetLayoutBuilder::new()
                .uniform_buffer(0, vk::ShaderStageFlags::VERTEX)
                .build(device)?;
            self.pipeline = Some(GraphicsPipeline::new(
                device,
                self.render_pass,
                &pipeline_config,
                &[self.set_layout],
            )?);
        }

        let driver_config = DriverConfig {
            pool: PoolConfig::new(config.frames_in_flight)
                .with_queues(&[QueueKind::Graphics, QueueKind::Transfer]),
            ..Default::default()
        };
        // SAFETY: the device view and the swapchain come from the same context.
        let driver = unsafe {
            FrameDriver::new(VulkanDevice::new(&self.gpu), swapchain, &driver_config)?
        };
        let driver = self.driver.insert(driver);
        let slots = driver.frames_in_flight();

        // SAFETY: the device is live and the layout holds a single uniform binding.
        let descriptor_sets = unsafe {
            let pool = DescriptorPool::with_uniform_sets(device, self.set_layout, slots as u32)?;
            self.descriptor_pool.insert(pool).sets().to_vec()
        };

        let layout = GeometryLayout::for_mesh(mesh);
        let mut sharing = vec![
            self.gpu.queue_family(QueueKind::Graphics),
            self.gpu.queue_family(QueueKind::Transfer),
        ];
        sharing.dedup();

        let geometry = {
            let mut allocator = self.gpu.allocator().lock();
            allocator.create_shared_buffer(
                layout.total_size(),
                vk::BufferUsageFlags::VERTEX_BUFFER
                    | vk::BufferUsageFlags::INDEX_BUFFER
                    | vk::BufferUsageFlags::TRANSFER_DST,
                MemoryLocation::GpuOnly,
                &sharing,
                "geometry",
            )?
        };
        let geometry = GeometryBuffer {
            buffer: self.geometry_buffer.insert(geometry).buffer,
            layout,
        };

        let mut staging = self.gpu.allocator().lock().create_buffer(
            layout.total_size(),
            vk::BufferUsageFlags::TRANSFER_SRC,
            MemoryLocation::CpuToGpu,
            "geometry staging",
        )?;
        let uploaded = layout
            .write_staged(&staging, mesh.vertex_bytes(), mesh.index_bytes())
            .map_err(cadence_frame::FrameError::from)
            // SAFETY: both buffers are live and the staging buffer holds `layout`.
            .and_then(|()| unsafe { driver.upload_geometry(staging.buffer, &geometry) });
        self.gpu.allocator().lock().free_buffer(&mut staging)?;
        uploaded?;

        let payload = size_of::<FrameUniforms>() as u64;
        let alignment = driver.device().min_uniform_alignment();
        let uniform_buffer = self.gpu.allocator().lock().create_buffer(
            UniformRing::<GpuBuffer>::required_size(payload, alignment, slots),
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            MemoryLocation::CpuToGpu,
            "frame uniforms",
        )?;
        let uniforms = UniformRing::new(uniform_buffer, payload, alignment, slots);

        for (slot, &set) in descriptor_sets.iter().enumerate() {
            // SAFETY: the set and the uniform buffer are live and not in use.
            unsafe {
                write_uniform_buffer(
                    device,
                    set,
                    0,
                    uniforms.buffer().buffer,
                    uniforms.offset(slot),
                    uniforms.range(),
                );
            }
        }

        let Some(pipeline) = self.pipeline.as_ref() else {
            bail!("pipeline missing after creation");
        };
        let registry = self.registry.insert(ResourceRegistry {
            render_pass: self.render_pass,
            framebuffers: self.framebuffers.clone(),
            extent: driver.presenter().extent,
            pipeline: pipeline.pipeline,
            pipeline_layout: pipeline.layout,
            descriptor_sets,
            geometry,
            uniforms,
        });
        driver.check_registry(registry)?;

        info!(
            "Engine ready: {} frames in flight, {} swapchain images",
            slots,
            registry.framebuffers.len()
        );
        Ok(())
    }

    /// Advance the clock and draw one frame.
    pub fn draw_frame(&mut self) -> anyhow::Result<FrameInfo> {
        let (Some(driver), Some(registry)) = (self.driver.as_mut(), self.registry.as_ref()) else {
            bail!("engine is shut down");
        };
        self.clock.tick();
        // SAFETY: the registry's handles live until shutdown, which takes the driver first.
        let info = unsafe { driver.draw_next_frame(registry, self.clock.elapsed())? };
        Ok(info)
    }

    /// Frame counters; final once the engine has shut down.
    pub fn stats(&self) -> FrameStats {
        self.driver.as_ref().map_or(self.stats, Driver::stats)
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    /// Tear the GPU stack down.
    ///
    /// Order: idle the device, destroy sync objects and command pools, the
    /// pipeline and its layout, descriptors, framebuffers, render pass,
    /// buffers, swapchain and surface. The device and instance follow when
    /// the context drops. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        info!("Starting engine teardown...");

        // SAFETY: every handle below was created by this engine's device, and
        // the device is idle once the driver is destroyed.
        unsafe {
            match self.driver.take() {
                Some(driver) => self.stats = driver.destroy(),
                None => {
                    if let Err(e) = self.gpu.wait_idle() {
                        error!("Failed to wait idle: {e}");
                    }
                }
            }

            let device = self.gpu.device();

            if let Some(pipeline) = self.pipeline.take() {
                pipeline.destroy(device);
            }
            if let Some(pool) = self.descriptor_pool.take() {
                pool.destroy(device);
            }
            if self.set_layout != vk::DescriptorSetLayout::null() {
                device.destroy_descriptor_set_layout(self.set_layout, None);
                self.set_layout = vk::DescriptorSetLayout::null();
            }

            destroy_framebuffers(device, &self.framebuffers);
            self.framebuffers.clear();
            if self.render_pass != vk::RenderPass::null() {
                device.destroy_render_pass(self.render_pass, None);
                self.render_pass = vk::RenderPass::null();
            }

            {
                let mut allocator = self.gpu.allocator().lock();
                let uniform = self.registry.take().map(|r| r.uniforms.into_inner());
                for mut buffer in uniform.into_iter().chain(self.geometry_buffer.take()) {
                    if let Err(e) = allocator.free_buffer(&mut buffer) {
                        warn!("Failed to free buffer: {e}");
                    }
                }
            }

            if let Some(swapchain) = self.swapchain.take() {
                swapchain.destroy(device);
            }
            if let Some(surface) = self.surface.take() {
                surface.destroy();
            }
        }

        info!("Engine teardown complete");
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Read a SPIR-V binary into words.
fn load_spirv(path: &Path) -> anyhow::Result<Vec<u32>> {
    let mut file =
        File::open(path).with_context(|| format!("Failed to open shader {}", path.display()))?;
    ash::util::read_spv(&mut file)
        .with_context(|| format!("Failed to read SPIR-V from {}", path.display()))
}
