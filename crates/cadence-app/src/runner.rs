//! Application runner and event loop.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use cadence_core::Mesh;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::config::AppConfig;
use crate::engine::Engine;

/// Run the demo with the given configuration until the window closes.
///
/// Initializes logging, creates the window and engine, and runs the event
/// loop. A fatal frame error tears the engine down, exits the loop and is
/// returned here.
pub fn run_app(config: AppConfig, mesh: Mesh) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    config.validate()?;
    info!("{} starting...", config.title);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut runner = AppRunner {
        config,
        mesh,
        state: None,
        failure: None,
    };

    event_loop.run_app(&mut runner)?;

    match runner.failure.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Internal runner that implements winit's ApplicationHandler.
struct AppRunner {
    config: AppConfig,
    mesh: Mesh,
    state: Option<AppState>,
    failure: Option<anyhow::Error>,
}

struct AppState {
    engine: Engine,
    target_frame_time: Option<Duration>,
    last_frame: Instant,
    frame_count: u64,
    fps: FpsStats,
}

/// Frame rate samples, one per frame with a measurable interval.
#[derive(Clone, Copy, Debug)]
struct FpsStats {
    min: f64,
    max: f64,
    sum: f64,
    samples: u64,
}

impl Default for FpsStats {
    fn default() -> Self {
        Self {
            min: f64::MAX,
            max: 0.0,
            sum: 0.0,
            samples: 0,
        }
    }
}

impl FpsStats {
    fn record(&mut self, dt: f64) {
        if dt > 0.0 {
            let fps = 1.0 / dt;
            self.min = self.min.min(fps);
            self.max = self.max.max(fps);
            self.sum += fps;
            self.samples += 1;
        }
    }

    fn average(&self) -> Option<f64> {
        (self.samples > 0).then(|| self.sum / self.samples as f64)
    }
}

impl ApplicationHandler for AppRunner {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        info!("Creating application state...");

        match self.create_state(event_loop) {
            Ok(state) => {
                self.state = Some(state);
                info!("Application ready!");
            }
            Err(e) => {
                error!("Failed to initialize application: {e:#}");
                self.failure = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                if let Some(mut state) = self.state.take() {
                    state.cleanup();
                }
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                let Some(state) = &mut self.state else {
                    return;
                };
                match state.render_frame() {
                    Ok(()) => state.engine.window().request_redraw(),
                    Err(e) => {
                        error!("Render error: {e:#}");
                        if let Some(mut state) = self.state.take() {
                            state.cleanup();
                        }
                        self.failure = Some(e);
                        event_loop.exit();
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.engine.window().request_redraw();
        }
    }
}

impl AppRunner {
    fn create_state(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<AppState> {
        // The swapchain is never recreated, so the window keeps its initial size
        let window_attrs = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height))
            .with_resizable(false);

        let window = Arc::new(event_loop.create_window(window_attrs)?);
        let engine = Engine::new(window, &self.config, &self.mesh)?;

        let target_frame_time = self
            .config
            .target_fps
            .map(|fps| Duration::from_nanos(1_000_000_000 / u64::from(fps)));

        Ok(AppState {
            engine,
            target_frame_time,
            last_frame: Instant::now(),
            frame_count: 0,
            fps: FpsStats::default(),
        })
    }
}

impl AppState {
    fn render_frame(&mut self) -> anyhow::Result<()> {
        let frame_start = Instant::now();

        let dt = frame_start.duration_since(self.last_frame).as_secs_f64();
        self.last_frame = frame_start;
        self.fps.record(dt);

        let frame = self.engine.draw_frame()?;
        self.frame_count += 1;
        debug!(
            "Frame {} used slot {} and image {}",
            frame.frame_number, frame.slot, frame.image_index
        );

        // Frame pacing
        if let Some(target) = self.target_frame_time {
            let elapsed = frame_start.elapsed();
            if elapsed < target {
                thread::sleep(target - elapsed);
            }
        }

        Ok(())
    }

    fn cleanup(&mut self) {
        if let Some(avg_fps) = self.fps.average() {
            info!("FPS Statistics:");
            info!("  Min: {:.1}", self.fps.min);
            info!("  Max: {:.1}", self.fps.max);
            info!("  Avg: {:.1}", avg_fps);
            info!("  Total frames: {}", self.frame_count);
        }

        self.engine.shutdown();

        let stats = self.engine.stats();
        info!(
            "Frame loop: {} frames presented, {} blocking fence waits, {} image waits",
            stats.frames, stats.fence_waits, stats.image_waits
        );
        info!("Cleanup complete");
    }
}
