//! Application framework for the Cadence engine.
//!
//! This crate handles the boilerplate around the frame loop:
//! - Window creation and the winit event loop
//! - GPU context, surface and swapchain initialization
//! - Render pass, pipeline, descriptor and buffer setup
//! - Fixed-order teardown
//!
//! # Example
//!
//! ```no_run
//! use cadence_app::{run_app, AppConfig};
//! use cadence_core::Mesh;
//!
//! fn main() -> anyhow::Result<()> {
//!     run_app(AppConfig::new("Cube").with_frames_in_flight(3), Mesh::cube())
//! }
//! ```

mod config;
mod engine;
mod runner;

pub use config::AppConfig;
pub use engine::Engine;
pub use runner::run_app;

// Re-export commonly used types for convenience
pub use cadence_frame::{FrameInfo, FrameStats};
pub use cadence_gpu::{GpuContext, GpuContextBuilder};
