//! Core types, timing, and math for the Cadence engine.
//!
//! This crate provides the foundational pieces shared by every other crate:
//! - Vertex and mesh types for the demo geometry
//! - The frame clock that accumulates elapsed time
//! - Time-derived transforms (camera orbit, model spin, projection)
//! - The engine-wide error type

pub mod clock;
pub mod error;
pub mod math;
pub mod types;

pub use clock::FrameClock;
pub use error::{Error, Result};
pub use types::{Mesh, Vertex};

/// Engine-wide constants
pub mod constants {
    /// Default number of frames the CPU may record ahead of the GPU.
    pub const DEFAULT_FRAMES_IN_FLIGHT: u16 = 2;
    /// Upper bound accepted for the frames-in-flight setting.
    pub const MAX_FRAMES_IN_FLIGHT: u16 = 8;
}
