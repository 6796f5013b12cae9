//! Frame loop error types.

use cadence_gpu::GpuError;
use std::fmt;
use thiserror::Error;

/// Where the frame driver is within a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameStage {
    Idle,
    Acquiring,
    WaitingFence,
    Recording,
    Submitting,
    Presenting,
    /// Terminal state after a fatal error.
    Halted,
}

impl fmt::Display for FrameStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Acquiring => "acquiring",
            Self::WaitingFence => "waiting on fence",
            Self::Recording => "recording",
            Self::Submitting => "submitting",
            Self::Presenting => "presenting",
            Self::Halted => "halted",
        };
        f.write_str(name)
    }
}

/// Frame loop errors.
#[derive(Error, Debug)]
pub enum FrameError {
    /// A GPU call failed mid-frame; the driver is now halted.
    #[error("Fatal GPU error while {stage}: {source}")]
    Fatal {
        stage: FrameStage,
        #[source]
        source: GpuError,
    },

    /// The driver halted on an earlier fatal error.
    #[error("Frame driver is halted")]
    Halted,

    /// Invalid setup.
    #[error("Frame setup error: {0}")]
    Setup(String),

    /// GPU error outside the per-frame path.
    #[error(transparent)]
    Gpu(#[from] GpuError),
}

impl FrameError {
    /// Stage of a fatal error.
    pub fn stage(&self) -> Option<FrameStage> {
        match self {
            Self::Fatal { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, FrameError>;
