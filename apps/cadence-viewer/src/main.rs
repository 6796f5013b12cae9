//! Cadence Engine Demo Viewer
//!
//! Renders a spinning, per-face colored cube with several frames in flight.
//!
//! ## Usage
//!
//! ```bash
//! glslc apps/cadence-viewer/shaders/cube.vert -o apps/cadence-viewer/shaders/cube.vert.spv
//! glslc apps/cadence-viewer/shaders/cube.frag -o apps/cadence-viewer/shaders/cube.frag.spv
//! cargo run -p cadence-viewer -- [OPTIONS]
//! ```
//!
//! ## Options
//!
//! - `--frames-in-flight <N>`: Frames the CPU may record ahead of the GPU (default: 2)
//! - `--vsync`: Present with FIFO instead of the lowest-latency mode
//! - `--no-validation`: Disable Vulkan validation layers
//! - `--shaders <DIR>`: Directory holding `cube.vert.spv` and `cube.frag.spv`
//! - `-h, --help`: Print help message
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

use std::path::PathBuf;

use anyhow::{bail, Context};
use cadence_app::{run_app, AppConfig};
use cadence_core::Mesh;

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;
const DEFAULT_SHADER_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/shaders");

fn main() -> anyhow::Result<()> {
    // Check for help flag before starting the app
    if std::env::args().any(|arg| arg == "-h" || arg == "--help") {
        print_help();
        return Ok(());
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = parse_args(&args)?;

    run_app(config, Mesh::cube())
}

/// Build the app configuration from command line arguments (program name excluded).
fn parse_args(args: &[String]) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::new("Cadence Engine - Cube Demo")
        .with_size(WIDTH, HEIGHT)
        .with_shader_dir(DEFAULT_SHADER_DIR);

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--frames-in-flight" => {
                let Some(value) = args.get(i + 1) else {
                    bail!("--frames-in-flight requires a value");
                };
                let frames = value
                    .parse()
                    .with_context(|| format!("invalid frames in flight: {value}"))?;
                config = config.with_frames_in_flight(frames);
                i += 1;
            }
            "--shaders" => {
                let Some(dir) = args.get(i + 1) else {
                    bail!("--shaders requires a directory");
                };
                config = config.with_shader_dir(PathBuf::from(dir));
                i += 1;
            }
            "--vsync" => config = config.with_vsync(true),
            "--no-validation" => config = config.with_validation(false),
            other => bail!("unknown argument: {other} (see --help)"),
        }
        i += 1;
    }

    config.validate()?;
    Ok(config)
}

fn print_help() {
    eprintln!(
        "Cadence Engine Demo Viewer

Renders a spinning cube while keeping several frames in flight.

USAGE:
    cargo run -p cadence-viewer -- [OPTIONS]

OPTIONS:
    --frames-in-flight <N>  Frames the CPU may record ahead of the GPU (1-8, default: 2)
    --vsync                 Present with FIFO (default: lowest-latency mode)
    --no-validation         Disable Vulkan validation layers
    --shaders <DIR>         Directory holding cube.vert.spv and cube.frag.spv
                            Default: {DEFAULT_SHADER_DIR}
    -h, --help              Print this help message

SHADERS:
    glslc shaders/cube.vert -o shaders/cube.vert.spv
    glslc shaders/cube.frag -o shaders/cube.frag.spv

EXAMPLES:
    # Default: two frames in flight
    cargo run -p cadence-viewer

    # Triple buffering with vsync
    cargo run -p cadence-viewer -- --frames-in-flight 3 --vsync

    # Fully serialized CPU and GPU
    cargo run -p cadence-viewer -- --frames-in-flight 1

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log level (e.g., info, debug, trace)"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn defaults_without_arguments() {
        let config = parse_args(&[]).unwrap();
        assert_eq!(config.frames_in_flight, 2);
        assert!(!config.vsync);
        assert_eq!(config.shader_dir, PathBuf::from(DEFAULT_SHADER_DIR));
        assert_eq!((config.width, config.height), (WIDTH, HEIGHT));
    }

    #[test]
    fn parses_every_option() {
        let config = parse_args(&args(&[
            "--frames-in-flight",
            "3",
            "--vsync",
            "--no-validation",
            "--shaders",
            "/opt/spv",
        ]))
        .unwrap();

        assert_eq!(config.frames_in_flight, 3);
        assert!(config.vsync);
        assert!(!config.validation);
        assert_eq!(config.shader_dir, PathBuf::from("/opt/spv"));
    }

    #[test]
    fn rejects_bad_frames_in_flight() {
        assert!(parse_args(&args(&["--frames-in-flight", "zero"])).is_err());
        assert!(parse_args(&args(&["--frames-in-flight", "0"])).is_err());
        assert!(parse_args(&args(&["--frames-in-flight", "9"])).is_err());
        assert!(parse_args(&args(&["--frames-in-flight"])).is_err());
    }

    #[test]
    fn rejects_unknown_argument() {
        let err = parse_args(&args(&["--fullscreen"])).unwrap_err();
        assert!(err.to_string().contains("--fullscreen"));
    }
}
