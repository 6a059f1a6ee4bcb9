use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use pointswarm::{RawConfig, RawValue};

/// Which implementation of the particle stages to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// wgpu compute and render on the graphics device
    Gpu,
    /// rayon lanes and a host framebuffer
    Cpu,
}

/// Real-time point-particle attractor.
///
/// Simulation values are read leniently: anything missing, unparseable or
/// zero silently falls back to its default.
#[derive(Parser, Debug)]
#[command(name = "pointswarm")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Pipeline backend
    #[arg(short, long, value_enum, default_value_t = Backend::Gpu)]
    pub backend: Backend,

    /// YAML file with particle_count, fps, g and resistance
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of particles [default: 200000, or 100000 with --mobile]
    #[arg(short = 'n', long, allow_hyphen_values = true)]
    pub particle_count: Option<String>,

    /// Frame-rate ceiling [default: 60]
    #[arg(long, allow_hyphen_values = true)]
    pub fps: Option<String>,

    /// Gravitational strength [default: 9]
    #[arg(short, long, allow_hyphen_values = true)]
    pub g: Option<String>,

    /// Per-step velocity damping [default: 0.99]
    #[arg(short, long, allow_hyphen_values = true)]
    pub resistance: Option<String>,

    /// Use the mobile-class default particle count
    #[arg(long)]
    pub mobile: bool,

    /// Viewport width in pixels
    #[arg(long, default_value_t = 800.0)]
    pub width: f32,

    /// Viewport height in pixels
    #[arg(long, default_value_t = 600.0)]
    pub height: f32,

    /// Particle footprint edge in pixels
    #[arg(long, default_value_t = 1.0)]
    pub point_size: f32,

    /// Display refresh rate driving the frame loop
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u32).range(1..))]
    pub refresh_hz: u32,

    /// Stop after this many rendered frames
    #[arg(short, long)]
    pub frames: Option<u64>,

    /// Stop after this many seconds
    #[arg(short, long)]
    pub seconds: Option<f64>,

    /// WGSL file replacing the built-in physics kernel
    #[arg(long)]
    pub physics_kernel: Option<PathBuf>,

    /// WGSL file replacing the built-in render kernel
    #[arg(long)]
    pub render_kernel: Option<PathBuf>,
}

impl Args {
    /// Simulation values given on the command line
    pub fn raw_config(&self) -> RawConfig {
        let text = |value: &Option<String>| value.as_deref().map(RawValue::from);
        RawConfig {
            particle_count: text(&self.particle_count),
            fps: text(&self.fps),
            g: text(&self.g),
            resistance: text(&self.resistance),
        }
    }
}
