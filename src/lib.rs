//! pointswarm - a real-time point-particle attractor.
//!
//! Tens to hundreds of thousands of particles fall toward a pointer-driven
//! attractor. Particle state lives in two banks: each frame the physics
//! stage reads one bank and writes the other, the roles swap, and the
//! render stage draws the bank that was just written. Lanes never share a
//! slot, so no lane needs a lock.
//!
//! Two backends implement the same [`ParticlePipeline`] contract:
//! [`gpu::GpuPipeline`] (wgpu compute + render, feature `gpu`) and
//! [`cpu::CpuPipeline`] (rayon + a host framebuffer). A
//! [`FrameScheduler`] drives either one from display-refresh callbacks.

pub mod config;
pub mod cpu;
pub mod driver;
pub mod error;
#[cfg(feature = "gpu")]
pub mod gpu;
pub mod params;
pub mod particle;
pub mod pipeline;
pub mod scheduler;
pub mod store;

pub use config::{DeviceClass, RawConfig, RawValue, SimConfig};
pub use cpu::{CpuPipeline, Framebuffer};
pub use error::{PipelineError, PipelineResult};
pub use params::{AttractorCell, MIN_DISTANCE_SQ, SimulationParameters, Viewport};
pub use particle::{Particle, advance};
pub use pipeline::{ParticlePipeline, RenderSettings, Stage};
pub use scheduler::{FrameOutcome, FrameScheduler, FrameStats, SchedulerState};
pub use store::{BankSet, ParticleBank};
