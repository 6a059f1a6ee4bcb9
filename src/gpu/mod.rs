//! Particle pipeline on the graphics device (wgpu)
//!
//! Both banks live in storage buffers. The physics stage is a compute
//! kernel with one invocation per particle, and the render stage draws one
//! instanced square per particle straight from the bank the physics stage
//! just wrote. Nothing is copied back to the host during a frame.
//!
//! # Example
//!
//! ```rust,ignore
//! use pointswarm::gpu::{GpuPipeline, KernelSources};
//! use pointswarm::{ParticlePipeline, RenderSettings, SimulationParameters, Viewport};
//!
//! let viewport = Viewport::new(800.0, 600.0);
//! let mut pipeline = GpuPipeline::new(
//!     200_000,
//!     viewport,
//!     RenderSettings::default(),
//!     &KernelSources::builtin(),
//!     &mut rand::thread_rng(),
//! )?;
//!
//! let params = SimulationParameters::new(9.0, 0.99, viewport);
//! pipeline.physics(&params)?;
//! pipeline.swap();
//! pipeline.render(&params)?;
//! let rgba = pipeline.read_pixels()?;
//! ```
//!
//! # Binding
//!
//! Kernels are connected to banks by role through [`StageBindings`]; see
//! [`binder`] for the rules a description must satisfy.

pub mod binder;
mod device;
mod pipeline;
mod shaders;
mod types;

pub use binder::{BankField, PipelineBinder, Resource, StageBindings};
pub use device::{capture, create_device, request_device};
pub use pipeline::{GpuPipeline, TARGET_FORMAT};
pub use shaders::{
    FRAGMENT_ENTRY, FRAME_UNIFORMS, KernelSources, PHYSICS_ENTRY, PHYSICS_KERNEL, RENDER_KERNEL,
    VERTEX_ENTRY,
};
pub use types::{BANK_ELEMENT_SIZE, FrameUniforms, WORKGROUP_SIZE};
