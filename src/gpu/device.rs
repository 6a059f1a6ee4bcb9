//! Device acquisition and error capture

use std::sync::Arc;

use tracing::info;

use crate::error::{PipelineError, PipelineResult};

/// Request a high-performance adapter and a device with default limits
pub async fn request_device() -> PipelineResult<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .ok_or(PipelineError::NoAdapter)?;

    let adapter_info = adapter.get_info();
    info!(
        adapter = %adapter_info.name,
        backend = ?adapter_info.backend,
        "using GPU adapter"
    );

    adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Particle Pipeline Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
            },
            None, // trace path
        )
        .await
        .map_err(|e| PipelineError::Device(e.to_string()))
}

/// Blocking wrapper around [`request_device`]
pub fn create_device() -> PipelineResult<(Arc<wgpu::Device>, Arc<wgpu::Queue>)> {
    let (device, queue) = pollster::block_on(request_device())?;
    Ok((Arc::new(device), Arc::new(queue)))
}

/// Run `f` inside validation and out-of-memory error scopes.
///
/// Errors raised by `f` are returned instead of reaching the device's
/// uncaptured-error handler, which panics by default.
pub fn capture<T>(device: &wgpu::Device, f: impl FnOnce() -> T) -> (T, Option<wgpu::Error>) {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = f();
    let validation = pollster::block_on(device.pop_error_scope());
    let out_of_memory = pollster::block_on(device.pop_error_scope());
    (value, validation.or(out_of_memory))
}
