//! GPU buffer types
//!
//! Uploaded directly to device buffers, so every type is `repr(C)` and
//! padded to the layout WGSL expects.

use bytemuck::{Pod, Zeroable};

use crate::params::SimulationParameters;
use crate::pipeline::RenderSettings;

/// Threads per compute workgroup in the physics kernel
pub const WORKGROUP_SIZE: u32 = 256;

/// Bytes per element of a bank array (`vec2<f32>`)
pub const BANK_ELEMENT_SIZE: u64 = std::mem::size_of::<[f32; 2]>() as u64;

/// Per-frame parameters shared by the physics and render kernels.
///
/// Layout matches the `FrameUniforms` WGSL struct.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct FrameUniforms {
    /// Attractor position in viewport coordinates
    pub attractor: [f32; 2],
    /// Viewport width and height
    pub viewport: [f32; 2],
    /// Gravitational strength
    pub g: f32,
    /// Velocity damping factor
    pub resistance: f32,
    /// Dead-zone guard for the attractor force
    pub min_distance_sq: f32,
    /// Number of particle slots (bounds the compute dispatch)
    pub particle_count: u32,
    /// Square footprint edge in pixels
    pub point_size: f32,
    /// Padding for 16-byte alignment of `particle_color`
    pub _padding: [f32; 3],
    /// RGBA color of every particle
    pub particle_color: [f32; 4],
}

impl FrameUniforms {
    pub fn new(
        params: &SimulationParameters,
        settings: &RenderSettings,
        particle_count: u32,
    ) -> Self {
        Self {
            attractor: params.attractor,
            viewport: [params.viewport.width, params.viewport.height],
            g: params.g,
            resistance: params.resistance,
            min_distance_sq: params.min_distance_sq,
            particle_count,
            point_size: settings.point_size,
            _padding: [0.0; 3],
            particle_color: settings.particle_color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Viewport;

    #[test]
    fn test_frame_uniforms_size() {
        // 2 + 2 + 5 scalars + 3 padding + 4 color = 16 words = 64 bytes
        let size = std::mem::size_of::<FrameUniforms>();
        assert_eq!(size, 64);
        assert_eq!(size % 16, 0, "FrameUniforms size {} is not 16-byte aligned", size);
    }

    #[test]
    fn test_particle_color_offset() {
        assert_eq!(std::mem::offset_of!(FrameUniforms, particle_color), 48);
    }

    #[test]
    fn test_uniforms_from_parameters() {
        let params = SimulationParameters::new(9.0, 0.99, Viewport::new(640.0, 480.0))
            .with_attractor(10.0, 20.0);
        let uniforms = FrameUniforms::new(&params, &RenderSettings::default(), 1234);

        assert_eq!(uniforms.attractor, [10.0, 20.0]);
        assert_eq!(uniforms.viewport, [640.0, 480.0]);
        assert_eq!(uniforms.g, 9.0);
        assert_eq!(uniforms.resistance, 0.99);
        assert_eq!(uniforms.min_distance_sq, 400.0);
        assert_eq!(uniforms.particle_count, 1234);
        assert_eq!(uniforms.point_size, 1.0);
    }
}
